//! Rejection reasons and risk event kinds
//!
//! Rejections are values, never exceptions: they are returned to callers
//! and optionally mirrored to registered callbacks for audit. Ring-buffer
//! full/empty outcomes are ordinary polled results, not errors. Only an
//! internal invariant violation is fatal, and that panics.

use crate::core::types::{Price, Quantity, SymbolId};
use std::fmt;

/// Why an order or a trade authorisation was refused
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    /// Zero-quantity submission
    ZeroQuantity,
    /// Zero price on a limit order
    ZeroPrice,
    /// Symbol has no order book
    UnknownSymbol { symbol: SymbolId },
    /// Post-only order would cross the book at submission
    PostOnlyWouldCross { price: Price },
    /// Fill-or-kill order cannot be filled entirely at submission
    FokUnfillable { requested: Quantity, available: Quantity },
    /// Per-trader or per-venue rate cap
    RateLimited { detail: RateLimitKind },
    /// Ledger balances cannot support the order
    InsufficientBalance { required_notional: f64 },
    /// Per-order notional cap
    NotionalCap { notional: f64, limit: f64 },
    /// Per-order symbol size cap
    OrderSizeCap { quantity: f64, limit: f64 },
    /// Resulting position would breach the (effective) limit
    PositionCap { would_be: f64, limit: f64 },
    /// Spread outside the configured band
    SpreadBand { spread_bps: f64, min_bps: f64, max_bps: f64 },
    /// Market deemed illiquid
    Illiquid { spread_bps: f64 },
    /// Volatility, VaR or aggregate risk-score threshold exceeded
    MarketRisk { detail: MarketRiskKind },
    /// Host or connectivity health
    Operational { detail: OperationalKind },
    /// Trading globally halted: explicit stop or breaker cool-down
    EmergencyHalt { reason: String },
}

/// Which rate gate fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitKind {
    OrdersPerSecond,
    MessagesPerSecond,
    CancelRatio,
    MinIntervalBetweenOrders,
    OrdersPerMinute,
}

/// Which market-risk check fired
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarketRiskKind {
    HighVolatility { volatility: f64, threshold: f64 },
    VarBudget { position_var: f64, budget: f64 },
    ImpactTooLarge { estimate: f64, cap: f64 },
    RiskScore { score: f64, threshold: f64 },
}

/// Which operational check fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationalKind {
    CpuSaturated,
    MemorySaturated,
    StaleMarketData,
    ConnectivityDown,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::ZeroQuantity => write!(f, "Invalid quantity"),
            RejectReason::ZeroPrice => write!(f, "Invalid price for limit order"),
            RejectReason::UnknownSymbol { symbol } => write!(f, "Unknown symbol {}", symbol),
            RejectReason::PostOnlyWouldCross { price } => {
                write!(f, "Post-only order at {} would cross", price)
            }
            RejectReason::FokUnfillable { requested, available } => {
                write!(f, "FOK unfillable: need {}, book has {}", requested, available)
            }
            RejectReason::RateLimited { detail } => write!(f, "Rate limit exceeded: {}", detail),
            RejectReason::InsufficientBalance { required_notional } => {
                write!(f, "Insufficient balance for notional {:.2}", required_notional)
            }
            RejectReason::NotionalCap { notional, limit } => {
                write!(f, "Order notional {:.2} exceeds limit {:.2}", notional, limit)
            }
            RejectReason::OrderSizeCap { quantity, limit } => {
                write!(f, "Order size {:.6} exceeds limit {:.6}", quantity, limit)
            }
            RejectReason::PositionCap { would_be, limit } => {
                write!(f, "Position {:.6} would exceed limit {:.6}", would_be, limit)
            }
            RejectReason::SpreadBand { spread_bps, min_bps, max_bps } => {
                write!(
                    f,
                    "Spread {:.1}bps outside band [{:.1}, {:.1}]",
                    spread_bps, min_bps, max_bps
                )
            }
            RejectReason::Illiquid { spread_bps } => {
                write!(f, "Market illiquid (spread {:.1}bps)", spread_bps)
            }
            RejectReason::MarketRisk { detail } => write!(f, "Market risk: {}", detail),
            RejectReason::Operational { detail } => write!(f, "Operational risk: {}", detail),
            RejectReason::EmergencyHalt { reason } => write!(f, "Trading halted: {}", reason),
        }
    }
}

impl std::error::Error for RejectReason {}

impl fmt::Display for RateLimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitKind::OrdersPerSecond => write!(f, "orders per second"),
            RateLimitKind::MessagesPerSecond => write!(f, "messages per second"),
            RateLimitKind::CancelRatio => write!(f, "cancel-to-fill ratio"),
            RateLimitKind::MinIntervalBetweenOrders => write!(f, "minimum order interval"),
            RateLimitKind::OrdersPerMinute => write!(f, "orders per minute"),
        }
    }
}

impl fmt::Display for MarketRiskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketRiskKind::HighVolatility { volatility, threshold } => {
                write!(f, "volatility {:.4} above {:.4}", volatility, threshold)
            }
            MarketRiskKind::VarBudget { position_var, budget } => {
                write!(f, "position VaR {:.2} above budget {:.2}", position_var, budget)
            }
            MarketRiskKind::ImpactTooLarge { estimate, cap } => {
                write!(f, "impact estimate {:.4} above cap {:.4}", estimate, cap)
            }
            MarketRiskKind::RiskScore { score, threshold } => {
                write!(f, "risk score {:.2} above {:.2}", score, threshold)
            }
        }
    }
}

impl fmt::Display for OperationalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationalKind::CpuSaturated => write!(f, "CPU saturated"),
            OperationalKind::MemorySaturated => write!(f, "memory saturated"),
            OperationalKind::StaleMarketData => write!(f, "market data stale"),
            OperationalKind::ConnectivityDown => write!(f, "exchange connectivity down"),
        }
    }
}

/// Classification used by the risk event trail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskEventKind {
    PositionLimit,
    DrawdownLimit,
    DailyLossLimit,
    OrderSizeLimit,
    SpreadViolation,
    BalanceLimit,
    LiquidityRisk,
    MarketRisk,
    OperationalRisk,
    RateLimit,
    EmergencyStop,
    Validation,
}

impl fmt::Display for RiskEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskEventKind::PositionLimit => "POSITION_LIMIT",
            RiskEventKind::DrawdownLimit => "DRAWDOWN_LIMIT",
            RiskEventKind::DailyLossLimit => "DAILY_LOSS_LIMIT",
            RiskEventKind::OrderSizeLimit => "ORDER_SIZE_LIMIT",
            RiskEventKind::SpreadViolation => "SPREAD_VIOLATION",
            RiskEventKind::BalanceLimit => "BALANCE_LIMIT",
            RiskEventKind::LiquidityRisk => "LIQUIDITY_RISK",
            RiskEventKind::MarketRisk => "MARKET_RISK",
            RiskEventKind::OperationalRisk => "OPERATIONAL_RISK",
            RiskEventKind::RateLimit => "RATE_LIMIT",
            RiskEventKind::EmergencyStop => "EMERGENCY_STOP",
            RiskEventKind::Validation => "VALIDATION",
        };
        f.write_str(s)
    }
}

impl RejectReason {
    /// Event classification for the audit trail
    pub fn event_kind(&self) -> RiskEventKind {
        match self {
            RejectReason::ZeroQuantity
            | RejectReason::ZeroPrice
            | RejectReason::UnknownSymbol { .. }
            | RejectReason::PostOnlyWouldCross { .. }
            | RejectReason::FokUnfillable { .. } => RiskEventKind::Validation,
            RejectReason::RateLimited { .. } => RiskEventKind::RateLimit,
            RejectReason::InsufficientBalance { .. } => RiskEventKind::BalanceLimit,
            RejectReason::NotionalCap { .. } | RejectReason::OrderSizeCap { .. } => {
                RiskEventKind::OrderSizeLimit
            }
            RejectReason::PositionCap { .. } => RiskEventKind::PositionLimit,
            RejectReason::SpreadBand { .. } => RiskEventKind::SpreadViolation,
            RejectReason::Illiquid { .. } => RiskEventKind::LiquidityRisk,
            RejectReason::MarketRisk { .. } => RiskEventKind::MarketRisk,
            RejectReason::Operational { .. } => RiskEventKind::OperationalRisk,
            RejectReason::EmergencyHalt { .. } => RiskEventKind::EmergencyStop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_values() {
        let reason = RejectReason::SpreadBand { spread_bps: 0.5, min_bps: 1.0, max_bps: 500.0 };
        let msg = format!("{}", reason);
        assert!(msg.contains("0.5bps"));
        assert!(msg.contains("500.0"));
    }

    #[test]
    fn test_event_kind_mapping() {
        assert_eq!(RejectReason::ZeroQuantity.event_kind(), RiskEventKind::Validation);
        assert_eq!(
            RejectReason::EmergencyHalt { reason: "x".into() }.event_kind(),
            RiskEventKind::EmergencyStop
        );
        assert_eq!(
            RejectReason::PositionCap { would_be: 1.0, limit: 0.5 }.event_kind(),
            RiskEventKind::PositionLimit
        );
    }
}
