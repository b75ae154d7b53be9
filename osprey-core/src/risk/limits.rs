//! Risk limit configuration
//!
//! Every tunable has a conservative default and is documented by its
//! effect. No ambient state: the gate owns its copy and exposes
//! `limits`/`update_limits`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Reject orders that would push |BTC position| above this, per venue
    pub max_btc_position: f64,
    /// Reject orders that would push |ETH position| above this, per venue
    pub max_eth_position: f64,
    /// Maximum USD exposure per venue
    pub max_usd_exposure: f64,

    /// Trip the circuit breaker once the session loses this much
    pub max_daily_loss: f64,
    /// Trip the circuit breaker once peak-to-trough drawdown exceeds this
    pub max_drawdown: f64,
    /// Trip the circuit breaker below this account equity
    pub min_account_equity: f64,

    /// Per-order size cap in BTC
    pub max_order_size_btc: f64,
    /// Per-order size cap in ETH
    pub max_order_size_eth: f64,
    /// Per-order notional cap in USD
    pub max_order_notional: f64,

    /// Reject spreads below this (unprofitable)
    pub min_spread_bps: f64,
    /// Reject spreads above this (implausible, likely bad data)
    pub max_spread_bps: f64,

    /// Minimum milliseconds between orders, per venue
    pub min_ms_between_orders: u32,
    /// Maximum orders per minute, per venue
    pub max_orders_per_minute: u32,

    pub circuit_breaker_enabled: bool,
    /// Seconds the breaker stays tripped before self-resetting
    pub circuit_breaker_cooldown_seconds: u32,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_btc_position: 0.05,
            max_eth_position: 0.5,
            max_usd_exposure: 10_000.0,
            max_daily_loss: 2_000.0,
            max_drawdown: 5_000.0,
            min_account_equity: 45_000.0,
            max_order_size_btc: 0.01,
            max_order_size_eth: 0.1,
            max_order_notional: 1_000.0,
            min_spread_bps: 25.0,
            max_spread_bps: 1_000.0,
            min_ms_between_orders: 100,
            max_orders_per_minute: 20,
            circuit_breaker_enabled: true,
            circuit_breaker_cooldown_seconds: 300,
        }
    }
}

/// Dynamic (portfolio/market) risk configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DynamicRiskConfig {
    /// Annualised volatility above which per-symbol trading is refused
    pub volatility_threshold_high: f64,
    /// Spread above which a market is flagged illiquid, basis points
    pub liquidity_spread_cap_bps: f64,
    /// Minimum observed volume for a liquid market
    pub liquidity_min_volume: f64,
    /// Maximum position VaR as a fraction of equity
    pub var_threshold_percent: f64,
    /// Maximum market-impact estimate as a fraction of price
    pub max_impact_fraction: f64,
    /// Aggregate risk score above which authorisation is refused
    pub risk_score_threshold: f64,
    /// Rolling price-history window per symbol
    pub history_len: usize,
    pub enable_dynamic_limits: bool,
}

impl Default for DynamicRiskConfig {
    fn default() -> Self {
        Self {
            volatility_threshold_high: 0.05,
            liquidity_spread_cap_bps: 100.0,
            liquidity_min_volume: 0.01,
            var_threshold_percent: 0.02,
            max_impact_fraction: 0.01,
            risk_score_threshold: 0.8,
            history_len: 3_600,
            enable_dynamic_limits: true,
        }
    }
}
