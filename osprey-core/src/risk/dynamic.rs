//! Dynamic market and liquidity risk metrics
//!
//! A rolling per-symbol return series drives annualised volatility and
//! empirical VaR; per-(venue, symbol) bid/ask/volume observations drive
//! the liquidity flags. Dynamic multipliers scale the base limits down
//! in bad conditions; the most conservative driver always wins.

use crate::risk::limits::RiskLimits;
use std::collections::VecDeque;

/// Rolling market risk per symbol
#[derive(Debug, Clone, Copy, Default)]
pub struct MarketRiskMetrics {
    /// Annualised volatility of log returns
    pub volatility: f64,
    /// Empirical 95% VaR of the return distribution (positive = loss)
    pub var_95: f64,
    /// Empirical 99% VaR
    pub var_99: f64,
    pub last_update_ns: u64,
}

/// Liquidity view of one (venue, symbol) market
#[derive(Debug, Clone, Copy)]
pub struct LiquidityMetrics {
    pub spread_bps: f64,
    pub depth_bid: f64,
    pub depth_ask: f64,
    /// Estimated fractional market impact per unit notional
    pub impact_estimate: f64,
    pub is_liquid: bool,
    pub last_update_ns: u64,
}

impl Default for LiquidityMetrics {
    fn default() -> Self {
        Self {
            spread_bps: 0.0,
            depth_bid: 0.0,
            depth_ask: 0.0,
            impact_estimate: 0.0,
            is_liquid: true,
            last_update_ns: 0,
        }
    }
}

/// Rolling price history with derived return statistics
#[derive(Debug)]
pub struct ReturnHistory {
    prices: VecDeque<f64>,
    capacity: usize,
}

impl ReturnHistory {
    pub fn new(capacity: usize) -> Self {
        Self { prices: VecDeque::with_capacity(capacity.min(4_096)), capacity }
    }

    pub fn push(&mut self, price: f64) {
        if price <= 0.0 {
            return;
        }
        self.prices.push_back(price);
        while self.prices.len() > self.capacity {
            self.prices.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    fn log_returns(&self) -> Vec<f64> {
        self.prices
            .iter()
            .zip(self.prices.iter().skip(1))
            .map(|(prev, next)| (next / prev).ln())
            .collect()
    }

    /// Recompute volatility and VaR quantiles from the current window.
    /// Requires at least two observations; otherwise leaves zeros.
    pub fn metrics(&self, now_ns: u64) -> MarketRiskMetrics {
        let mut metrics = MarketRiskMetrics { last_update_ns: now_ns, ..Default::default() };
        let mut returns = self.log_returns();
        if returns.is_empty() {
            return metrics;
        }

        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        let variance = returns
            .iter()
            .map(|ret| (ret - mean) * (ret - mean))
            .sum::<f64>()
            / returns.len() as f64;
        // Annualised from per-observation variance, hourly cadence
        metrics.volatility = (variance * 365.0 * 24.0).sqrt();

        returns.sort_by(|a, b| a.partial_cmp(b).expect("returns are finite"));
        let var_index = |quantile: f64| ((returns.len() as f64) * quantile) as usize;
        let idx_95 = var_index(0.05);
        let idx_99 = var_index(0.01);
        if idx_95 < returns.len() {
            metrics.var_95 = -returns[idx_95];
        }
        if idx_99 < returns.len() {
            metrics.var_99 = -returns[idx_99];
        }
        metrics
    }
}

/// Effective limits after multiplier scaling
#[derive(Debug, Clone, Copy, Default)]
pub struct EffectiveLimits {
    pub max_position_btc: f64,
    pub max_position_eth: f64,
    pub max_order_notional: f64,
    pub min_spread_bps: f64,
}

/// Dynamic multipliers over the base limits
///
/// `effective = base × min(multipliers)`: a drop in any single
/// multiplier can only shrink every effective limit, never grow one.
#[derive(Debug, Clone, Copy)]
pub struct DynamicLimits {
    pub volatility_multiplier: f64,
    pub liquidity_multiplier: f64,
    pub correlation_multiplier: f64,
    pub pnl_multiplier: f64,
    pub effective: EffectiveLimits,
}

impl Default for DynamicLimits {
    fn default() -> Self {
        Self {
            volatility_multiplier: 1.0,
            liquidity_multiplier: 1.0,
            correlation_multiplier: 1.0,
            pnl_multiplier: 1.0,
            effective: EffectiveLimits::default(),
        }
    }
}

impl DynamicLimits {
    pub fn combined_multiplier(&self) -> f64 {
        self.volatility_multiplier
            .min(self.liquidity_multiplier)
            .min(self.correlation_multiplier)
            .min(self.pnl_multiplier)
    }

    /// Recompute the effective limit set from `base`
    pub fn recompute(&mut self, base: &RiskLimits) {
        let combined = self.combined_multiplier();
        self.effective = EffectiveLimits {
            max_position_btc: base.max_btc_position * combined,
            max_position_eth: base.max_eth_position * combined,
            max_order_notional: base.max_order_notional * combined,
            // Thinner risk appetite demands a wider minimum spread
            min_spread_bps: base.min_spread_bps / combined.max(f64::EPSILON),
        };
    }

    /// Derive multipliers from observed conditions
    pub fn update_from_conditions(&mut self, avg_volatility: f64, avg_spread_bps: f64, daily_pnl: f64) {
        self.volatility_multiplier = (1.0 - (avg_volatility - 0.02) * 10.0).clamp(0.1, 1.0);
        self.liquidity_multiplier = (1.0 - (avg_spread_bps - 10.0) * 0.01).clamp(0.1, 1.0);
        self.pnl_multiplier = if daily_pnl < 0.0 {
            (1.0 + daily_pnl / 1_000.0).clamp(0.5, 1.0)
        } else {
            1.0
        };
    }
}
