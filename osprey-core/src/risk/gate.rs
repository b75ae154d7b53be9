//! Layered pre-trade risk gate
//!
//! Four layers composed in order; the first to reject wins, and only a
//! clean pass across all of them authorises a trade:
//!
//! 0. Global state: explicit halt or breaker cool-down
//! 1. Basic limits: spread band, size/notional caps, hypothetical
//!    position caps, ledger balances, per-venue rate gates, and the
//!    hard triggers (daily loss, drawdown, minimum equity) that trip
//!    the circuit breaker
//! 2. Portfolio/market risk: volatility, VaR budget, liquidity flags,
//!    dynamically scaled effective limits
//! 3. Operational: host saturation, stale data, lost connectivity
//!
//! Every rejection is appended to the event trail; every decision is
//! mirrored to the audit trail when one is attached.

use crate::core::clock::Clock;
use crate::core::errors::{MarketRiskKind, OperationalKind, RateLimitKind, RejectReason};
use crate::core::types::{fixed_point, symbol, Price, Quantity, SymbolId, Venue};
use crate::ledger::PositionLedger;
use crate::risk::breaker::{BreakerState, CircuitBreaker};
use crate::risk::dynamic::{DynamicLimits, LiquidityMetrics, MarketRiskMetrics, ReturnHistory};
use crate::risk::events::{AuditRecord, AuditTrail, RiskEvent, RiskEventLog};
use crate::risk::limits::{DynamicRiskConfig, RiskLimits};
use crate::risk::session::SessionRisk;
use anyhow::Result;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of an authorisation request
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Authorize,
    Reject(RejectReason),
}

/// Decision plus advisory context
#[derive(Debug, Clone)]
pub struct Authorization {
    pub decision: Decision,
    pub warnings: Vec<String>,
    /// 1.0 is full confidence; rejections carry 0.0
    pub confidence: f64,
}

impl Authorization {
    pub fn is_authorized(&self) -> bool {
        matches!(self.decision, Decision::Authorize)
    }

    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match &self.decision {
            Decision::Reject(reason) => Some(reason),
            Decision::Authorize => None,
        }
    }
}

/// Host/connectivity health reported by out-of-scope monitors
#[derive(Debug, Clone, Copy)]
pub struct OperationalStatus {
    pub cpu_usage_percent: f64,
    pub memory_usage_percent: f64,
    pub exchange_connectivity: bool,
    pub market_data_stale: bool,
}

impl Default for OperationalStatus {
    fn default() -> Self {
        Self {
            cpu_usage_percent: 0.0,
            memory_usage_percent: 0.0,
            exchange_connectivity: true,
            market_data_stale: false,
        }
    }
}

/// Swap-and-compute snapshot for reporting
#[derive(Debug, Clone)]
pub struct RiskReport {
    pub breaker: BreakerState,
    pub violations_today: u64,
    pub session: SessionRisk,
    pub equity: f64,
    pub daily_pnl: f64,
    pub max_drawdown: f64,
    pub market_metrics: HashMap<SymbolId, MarketRiskMetrics>,
    pub liquidity_metrics: HashMap<(Venue, SymbolId), LiquidityMetrics>,
    pub dynamic_limits: DynamicLimits,
    pub recent_events: Vec<RiskEvent>,
}

#[derive(Debug, Default)]
struct VenueRate {
    last_order_ns: u64,
    recent_orders: VecDeque<u64>,
}

const MINUTE_NS: u64 = 60_000_000_000;

type EventCallback = Box<dyn Fn(&RiskEvent) + Send + Sync>;

/// The layered risk gate
pub struct RiskGate {
    ledger: Arc<PositionLedger>,
    clock: Arc<dyn Clock>,
    limits: Mutex<RiskLimits>,
    config: Mutex<DynamicRiskConfig>,
    breaker: Mutex<CircuitBreaker>,
    session: Mutex<SessionRisk>,
    histories: Mutex<HashMap<SymbolId, ReturnHistory>>,
    market_metrics: Mutex<HashMap<SymbolId, MarketRiskMetrics>>,
    liquidity: Mutex<HashMap<(Venue, SymbolId), LiquidityMetrics>>,
    dynamic: Mutex<DynamicLimits>,
    ops: Mutex<OperationalStatus>,
    venue_rate: Mutex<HashMap<Venue, VenueRate>>,
    events: Mutex<RiskEventLog>,
    callbacks: Mutex<Vec<EventCallback>>,
    audit: Option<AuditTrail>,
}

impl RiskGate {
    pub fn new(ledger: Arc<PositionLedger>, clock: Arc<dyn Clock>) -> Self {
        Self::build(ledger, clock, RiskEventLog::new(), None)
    }

    /// Gate with the append-only CSV event log and JSONL audit trail
    /// attached
    pub fn with_logs(
        ledger: Arc<PositionLedger>,
        clock: Arc<dyn Clock>,
        events_csv: impl AsRef<Path>,
        audit_log: impl AsRef<Path>,
    ) -> Result<Self> {
        let events = RiskEventLog::with_csv(events_csv.as_ref())?;
        let audit = AuditTrail::create(audit_log)?;
        Ok(Self::build(ledger, clock, events, Some(audit)))
    }

    fn build(
        ledger: Arc<PositionLedger>,
        clock: Arc<dyn Clock>,
        events: RiskEventLog,
        audit: Option<AuditTrail>,
    ) -> Self {
        let limits = RiskLimits::default();
        let mut dynamic = DynamicLimits::default();
        dynamic.recompute(&limits);

        let now = clock.now_ns();
        Self {
            ledger,
            clock: Arc::clone(&clock),
            breaker: Mutex::new(CircuitBreaker::new(limits.circuit_breaker_cooldown_seconds)),
            limits: Mutex::new(limits),
            config: Mutex::new(DynamicRiskConfig::default()),
            session: Mutex::new(SessionRisk::new(now)),
            histories: Mutex::new(HashMap::new()),
            market_metrics: Mutex::new(HashMap::new()),
            liquidity: Mutex::new(HashMap::new()),
            dynamic: Mutex::new(dynamic),
            ops: Mutex::new(OperationalStatus::default()),
            venue_rate: Mutex::new(HashMap::new()),
            events: Mutex::new(events),
            callbacks: Mutex::new(Vec::new()),
            audit,
        }
    }

    /// Authorise a hypothetical trade: `quantity` signed fixed-point,
    /// positive buys. The first rejecting layer wins.
    pub fn authorize_trade(
        &self,
        venue: Venue,
        sym: SymbolId,
        quantity: i64,
        price: Price,
        spread_bps: f64,
    ) -> Authorization {
        let now = self.clock.now_ns();

        let authorization = match self.evaluate(venue, sym, quantity, price, spread_bps, now) {
            Ok((warnings, confidence)) => {
                // Only a granted authorisation consumes rate budget
                let mut rates = self.venue_rate.lock();
                let rate = rates.entry(venue).or_default();
                rate.last_order_ns = now;
                rate.recent_orders.push_back(now);
                drop(rates);

                debug!(%venue, symbol = sym, confidence, "trade authorised");
                Authorization { decision: Decision::Authorize, warnings, confidence }
            }
            Err(reason) => {
                self.record_rejection(&reason, venue, sym, quantity, price, now);
                Authorization {
                    decision: Decision::Reject(reason),
                    warnings: Vec::new(),
                    confidence: 0.0,
                }
            }
        };

        if let Some(audit) = &self.audit {
            audit.record(AuditRecord {
                timestamp_ns: now,
                authorized: authorization.is_authorized(),
                venue: venue.to_string(),
                symbol: sym,
                quantity: fixed_point::to_f64_signed(quantity),
                price: fixed_point::to_f64(price),
                confidence: authorization.confidence,
                reason: authorization.reject_reason().map(|reason| reason.to_string()),
            });
        }

        authorization
    }

    fn evaluate(
        &self,
        venue: Venue,
        sym: SymbolId,
        quantity: i64,
        price: Price,
        spread_bps: f64,
        now: u64,
    ) -> std::result::Result<(Vec<String>, f64), RejectReason> {
        // ── Layer 0: global state ──────────────────────────────────
        match self.breaker.lock().poll(now) {
            BreakerState::Halted { reason } => {
                return Err(RejectReason::EmergencyHalt { reason: reason.clone() });
            }
            BreakerState::CoolingDown { .. } => {
                return Err(RejectReason::EmergencyHalt {
                    reason: "circuit breaker cooling down".into(),
                });
            }
            BreakerState::Normal => {}
        }

        // ── Layer 1: basic limits ──────────────────────────────────
        let limits = *self.limits.lock();

        if spread_bps < limits.min_spread_bps || spread_bps > limits.max_spread_bps {
            return Err(RejectReason::SpreadBand {
                spread_bps,
                min_bps: limits.min_spread_bps,
                max_bps: limits.max_spread_bps,
            });
        }

        let qty_abs = fixed_point::to_f64_signed(quantity).abs();
        let notional = qty_abs * fixed_point::to_f64(price);
        if notional > limits.max_order_notional {
            return Err(RejectReason::NotionalCap { notional, limit: limits.max_order_notional });
        }
        let order_size_cap = match sym {
            s if s == symbol::BTC_USD => Some(limits.max_order_size_btc),
            s if s == symbol::ETH_USD => Some(limits.max_order_size_eth),
            _ => None,
        };
        if let Some(cap) = order_size_cap {
            if qty_abs > cap {
                return Err(RejectReason::OrderSizeCap { quantity: qty_abs, limit: cap });
            }
        }

        let position = self.ledger.get_position(venue, sym);
        let would_be =
            fixed_point::to_f64_signed(position.quantity) + fixed_point::to_f64_signed(quantity);
        let position_cap = match sym {
            s if s == symbol::BTC_USD => Some(limits.max_btc_position),
            s if s == symbol::ETH_USD => Some(limits.max_eth_position),
            _ => None,
        };
        if let Some(cap) = position_cap {
            if would_be.abs() > cap {
                return Err(RejectReason::PositionCap { would_be, limit: cap });
            }
        }

        if !self.ledger.can_trade(venue, sym, quantity, price) {
            return Err(RejectReason::InsufficientBalance { required_notional: notional });
        }

        {
            let mut rates = self.venue_rate.lock();
            let rate = rates.entry(venue).or_default();
            let horizon = now.saturating_sub(MINUTE_NS);
            while rate.recent_orders.front().is_some_and(|&t| t < horizon) {
                rate.recent_orders.pop_front();
            }

            if rate.last_order_ns > 0 {
                let elapsed_ms = now.saturating_sub(rate.last_order_ns) / 1_000_000;
                if elapsed_ms < limits.min_ms_between_orders as u64 {
                    return Err(RejectReason::RateLimited {
                        detail: RateLimitKind::MinIntervalBetweenOrders,
                    });
                }
            }
            if rate.recent_orders.len() >= limits.max_orders_per_minute as usize {
                return Err(RejectReason::RateLimited {
                    detail: RateLimitKind::OrdersPerMinute,
                });
            }
        }

        // Hard triggers: these trip the breaker rather than just
        // rejecting
        let equity = self.ledger.total_equity();
        if equity < limits.min_account_equity {
            return Err(self.trip_breaker(&limits, now, "account equity below minimum"));
        }
        let daily_pnl = self.ledger.daily_pnl();
        if daily_pnl < -limits.max_daily_loss {
            return Err(self.trip_breaker(&limits, now, "daily loss limit exceeded"));
        }
        let drawdown = self.ledger.max_drawdown();
        if drawdown > limits.max_drawdown {
            return Err(self.trip_breaker(&limits, now, "maximum drawdown limit exceeded"));
        }

        // ── Layer 2: portfolio / market risk ───────────────────────
        let config = *self.config.lock();
        let metrics = self.market_metrics.lock().get(&sym).copied();

        if let Some(market) = metrics {
            if market.volatility > config.volatility_threshold_high {
                return Err(RejectReason::MarketRisk {
                    detail: MarketRiskKind::HighVolatility {
                        volatility: market.volatility,
                        threshold: config.volatility_threshold_high,
                    },
                });
            }
            let position_var = notional * market.var_95;
            let budget = equity * config.var_threshold_percent;
            if position_var > budget {
                return Err(RejectReason::MarketRisk {
                    detail: MarketRiskKind::VarBudget { position_var, budget },
                });
            }
        }

        if let Some(liquidity) = self.liquidity.lock().get(&(venue, sym)).copied() {
            if !liquidity.is_liquid {
                return Err(RejectReason::Illiquid { spread_bps: liquidity.spread_bps });
            }
            let estimate = notional * liquidity.impact_estimate;
            let cap = fixed_point::to_f64(price) * config.max_impact_fraction;
            if estimate > cap {
                return Err(RejectReason::MarketRisk {
                    detail: MarketRiskKind::ImpactTooLarge { estimate, cap },
                });
            }
        }

        let dynamic = *self.dynamic.lock();
        if config.enable_dynamic_limits {
            let effective = dynamic.effective;
            if notional > effective.max_order_notional {
                return Err(RejectReason::NotionalCap {
                    notional,
                    limit: effective.max_order_notional,
                });
            }
            let effective_position_cap = match sym {
                s if s == symbol::BTC_USD => Some(effective.max_position_btc),
                s if s == symbol::ETH_USD => Some(effective.max_position_eth),
                _ => None,
            };
            if let Some(cap) = effective_position_cap {
                if would_be.abs() > cap {
                    return Err(RejectReason::PositionCap { would_be, limit: cap });
                }
            }
            if spread_bps < effective.min_spread_bps {
                return Err(RejectReason::SpreadBand {
                    spread_bps,
                    min_bps: effective.min_spread_bps,
                    max_bps: limits.max_spread_bps,
                });
            }
        }

        // ── Layer 3: operational ───────────────────────────────────
        let ops = *self.ops.lock();
        if ops.cpu_usage_percent > 90.0 {
            return Err(RejectReason::Operational { detail: OperationalKind::CpuSaturated });
        }
        if ops.memory_usage_percent > 85.0 {
            return Err(RejectReason::Operational { detail: OperationalKind::MemorySaturated });
        }
        if !ops.exchange_connectivity {
            return Err(RejectReason::Operational { detail: OperationalKind::ConnectivityDown });
        }
        if ops.market_data_stale {
            return Err(RejectReason::Operational { detail: OperationalKind::StaleMarketData });
        }

        // ── Aggregate score, confidence and warnings ───────────────
        let volatility = metrics.map(|market| market.volatility).unwrap_or(0.0);
        let score = volatility * 0.3
            + (would_be.abs() / 10.0) * 0.15
            + (ops.cpu_usage_percent / 100.0) * 0.25;
        if score > config.risk_score_threshold {
            return Err(RejectReason::MarketRisk {
                detail: MarketRiskKind::RiskScore {
                    score,
                    threshold: config.risk_score_threshold,
                },
            });
        }

        let mut warnings = Vec::new();
        if ops.cpu_usage_percent > 80.0 {
            warnings.push(format!("High CPU usage: {:.1}%", ops.cpu_usage_percent));
        }
        if ops.memory_usage_percent > 75.0 {
            warnings.push(format!("High memory usage: {:.1}%", ops.memory_usage_percent));
        }
        if dynamic.volatility_multiplier < 0.5 {
            warnings.push("Risk limits reduced due to high volatility".into());
        }
        if dynamic.liquidity_multiplier < 0.5 {
            warnings.push("Risk limits reduced due to low liquidity".into());
        }

        Ok((warnings, (1.0 - score).clamp(0.0, 1.0)))
    }

    fn trip_breaker(&self, limits: &RiskLimits, now: u64, reason: &str) -> RejectReason {
        if limits.circuit_breaker_enabled {
            self.breaker.lock().trip(now, reason);
        }
        self.session.lock().set_halted(Some(reason.to_string()));
        RejectReason::EmergencyHalt { reason: reason.to_string() }
    }

    fn record_rejection(
        &self,
        reason: &RejectReason,
        venue: Venue,
        sym: SymbolId,
        quantity: i64,
        price: Price,
        now: u64,
    ) {
        let halted = matches!(reason, RejectReason::EmergencyHalt { .. });
        let event = RiskEvent {
            timestamp_ns: now,
            kind: reason.event_kind(),
            venue: Some(venue),
            symbol: Some(sym),
            description: reason.to_string(),
            value: fixed_point::to_f64_signed(quantity).abs() * fixed_point::to_f64(price),
            halted,
        };
        self.events.lock().append(event.clone());
        for callback in self.callbacks.lock().iter() {
            callback(&event);
        }
    }

    /// Feed a market observation into the dynamic risk tables and the
    /// ledger mark
    pub fn update_market_data(
        &self,
        venue: Venue,
        sym: SymbolId,
        price: Price,
        bid: Price,
        ask: Price,
        volume: Quantity,
    ) {
        let now = self.clock.now_ns();
        let config = *self.config.lock();

        {
            let mut histories = self.histories.lock();
            let history = histories
                .entry(sym)
                .or_insert_with(|| ReturnHistory::new(config.history_len));
            history.push(fixed_point::to_f64(price));
            let metrics = history.metrics(now);
            drop(histories);
            self.market_metrics.lock().insert(sym, metrics);
        }

        {
            let bid_f = fixed_point::to_f64(bid);
            let ask_f = fixed_point::to_f64(ask);
            let volume_f = fixed_point::to_f64(volume);
            let mid = (bid_f + ask_f) / 2.0;

            let mut liquidity = self.liquidity.lock();
            let entry = liquidity.entry((venue, sym)).or_default();
            if mid > 0.0 {
                entry.spread_bps = (ask_f - bid_f) / mid * 10_000.0;
            }
            entry.depth_bid = bid_f * volume_f;
            entry.depth_ask = ask_f * volume_f;
            entry.is_liquid = entry.spread_bps < config.liquidity_spread_cap_bps
                && volume_f > config.liquidity_min_volume;
            entry.last_update_ns = now;
        }

        if config.enable_dynamic_limits {
            let avg_volatility = {
                let metrics = self.market_metrics.lock();
                if metrics.is_empty() {
                    0.0
                } else {
                    metrics.values().map(|m| m.volatility).sum::<f64>() / metrics.len() as f64
                }
            };
            let avg_spread = {
                let liquidity = self.liquidity.lock();
                if liquidity.is_empty() {
                    0.0
                } else {
                    liquidity.values().map(|l| l.spread_bps).sum::<f64>() / liquidity.len() as f64
                }
            };

            let limits = *self.limits.lock();
            let mut dynamic = self.dynamic.lock();
            dynamic.update_from_conditions(avg_volatility, avg_spread, self.ledger.daily_pnl());
            dynamic.recompute(&limits);
        }

        self.ledger.update_market_price(venue, sym, price);
    }

    /// Report an execution to the ledger and the session statistics
    pub fn report_execution(
        &self,
        venue: Venue,
        sym: SymbolId,
        quantity: i64,
        price: Price,
        fee: f64,
    ) {
        let realized = self.ledger.add_trade(venue, sym, quantity, price);
        self.session
            .lock()
            .record_execution(realized, fee, self.clock.now_ns());
    }

    /// Explicit halt. Idempotent; only `reset_emergency_stop` clears it.
    pub fn emergency_stop(&self, reason: &str) {
        self.breaker.lock().halt(reason);
        self.session.lock().set_halted(Some(reason.to_string()));

        let event = RiskEvent {
            timestamp_ns: self.clock.now_ns(),
            kind: crate::core::errors::RiskEventKind::EmergencyStop,
            venue: None,
            symbol: None,
            description: format!("Emergency stop: {}", reason),
            value: 0.0,
            halted: true,
        };
        self.events.lock().append(event.clone());
        for callback in self.callbacks.lock().iter() {
            callback(&event);
        }
    }

    pub fn reset_emergency_stop(&self) {
        self.breaker.lock().reset();
        self.session.lock().set_halted(None);
        info!("emergency stop reset, trading can resume");
    }

    pub fn is_halted(&self) -> bool {
        self.breaker.lock().is_halted()
    }

    pub fn limits(&self) -> RiskLimits {
        *self.limits.lock()
    }

    pub fn update_limits(&self, new_limits: RiskLimits) {
        self.breaker
            .lock()
            .set_cooldown_seconds(new_limits.circuit_breaker_cooldown_seconds);
        *self.limits.lock() = new_limits;
        self.dynamic.lock().recompute(&new_limits);
        info!("risk limits updated");
    }

    pub fn dynamic_config(&self) -> DynamicRiskConfig {
        *self.config.lock()
    }

    pub fn update_dynamic_config(&self, config: DynamicRiskConfig) {
        *self.config.lock() = config;
    }

    pub fn update_operational_status(&self, status: OperationalStatus) {
        *self.ops.lock() = status;
    }

    pub fn register_event_callback(&self, callback: impl Fn(&RiskEvent) + Send + Sync + 'static) {
        self.callbacks.lock().push(Box::new(callback));
    }

    pub fn violations_today(&self) -> u64 {
        self.events.lock().violations_today()
    }

    pub fn recent_events(&self) -> Vec<RiskEvent> {
        self.events.lock().recent().cloned().collect()
    }

    /// Snapshot for the reporting path; no lock is held across the
    /// whole report
    pub fn risk_report(&self) -> RiskReport {
        RiskReport {
            breaker: self.breaker.lock().state().clone(),
            violations_today: self.violations_today(),
            session: self.session.lock().clone(),
            equity: self.ledger.total_equity(),
            daily_pnl: self.ledger.daily_pnl(),
            max_drawdown: self.ledger.max_drawdown(),
            market_metrics: self.market_metrics.lock().clone(),
            liquidity_metrics: self.liquidity.lock().clone(),
            dynamic_limits: *self.dynamic.lock(),
            recent_events: self.recent_events(),
        }
    }
}
