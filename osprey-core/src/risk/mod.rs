//! Layered pre-trade risk management
//!
//! [`RiskGate`] composes the circuit breaker, basic limits, dynamic
//! market/liquidity metrics and operational health into a single
//! `authorize_trade` entry point consulted before every order.

pub mod breaker;
pub mod dynamic;
pub mod events;
pub mod gate;
pub mod limits;
pub mod session;

pub use breaker::{BreakerState, CircuitBreaker};
pub use dynamic::{
    DynamicLimits, EffectiveLimits, LiquidityMetrics, MarketRiskMetrics, ReturnHistory,
};
pub use events::{AuditRecord, AuditTrail, RiskEvent, RiskEventLog, MAX_RECENT_EVENTS};
pub use gate::{Authorization, Decision, OperationalStatus, RiskGate, RiskReport};
pub use limits::{DynamicRiskConfig, RiskLimits};
pub use session::SessionRisk;
