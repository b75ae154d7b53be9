//! Osprey Core: simulated low-latency trading platform core
//!
//! The in-process fabric that ties together a deterministic exchange
//! matching engine, a layered pre-trade risk gate and a position/P&L
//! ledger, connected by lock-free SPSC/MPSC queues and hardware-
//! timestamped sequencers.
//!
//! ## Architecture
//!
//! ```text
//!   Sequencer (SPSC / MPSC / MPMC / timestamped)
//!       │  assigns monotonic sequence + timestamp
//!       ▼
//!   Ring buffers (SPSC / MPSC, power-of-two, cache padded)
//!       │  carry SequencedMessage between threads
//!       ▼
//!   MatchingEngine ◀── submit / cancel ── strategy collaborators
//!       │  ack / reject / fill / market data callbacks
//!       ▼
//!   PositionLedger ◀── queries ── RiskGate (authorize_trade)
//! ```
//!
//! ## Design principles
//!
//! - **Fixed-point everywhere on the hot path**: prices and quantities
//!   are u64, scale 10^8; floats exist only in accounting and risk
//!   statistics, never in ordering or matching decisions.
//! - **Wait-free fast paths**: sequence assignment and ring read/write
//!   touch nothing but their own cache-padded atomics: no syscalls,
//!   no allocation, no locks.
//! - **Rejections are values**: every refusal is an enum returned to
//!   the caller and mirrored to callbacks; only internal invariant
//!   violations abort.
//! - **Single-owner state**: books, ledger and risk tables are each
//!   owned by one engine thread; cross-thread traffic goes through the
//!   ring buffers.
//!
//! ## Example
//!
//! ```rust,no_run
//! use osprey_core::prelude::*;
//! use std::sync::Arc;
//!
//! let clock: Arc<dyn Clock> = Arc::new(CalibratedClock::new());
//! let ledger = Arc::new(PositionLedger::new(Arc::clone(&clock)));
//! let gate = RiskGate::new(Arc::clone(&ledger), Arc::clone(&clock));
//! let mut engine = MatchingEngine::new(Arc::clone(&clock));
//!
//! let price = fixed_point::from_f64(50_000.0);
//! let qty = fixed_point::from_f64(0.005);
//!
//! let authorization =
//!     gate.authorize_trade(Venue::Binance, symbol::BTC_USD, qty as i64, price, 30.0);
//! if authorization.is_authorized() {
//!     let order = Order::limit(symbol::BTC_USD, Side::Buy, price, qty, 1);
//!     let id = engine.submit_order(order);
//!     assert_ne!(id, 0);
//!     engine.process_matching();
//! }
//! ```

pub mod core;
pub mod engine;
pub mod fabric;
pub mod ledger;
pub mod risk;
pub mod util;

pub use crate::core::{
    fixed_point, symbol, Asset, CalibratedClock, Clock, ManualClock, MessageKind, OrderId,
    OrderStatus, OrderType, Payload, Price, Quantity, RejectReason, Side, SequencedMessage,
    StrategyId, SymbolId, TimeInForce, Venue,
};
pub use crate::engine::{
    EngineStats, FeeStructure, Fill, HiddenLiquidityConfig, ImpactModel, LatencyProfile,
    MatchingEngine, Order, OrderBook, TraderStats,
};
pub use crate::fabric::{
    MpmcSequencer, MpscRing, MpscSequencer, SpscRing, SpscSequencer, TimestampSequencer,
};
pub use crate::ledger::{ExchangeBalance, Position, PositionLedger, SlippageModel};
pub use crate::risk::{
    Authorization, BreakerState, Decision, DynamicRiskConfig, OperationalStatus, RiskEvent,
    RiskGate, RiskLimits,
};

pub use anyhow::{Error, Result};

/// Convenient imports for simulator binaries and tests
pub mod prelude {
    pub use crate::core::{
        fixed_point, symbol, CalibratedClock, Clock, ManualClock, OrderStatus, OrderType, Price,
        Quantity, RejectReason, SequencedMessage, Side, TimeInForce, Venue,
    };
    pub use crate::engine::{
        FeeStructure, Fill, LatencyProfile, MatchingEngine, Order, OrderBook,
    };
    pub use crate::fabric::{self, MpscRing, SpscRing, SpscSequencer, TimestampSequencer};
    pub use crate::ledger::{Position, PositionLedger};
    pub use crate::risk::{Authorization, Decision, RiskGate, RiskLimits};
    pub use crate::{Error, Result};
}
