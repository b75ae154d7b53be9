//! Shared scalar types, the sequenced message, time sources and
//! rejection values

pub mod clock;
pub mod errors;
pub mod message;
pub mod types;

pub use clock::{CalibratedClock, Clock, ManualClock};
pub use errors::{
    MarketRiskKind, OperationalKind, RateLimitKind, RejectReason, RiskEventKind,
};
pub use message::{MessageKind, Payload, SequencedMessage};
pub use types::{
    fixed_point, symbol, Asset, OrderId, OrderStatus, OrderType, Price, Quantity, Side,
    StrategyId, SymbolId, TimeInForce, Venue, MAX_VENUES,
};
