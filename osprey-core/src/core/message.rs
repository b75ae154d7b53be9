//! Sequenced message: the fundamental unit of data flow
//!
//! The source layout packs sequencing information first (most frequently
//! accessed), routing second, payload last. The payload is a tagged enum
//! over fixed-size variants; readers pattern-match and the compiler
//! enforces exhaustiveness. With the discriminant the record no longer
//! fits a single cache line, so it occupies exactly two, still aligned to
//! a cache-line boundary.

use crate::core::types::{
    OrderId, OrderStatus, OrderType, Price, Quantity, Side, StrategyId, SymbolId, TimeInForce,
    Venue,
};

/// Message taxonomy. Lower ranges are higher frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    // Market data (0-9)
    MarketDataTick = 0,
    OrderBookUpdate = 1,
    Trade = 2,
    Imbalance = 3,
    Auction = 4,

    // Order management (10-19)
    NewOrder = 10,
    CancelOrder = 11,
    ReplaceOrder = 12,
    OrderAck = 13,
    OrderReject = 14,
    Fill = 15,
    PartialFill = 16,
    CancelAck = 17,
    CancelReject = 18,

    // Position & risk (20-29)
    PositionUpdate = 20,
    RiskLimit = 21,
    PnlUpdate = 22,

    // Strategy (30-39)
    Signal = 30,

    // System (40-49)
    Heartbeat = 40,
    StartOfDay = 41,
    EndOfDay = 42,
    Halt = 43,
    Resume = 44,

    // Control (50+)
    Shutdown = 50,
    EmergencyStop = 51,
}

/// Fixed-size message payload
///
/// The discriminant doubles as the payload tag; `SequencedMessage::kind`
/// carries routing intent (e.g. `Fill` vs `PartialFill`) without forcing
/// a payload match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Payload {
    /// Top-of-book update
    MarketTick {
        bid_price: Price,
        bid_size: Quantity,
        ask_price: Price,
        ask_size: Quantity,
    },
    /// Order state transfer
    Order {
        order_id: OrderId,
        price: Price,
        quantity: Quantity,
        side: Side,
        order_type: OrderType,
        tif: TimeInForce,
        status: OrderStatus,
    },
    /// Net position snapshot
    Position {
        quantity: i64,
        realized_pnl: i64,
        unrealized_pnl: i64,
        exposure: u64,
    },
    /// Trading signal
    Signal {
        signal_kind: u32,
        strength: f32,
        target_price: Price,
        confidence: f32,
        expected_edge_bps: f32,
        hold_time_ms: u16,
    },
    /// Execution report
    Fill {
        order_id: OrderId,
        fill_price: Price,
        fill_quantity: Quantity,
        trade_id: u64,
        /// Transaction fee in signed fixed-point; negative is a rebate
        fee: i64,
    },
    /// Risk limit update
    RiskLimit {
        max_position: i64,
        max_exposure: u64,
        max_order_size: u64,
        max_order_rate: u32,
        max_loss: f32,
    },
    /// Raw payload for custom messages
    Raw([u8; 32]),
}

/// Cache-aligned sequenced message
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C, align(64))]
pub struct SequencedMessage {
    /// Assigned by a sequencer; strictly monotonic per instance
    pub sequence: u64,
    /// Hardware-sourced nanosecond timestamp at sequence assignment
    pub timestamp_ns: u64,
    pub kind: MessageKind,
    pub venue: Venue,
    pub symbol_id: SymbolId,
    pub strategy_id: StrategyId,
    /// Component that created the message
    pub source_id: u16,
    /// Request/response correlation
    pub correlation_id: u64,
    pub payload: Payload,
}

impl SequencedMessage {
    fn with_payload(kind: MessageKind, venue: Venue, symbol_id: SymbolId, payload: Payload) -> Self {
        Self {
            sequence: 0,
            timestamp_ns: 0,
            kind,
            venue,
            symbol_id,
            strategy_id: 0,
            source_id: 0,
            correlation_id: 0,
            payload,
        }
    }

    pub fn market_tick(
        venue: Venue,
        symbol_id: SymbolId,
        bid_price: Price,
        bid_size: Quantity,
        ask_price: Price,
        ask_size: Quantity,
    ) -> Self {
        Self::with_payload(
            MessageKind::MarketDataTick,
            venue,
            symbol_id,
            Payload::MarketTick { bid_price, bid_size, ask_price, ask_size },
        )
    }

    pub fn new_order(venue: Venue, symbol_id: SymbolId, order_id: OrderId, side: Side,
                     order_type: OrderType, tif: TimeInForce, price: Price, quantity: Quantity) -> Self {
        Self::with_payload(
            MessageKind::NewOrder,
            venue,
            symbol_id,
            Payload::Order {
                order_id,
                price,
                quantity,
                side,
                order_type,
                tif,
                status: OrderStatus::Pending,
            },
        )
    }

    pub fn fill(venue: Venue, symbol_id: SymbolId, order_id: OrderId, fill_price: Price,
                fill_quantity: Quantity, trade_id: u64, fee: i64, partial: bool) -> Self {
        let kind = if partial { MessageKind::PartialFill } else { MessageKind::Fill };
        Self::with_payload(
            kind,
            venue,
            symbol_id,
            Payload::Fill { order_id, fill_price, fill_quantity, trade_id, fee },
        )
    }

    pub fn heartbeat(venue: Venue) -> Self {
        Self::with_payload(MessageKind::Heartbeat, venue, 0, Payload::Raw([0; 32]))
    }

    /// Latency-critical messages require immediate processing
    #[inline(always)]
    pub fn is_critical(&self) -> bool {
        matches!(
            self.kind,
            MessageKind::Fill
                | MessageKind::PartialFill
                | MessageKind::OrderReject
                | MessageKind::MarketDataTick
        )
    }
}

impl Default for SequencedMessage {
    fn default() -> Self {
        Self::heartbeat(Venue::Binance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment_and_size() {
        assert_eq!(std::mem::align_of::<SequencedMessage>(), 64);
        // Two cache lines: header plus tagged payload
        assert!(std::mem::size_of::<SequencedMessage>() <= 128);
    }

    #[test]
    fn test_critical_classification() {
        let tick = SequencedMessage::market_tick(Venue::Binance, 1, 100, 1, 101, 1);
        assert!(tick.is_critical());

        let hb = SequencedMessage::heartbeat(Venue::Coinbase);
        assert!(!hb.is_critical());

        let fill = SequencedMessage::fill(Venue::Binance, 1, 7, 100, 1, 1, 0, false);
        assert!(fill.is_critical());
        assert_eq!(fill.kind, MessageKind::Fill);

        let partial = SequencedMessage::fill(Venue::Binance, 1, 7, 100, 1, 1, 0, true);
        assert_eq!(partial.kind, MessageKind::PartialFill);
    }

    #[test]
    fn test_payload_matches_kind() {
        let msg = SequencedMessage::market_tick(Venue::Binance, 1, 100, 5, 101, 6);
        match msg.payload {
            Payload::MarketTick { bid_price, ask_price, .. } => {
                assert_eq!(bid_price, 100);
                assert_eq!(ask_price, 101);
            }
            _ => panic!("expected MarketTick payload"),
        }
    }
}
