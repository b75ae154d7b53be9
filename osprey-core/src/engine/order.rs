//! Orders and fills as the matching engine sees them

use crate::core::types::{
    OrderId, OrderStatus, OrderType, Price, Quantity, Side, StrategyId, SymbolId, TimeInForce,
};

/// An order inside the matching engine
///
/// Owned exclusively by the book between acknowledgement and removal.
/// `priority` is the per-book arrival counter used to break timestamp
/// ties in time priority.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: OrderId,
    pub symbol: SymbolId,
    pub side: Side,
    pub order_type: OrderType,
    pub price: Price,
    pub quantity: Quantity,
    pub filled_quantity: Quantity,
    pub timestamp_ns: u64,
    pub priority: u32,
    pub trader: StrategyId,
    pub tif: TimeInForce,
    pub status: OrderStatus,
    pub sequence: u64,
}

impl Order {
    pub fn limit(symbol: SymbolId, side: Side, price: Price, quantity: Quantity, trader: StrategyId) -> Self {
        Self {
            id: 0,
            symbol,
            side,
            order_type: OrderType::Limit,
            price,
            quantity,
            filled_quantity: 0,
            timestamp_ns: 0,
            priority: 0,
            trader,
            tif: TimeInForce::Gtc,
            status: OrderStatus::Pending,
            sequence: 0,
        }
    }

    pub fn market(symbol: SymbolId, side: Side, quantity: Quantity, trader: StrategyId) -> Self {
        let mut order = Self::limit(symbol, side, 0, quantity, trader);
        order.order_type = OrderType::Market;
        order.tif = TimeInForce::Ioc;
        order
    }

    pub fn post_only(symbol: SymbolId, side: Side, price: Price, quantity: Quantity, trader: StrategyId) -> Self {
        let mut order = Self::limit(symbol, side, price, quantity, trader);
        order.order_type = OrderType::PostOnly;
        order
    }

    /// Same limit order with a different time in force
    pub fn with_tif(mut self, tif: TimeInForce) -> Self {
        self.tif = tif;
        self
    }

    #[inline(always)]
    pub fn remaining(&self) -> Quantity {
        self.quantity - self.filled_quantity
    }

    #[inline(always)]
    pub fn is_fully_filled(&self) -> bool {
        self.filled_quantity >= self.quantity
    }

    /// Record a partial or complete fill and advance the lifecycle
    pub fn apply_fill(&mut self, fill_quantity: Quantity) {
        debug_assert!(fill_quantity <= self.remaining(), "fill exceeds remaining");
        self.filled_quantity += fill_quantity;
        self.status = if self.is_fully_filled() {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
    }
}

/// Execution report, produced by value and consumed by the ledger
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub order_id: OrderId,
    pub trader: StrategyId,
    pub symbol: SymbolId,
    pub side: Side,
    pub price: Price,
    pub quantity: Quantity,
    pub timestamp_ns: u64,
    pub trade_id: u64,
    /// Signed fee in quote currency; negative is a maker rebate
    pub fee: f64,
    pub is_maker: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining_and_lifecycle() {
        let mut order = Order::limit(1, Side::Buy, 100, 1_000, 7);
        assert_eq!(order.remaining(), 1_000);
        assert!(!order.is_fully_filled());

        order.apply_fill(400);
        assert_eq!(order.remaining(), 600);
        assert_eq!(order.status, OrderStatus::PartiallyFilled);

        order.apply_fill(600);
        assert_eq!(order.remaining(), 0);
        assert_eq!(order.status, OrderStatus::Filled);
    }

    #[test]
    fn test_market_orders_are_ioc() {
        let order = Order::market(1, Side::Sell, 500, 3);
        assert_eq!(order.order_type, OrderType::Market);
        assert_eq!(order.tif, TimeInForce::Ioc);
        assert_eq!(order.price, 0);
    }

    #[test]
    fn test_with_tif() {
        let order = Order::limit(1, Side::Buy, 100, 1_000, 7).with_tif(TimeInForce::Fok);
        assert_eq!(order.tif, TimeInForce::Fok);
    }
}
