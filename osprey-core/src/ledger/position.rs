//! Per-(venue, symbol) position with volume-weighted average cost
//!
//! Quantities are signed fixed-point (scale 10^8); P&L is kept in USD
//! floating point, which never feeds back into ordering or matching.

use crate::core::types::{fixed_point, Price, Quantity};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    /// Net position: positive long, negative short (fixed-point)
    pub quantity: i64,
    /// Volume-weighted average price of the still-open side
    pub avg_price: Price,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    /// Total traded volume, sum of absolute fills (fixed-point)
    pub total_volume: Quantity,
    pub last_update_ns: u64,
}

impl Position {
    /// Apply a trade. Returns the realised P&L delta (zero unless the
    /// trade reduces or flips the position).
    ///
    /// Reducing keeps the average price; flipping books realised P&L for
    /// the closed portion, then the remainder opens at the execution
    /// price.
    pub fn add_trade(&mut self, trade_qty: i64, trade_price: Price, now_ns: u64) -> f64 {
        if trade_qty == 0 {
            return 0.0;
        }

        let mut realized_delta = 0.0;
        let old_qty = self.quantity;

        if old_qty != 0 && (old_qty > 0) != (trade_qty > 0) {
            let closing = trade_qty.unsigned_abs().min(old_qty.unsigned_abs());
            let direction = if old_qty > 0 { 1.0 } else { -1.0 };
            realized_delta = fixed_point::to_f64(closing)
                * (fixed_point::to_f64(trade_price) - fixed_point::to_f64(self.avg_price))
                * direction;
            self.realized_pnl += realized_delta;
        }

        if old_qty == 0 {
            self.avg_price = trade_price;
        } else if (old_qty > 0) == (trade_qty > 0) {
            // Adding to the open side: new volume-weighted average
            let abs_old = old_qty.unsigned_abs() as u128;
            let abs_trade = trade_qty.unsigned_abs() as u128;
            let abs_new = abs_old + abs_trade;
            self.avg_price = ((self.avg_price as u128 * abs_old
                + trade_price as u128 * abs_trade)
                / abs_new) as Price;
        } else if trade_qty.unsigned_abs() > old_qty.unsigned_abs() {
            // Sign flip: the remainder opens fresh at the execution price
            self.avg_price = trade_price;
        }

        self.quantity = old_qty + trade_qty;
        if self.quantity == 0 {
            self.avg_price = 0;
            self.unrealized_pnl = 0.0;
        }
        self.total_volume += trade_qty.unsigned_abs();
        self.last_update_ns = now_ns;
        realized_delta
    }

    /// Recompute mark-to-market P&L against `mark`
    pub fn update_unrealized(&mut self, mark: Price) {
        if self.quantity != 0 {
            self.unrealized_pnl = fixed_point::to_f64_signed(self.quantity)
                * (fixed_point::to_f64(mark) - fixed_point::to_f64(self.avg_price));
        } else {
            self.unrealized_pnl = 0.0;
        }
    }

    pub fn total_pnl(&self) -> f64 {
        self.realized_pnl + self.unrealized_pnl
    }

    #[inline]
    pub fn is_flat(&self) -> bool {
        self.quantity == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(value: f64) -> u64 {
        fixed_point::from_f64(value)
    }

    #[test]
    fn test_open_long_sets_avg() {
        let mut pos = Position::default();
        pos.add_trade(fp(2.0) as i64, fp(100.0), 1);
        assert_eq!(pos.quantity, fp(2.0) as i64);
        assert_eq!(pos.avg_price, fp(100.0));
        assert_eq!(pos.realized_pnl, 0.0);
    }

    #[test]
    fn test_adding_updates_vwap() {
        let mut pos = Position::default();
        pos.add_trade(fp(1.0) as i64, fp(100.0), 1);
        pos.add_trade(fp(1.0) as i64, fp(110.0), 2);
        assert_eq!(pos.avg_price, fp(105.0));
        assert_eq!(pos.quantity, fp(2.0) as i64);
    }

    #[test]
    fn test_reduce_books_realized_keeps_avg() {
        let mut pos = Position::default();
        pos.add_trade(fp(2.0) as i64, fp(100.0), 1);
        let delta = pos.add_trade(-(fp(1.0) as i64), fp(110.0), 2);
        assert!((delta - 10.0).abs() < 1e-9);
        assert_eq!(pos.avg_price, fp(100.0));
        assert_eq!(pos.quantity, fp(1.0) as i64);
    }

    #[test]
    fn test_flip_long_to_short() {
        // S6: +1.0 @ 100, then -1.5 @ 120
        let mut pos = Position::default();
        pos.add_trade(fp(1.0) as i64, fp(100.0), 1);
        let delta = pos.add_trade(-(fp(1.5) as i64), fp(120.0), 2);

        assert!((delta - 20.0).abs() < 1e-9);
        assert_eq!(pos.quantity, -(fp(0.5) as i64));
        assert_eq!(pos.avg_price, fp(120.0));

        pos.update_unrealized(fp(110.0));
        assert!((pos.unrealized_pnl - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_flat_position_has_zero_unrealized() {
        let mut pos = Position::default();
        pos.add_trade(fp(1.0) as i64, fp(100.0), 1);
        pos.add_trade(-(fp(1.0) as i64), fp(105.0), 2);
        assert!(pos.is_flat());
        pos.update_unrealized(fp(200.0));
        assert_eq!(pos.unrealized_pnl, 0.0);
        assert!((pos.realized_pnl - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_short_side_realized_sign() {
        let mut pos = Position::default();
        pos.add_trade(-(fp(1.0) as i64), fp(100.0), 1);
        // Buying back lower is a gain for a short
        let delta = pos.add_trade(fp(1.0) as i64, fp(90.0), 2);
        assert!((delta - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_bookkeeping_identity() {
        // For a book that never flips sign:
        //   sum(q_i) == quantity, and
        //   avg_price * |quantity| - realized == sum(p_i * q_i)
        let mut pos = Position::default();
        let trades = [(1.0, 100.0), (2.0, 101.0), (-1.5, 103.0), (0.5, 99.0)];
        let mut signed_qty = 0.0;
        let mut signed_notional = 0.0;
        for (qty, price) in trades {
            pos.add_trade(fixed_point::from_f64_signed(qty), fp(price), 1);
            signed_qty += qty;
            signed_notional += qty * price;
        }
        assert!((fixed_point::to_f64_signed(pos.quantity) - signed_qty).abs() < 1e-8);

        let open_cost = fixed_point::to_f64_signed(pos.quantity).abs()
            * fixed_point::to_f64(pos.avg_price);
        assert!((open_cost - pos.realized_pnl - signed_notional).abs() < 1e-6);
    }
}
