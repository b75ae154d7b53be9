//! Maker/taker fee accounting
//!
//! All fee computation lives in [`FeeStructure::fee`]: takers pay at
//! least the configured minimum fee, makers receive at least the
//! configured minimum rebate in absolute terms. Fees are quote-currency
//! floats; they never touch matching arithmetic.

use crate::core::types::{fixed_point, Price, Quantity};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeeStructure {
    /// Maker rebate rate on notional; negative means the maker is paid
    pub maker_rebate: f64,
    /// Taker fee rate on notional
    pub taker_fee: f64,
    /// Floor for taker fees, in quote currency
    pub minimum_fee: f64,
    /// Floor for maker rebates, in quote currency (absolute terms)
    pub minimum_rebate: f64,
}

impl Default for FeeStructure {
    fn default() -> Self {
        Self {
            maker_rebate: -0.0002, // -2 bps
            taker_fee: 0.0003,     // 3 bps
            minimum_fee: 0.01,
            minimum_rebate: 0.0,
        }
    }
}

impl FeeStructure {
    /// Signed fee for one side of a match. Positive is paid by the
    /// trader, negative is a rebate received.
    pub fn fee(&self, price: Price, quantity: Quantity, is_maker: bool) -> f64 {
        let notional = fixed_point::to_f64(price) * fixed_point::to_f64(quantity);
        if is_maker {
            -(notional * self.maker_rebate.abs()).max(self.minimum_rebate.abs())
        } else {
            (notional * self.taker_fee).max(self.minimum_fee)
        }
    }
}
