//! Per-venue balances
//!
//! Each venue account tracks `total` and `available` per asset.
//! `available` is what remains spendable after open-order exposure;
//! debits to `available` must precede order exposure.

use crate::core::types::Asset;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssetBalance {
    pub total: f64,
    pub available: f64,
}

impl AssetBalance {
    const fn new(amount: f64) -> Self {
        Self { total: amount, available: amount }
    }
}

/// Simulated starting account: 1 BTC, 10 ETH, $50k per venue
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeBalance {
    btc: AssetBalance,
    eth: AssetBalance,
    usd: AssetBalance,
    pub last_update_ns: u64,
}

impl Default for ExchangeBalance {
    fn default() -> Self {
        Self {
            btc: AssetBalance::new(1.0),
            eth: AssetBalance::new(10.0),
            usd: AssetBalance::new(50_000.0),
            last_update_ns: 0,
        }
    }
}

impl ExchangeBalance {
    pub fn balance(&self, asset: Asset) -> AssetBalance {
        match asset {
            Asset::Btc => self.btc,
            Asset::Eth => self.eth,
            Asset::Usd => self.usd,
        }
    }

    fn balance_mut(&mut self, asset: Asset) -> &mut AssetBalance {
        match asset {
            Asset::Btc => &mut self.btc,
            Asset::Eth => &mut self.eth,
            Asset::Usd => &mut self.usd,
        }
    }

    /// Apply a settlement delta to one asset
    pub fn apply(&mut self, asset: Asset, delta_total: f64, delta_available: f64, now_ns: u64) {
        let entry = self.balance_mut(asset);
        entry.total += delta_total;
        entry.available += delta_available;
        debug_assert!(
            entry.available <= entry.total + 1e-9,
            "available exceeds total for {:?}",
            asset
        );
        self.last_update_ns = now_ns;
    }

    /// Reserve `amount` of `asset` against open-order exposure
    pub fn reserve(&mut self, asset: Asset, amount: f64, now_ns: u64) -> bool {
        let entry = self.balance_mut(asset);
        if entry.available < amount {
            return false;
        }
        entry.available -= amount;
        self.last_update_ns = now_ns;
        true
    }

    /// Release a reservation made with [`reserve`](Self::reserve)
    pub fn release(&mut self, asset: Asset, amount: f64, now_ns: u64) {
        let entry = self.balance_mut(asset);
        entry.available = (entry.available + amount).min(entry.total);
        self.last_update_ns = now_ns;
    }

    pub fn has_available(&self, asset: Asset, amount: f64) -> bool {
        self.balance(asset).available >= amount
    }
}
