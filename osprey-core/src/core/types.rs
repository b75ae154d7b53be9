//! Core scalar types shared by every component
//!
//! All prices and quantities are unsigned 64-bit fixed-point with eight
//! decimal places. Ordering and matching logic operates on these integers
//! only; floating point appears exclusively in accounting (fees, P&L) and
//! risk statistics.

use std::fmt;

/// Price in fixed-point, scale 10^8
pub type Price = u64;

/// Quantity in fixed-point, scale 10^8
pub type Quantity = u64;

/// Monotonic order identifier, assigned per matching-engine instance.
/// Zero is reserved: a returned id of 0 means the order was rejected.
pub type OrderId = u64;

/// Internal symbol identifier
pub type SymbolId = u16;

/// Strategy / trader identifier
pub type StrategyId = u16;

/// Fixed-point conversion utilities (scale 10^8)
pub mod fixed_point {
    /// Scale factor for eight decimal places
    pub const SCALE: u64 = 100_000_000;

    /// Convert f64 to fixed-point, truncating toward zero
    #[inline(always)]
    pub fn from_f64(value: f64) -> u64 {
        if value <= 0.0 {
            return 0;
        }
        (value * SCALE as f64) as u64
    }

    /// Convert fixed-point to f64
    #[inline(always)]
    pub fn to_f64(value: u64) -> f64 {
        value as f64 / SCALE as f64
    }

    /// Convert f64 to signed fixed-point, truncating toward zero
    #[inline(always)]
    pub fn from_f64_signed(value: f64) -> i64 {
        (value * SCALE as f64) as i64
    }

    /// Convert signed fixed-point to f64
    #[inline(always)]
    pub fn to_f64_signed(value: i64) -> f64 {
        value as f64 / SCALE as f64
    }

    /// Notional of a (price, quantity) pair, still in fixed-point.
    /// Widening through u128 so 50,000.0 * 10.0 cannot overflow.
    #[inline(always)]
    pub fn notional(price: u64, quantity: u64) -> u64 {
        ((price as u128 * quantity as u128) / SCALE as u128) as u64
    }
}

/// Trading venues known to the simulator
///
/// Single byte so the tag fits the message header. The numeric values
/// index per-venue counter arrays in the fabric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Venue {
    Binance = 0,
    Coinbase = 1,
    Cme = 2,
    Nyse = 3,
    Nasdaq = 4,
    Eurex = 5,
    Deribit = 6,
    Okx = 7,
    Bats = 8,
    Ice = 9,
}

/// Upper bound for per-venue counter arrays
pub const MAX_VENUES: usize = 16;

impl Venue {
    /// Index into per-venue counter arrays
    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Venue::Binance => "BINANCE",
            Venue::Coinbase => "COINBASE",
            Venue::Cme => "CME",
            Venue::Nyse => "NYSE",
            Venue::Nasdaq => "NASDAQ",
            Venue::Eurex => "EUREX",
            Venue::Deribit => "DERIBIT",
            Venue::Okx => "OKX",
            Venue::Bats => "BATS",
            Venue::Ice => "ICE",
        }
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order side
///
/// `Buy`/`Sell` is the canonical pair; bid/ask book sides are derived at
/// the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Side {
    Buy = 0,
    Sell = 1,
}

impl Side {
    #[inline(always)]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Sign of the position delta this side produces
    #[inline(always)]
    pub const fn sign(self) -> i64 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OrderType {
    /// Standard limit order; may rest
    Limit = 0,
    /// Market order; consumes liquidity, never rests
    Market = 1,
    /// Maker only; rejected at submission if it would cross
    PostOnly = 2,
}

/// Time in force
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TimeInForce {
    /// Valid for the trading day
    Day = 0,
    /// Good till cancelled
    Gtc = 1,
    /// Immediate or cancel: residue is cancelled rather than resting
    Ioc = 2,
    /// Fill or kill: rejected unless fully fillable at submission
    Fok = 3,
}

/// Order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OrderStatus {
    Pending = 0,
    Acknowledged = 1,
    PartiallyFilled = 2,
    Filled = 3,
    Cancelled = 4,
    Rejected = 5,
    Expired = 6,
}

/// Known symbols and their settlement assets
pub mod symbol {
    use super::SymbolId;

    pub const BTC_USD: SymbolId = 1;
    pub const ETH_USD: SymbolId = 2;

    pub fn name(symbol: SymbolId) -> &'static str {
        match symbol {
            BTC_USD => "BTC-USD",
            ETH_USD => "ETH-USD",
            _ => "UNKNOWN",
        }
    }
}

/// Settlement assets tracked by the ledger balances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Asset {
    Btc,
    Eth,
    Usd,
}

impl Asset {
    /// Base asset of a known symbol, if any
    pub fn base_of(symbol: SymbolId) -> Option<Asset> {
        match symbol {
            symbol_id if symbol_id == symbol::BTC_USD => Some(Asset::Btc),
            symbol_id if symbol_id == symbol::ETH_USD => Some(Asset::Eth),
            _ => None,
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Btc => write!(f, "BTC"),
            Asset::Eth => write!(f, "ETH"),
            Asset::Usd => write!(f, "USD"),
        }
    }
}
