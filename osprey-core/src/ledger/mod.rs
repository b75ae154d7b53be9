//! Position & P&L ledger
//!
//! Single owner of positions, balances and marks. The engine thread
//! mutates it; the risk gate queries it. Interior state sits behind one
//! `parking_lot::Mutex` so the gate can hold an `Arc` without a second
//! locking discipline.

pub mod balance;
pub mod position;

pub use balance::{AssetBalance, ExchangeBalance};
pub use position::Position;

use crate::core::clock::Clock;
use crate::core::types::{fixed_point, symbol, Asset, Price, SymbolId, Venue};
use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Ledger starting equity: two venues at $50k
const STARTING_EQUITY: f64 = 100_000.0;

/// Linear plus square-root market impact, applied to quoted prices
/// before recording a slippage-adjusted execution
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SlippageModel {
    /// Permanent impact per unit of participation (1bp default)
    pub linear_impact: f64,
    /// Square-root impact coefficient
    pub square_root_impact: f64,
    /// Temporary impact added for takers
    pub temporary_impact: f64,
}

impl Default for SlippageModel {
    fn default() -> Self {
        Self {
            linear_impact: 0.0001,
            square_root_impact: 0.001,
            temporary_impact: 0.0005,
        }
    }
}

impl SlippageModel {
    /// Fractional price impact for a trade of `quantity` units against
    /// `avg_volume` typical volume
    pub fn slippage_fraction(
        &self,
        quantity: f64,
        avg_volume: f64,
        half_spread: f64,
        is_taker: bool,
    ) -> f64 {
        let participation = quantity.abs() / avg_volume.max(f64::EPSILON);
        let mut impact =
            self.linear_impact * participation + self.square_root_impact * participation.sqrt();
        if is_taker {
            impact += half_spread + self.temporary_impact;
        }
        impact
    }
}

/// Append-only trade log, CSV with a header written on creation
struct TradeLog {
    file: File,
}

impl TradeLog {
    fn create(path: &Path) -> Result<Self> {
        let mut file = File::create(path)
            .with_context(|| format!("creating trade log {}", path.display()))?;
        writeln!(file, "timestamp,venue,symbol,side,quantity,price,notional")?;
        Ok(Self { file })
    }

    fn append(
        &mut self,
        timestamp_ns: u64,
        venue: Venue,
        sym: SymbolId,
        quantity: f64,
        price: f64,
    ) {
        let side = if quantity > 0.0 { "BUY" } else { "SELL" };
        if let Err(error) = writeln!(
            self.file,
            "{},{},{},{},{},{},{}",
            timestamp_ns,
            venue,
            symbol::name(sym),
            side,
            quantity,
            price,
            quantity * price
        ) {
            warn!(%error, "trade log append failed");
        }
    }
}

struct LedgerState {
    positions: HashMap<(Venue, SymbolId), Position>,
    balances: HashMap<Venue, ExchangeBalance>,
    marks: HashMap<(Venue, SymbolId), Price>,
    slippage: HashMap<SymbolId, SlippageModel>,
    avg_volumes: HashMap<SymbolId, f64>,
    peak_equity: f64,
    max_drawdown: f64,
    total_realized: f64,
    session_start_ns: u64,
    trade_log: Option<TradeLog>,
}

/// Position & P&L ledger over per-venue accounts
pub struct PositionLedger {
    state: Mutex<LedgerState>,
    clock: Arc<dyn Clock>,
}

impl PositionLedger {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let now = clock.now_ns();
        let mut balances = HashMap::new();
        balances.insert(Venue::Coinbase, ExchangeBalance::default());
        balances.insert(Venue::Binance, ExchangeBalance::default());

        let mut slippage = HashMap::new();
        slippage.insert(symbol::BTC_USD, SlippageModel::default());
        slippage.insert(symbol::ETH_USD, SlippageModel::default());

        let mut avg_volumes = HashMap::new();
        avg_volumes.insert(symbol::BTC_USD, 100.0);
        avg_volumes.insert(symbol::ETH_USD, 1_000.0);

        Self {
            state: Mutex::new(LedgerState {
                positions: HashMap::new(),
                balances,
                marks: HashMap::new(),
                slippage,
                avg_volumes,
                peak_equity: STARTING_EQUITY,
                max_drawdown: 0.0,
                total_realized: 0.0,
                session_start_ns: now,
                trade_log: None,
            }),
            clock,
        }
    }

    /// Attach an append-only CSV trade log; the header row is written
    /// immediately
    pub fn with_trade_log(clock: Arc<dyn Clock>, path: impl AsRef<Path>) -> Result<Self> {
        let ledger = Self::new(clock);
        ledger.state.lock().trade_log = Some(TradeLog::create(path.as_ref())?);
        Ok(ledger)
    }

    /// Record an execution. `quantity` is signed fixed-point; positive
    /// buys, negative sells. Returns the realised P&L delta.
    pub fn add_trade(&self, venue: Venue, sym: SymbolId, quantity: i64, price: Price) -> f64 {
        let now = self.clock.now_ns();
        let mut state = self.state.lock();

        let realized = state
            .positions
            .entry((venue, sym))
            .or_default()
            .add_trade(quantity, price, now);

        // Settlement: base asset moves with the trade, quote moves by
        // the notional
        let qty_f = fixed_point::to_f64_signed(quantity);
        let price_f = fixed_point::to_f64(price);
        if let Some(asset) = Asset::base_of(sym) {
            let balance = state.balances.entry(venue).or_default();
            balance.apply(asset, qty_f, qty_f, now);
            balance.apply(Asset::Usd, -qty_f * price_f, -qty_f * price_f, now);
        }

        if let Some(log) = state.trade_log.as_mut() {
            log.append(now, venue, sym, qty_f, price_f);
        }

        Self::update_performance(&mut state);
        debug!(%venue, symbol = sym, qty = qty_f, price = price_f, realized, "trade recorded");
        realized
    }

    /// Record an execution after perturbing the quoted price by the
    /// symbol's slippage model
    pub fn add_trade_with_slippage(
        &self,
        venue: Venue,
        sym: SymbolId,
        quantity: i64,
        quoted_price: Price,
        is_taker: bool,
    ) -> f64 {
        let (model, avg_volume) = {
            let state = self.state.lock();
            (
                state.slippage.get(&sym).copied().unwrap_or_default(),
                state.avg_volumes.get(&sym).copied().unwrap_or(100.0),
            )
        };

        let qty_f = fixed_point::to_f64_signed(quantity);
        let slip = model.slippage_fraction(qty_f, avg_volume, 0.0005, is_taker);
        let direction = if quantity > 0 { 1.0 } else { -1.0 };
        let executed = fixed_point::to_f64(quoted_price) * (1.0 + direction * slip);

        self.add_trade(venue, sym, quantity, fixed_point::from_f64(executed))
    }

    /// Set the last observed mark and refresh unrealised P&L
    pub fn update_market_price(&self, venue: Venue, sym: SymbolId, mark: Price) {
        let mut state = self.state.lock();
        state.marks.insert((venue, sym), mark);
        if let Some(pos) = state.positions.get_mut(&(venue, sym)) {
            pos.update_unrealized(mark);
        }
    }

    pub fn get_position(&self, venue: Venue, sym: SymbolId) -> Position {
        self.state
            .lock()
            .positions
            .get(&(venue, sym))
            .copied()
            .unwrap_or_default()
    }

    pub fn get_balance(&self, venue: Venue) -> ExchangeBalance {
        self.state
            .lock()
            .balances
            .get(&venue)
            .cloned()
            .unwrap_or_default()
    }

    /// Quote balances plus marked value of base holdings, across venues
    pub fn total_equity(&self) -> f64 {
        Self::equity(&self.state.lock())
    }

    pub fn total_unrealized_pnl(&self) -> f64 {
        self.state
            .lock()
            .positions
            .values()
            .map(|position| position.unrealized_pnl)
            .sum()
    }

    pub fn total_realized_pnl(&self) -> f64 {
        self.state.lock().total_realized
    }

    /// Session P&L: realised plus mark-to-market, across all positions
    pub fn daily_pnl(&self) -> f64 {
        let state = self.state.lock();
        state.total_realized
            + state
                .positions
                .values()
                .map(|position| position.unrealized_pnl)
                .sum::<f64>()
    }

    pub fn max_drawdown(&self) -> f64 {
        self.state.lock().max_drawdown
    }

    pub fn peak_equity(&self) -> f64 {
        self.state.lock().peak_equity
    }

    pub fn session_start_ns(&self) -> u64 {
        self.state.lock().session_start_ns
    }

    /// Would the venue's balances support this order? Read-only.
    pub fn can_trade(&self, venue: Venue, sym: SymbolId, quantity: i64, price: Price) -> bool {
        let state = self.state.lock();
        let Some(balance) = state.balances.get(&venue) else {
            return false;
        };
        let notional =
            fixed_point::to_f64_signed(quantity).abs() * fixed_point::to_f64(price);
        if quantity > 0 {
            balance.has_available(Asset::Usd, notional)
        } else {
            match Asset::base_of(sym) {
                Some(asset) => {
                    balance.has_available(asset, fixed_point::to_f64_signed(quantity).abs())
                }
                None => false,
            }
        }
    }

    fn equity(state: &LedgerState) -> f64 {
        let mut total = 0.0;
        for (venue, balance) in &state.balances {
            total += balance.balance(Asset::Usd).total;
            for (sym, asset) in [(symbol::BTC_USD, Asset::Btc), (symbol::ETH_USD, Asset::Eth)] {
                if let Some(mark) = state.marks.get(&(*venue, sym)) {
                    total += balance.balance(asset).total * fixed_point::to_f64(*mark);
                }
            }
        }
        total
    }

    fn update_performance(state: &mut LedgerState) {
        let equity = Self::equity(state);
        if equity > state.peak_equity {
            state.peak_equity = equity;
        } else {
            let drawdown = state.peak_equity - equity;
            if drawdown > state.max_drawdown {
                state.max_drawdown = drawdown;
            }
        }

        state.total_realized = state
            .positions
            .values()
            .map(|position| position.realized_pnl)
            .sum();
    }
}
