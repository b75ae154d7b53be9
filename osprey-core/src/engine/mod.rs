//! Deterministic exchange matching engine
//!
//! Price-time priority books per symbol, with the submit/cancel path
//! decoupled from execution by a deferred work queue: submissions and
//! cancels are acknowledged after a jittered simulated latency, and BBO
//! publication is likewise scheduled rather than immediate. A caller
//! driving [`MatchingEngine::process_matching`] in a tight loop never
//! blocks; work items release when their execute-time passes.
//!
//! ```text
//!  submit_order ──▶ validate ──▶ rate gate ──▶ [ack @ t+latency]
//!                                                    │
//!  process_matching: drain due items ──▶ match loop ──▶ fills
//!                         │                   │
//!                    cancels apply      impact + hidden
//!                                       liquidity seeding
//! ```

pub mod book;
pub mod fees;
pub mod order;

pub use book::OrderBook;
pub use fees::FeeStructure;
pub use order::{Fill, Order};

use crate::core::clock::Clock;
use crate::core::errors::{RateLimitKind, RejectReason};
use crate::core::types::{
    fixed_point, OrderId, OrderStatus, OrderType, Price, Quantity, Side, StrategyId, SymbolId,
    TimeInForce,
};
use crate::core::types::symbol;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, warn};

/// Pseudo-trader that owns hidden-liquidity orders
pub const HIDDEN_LIQUIDITY_TRADER: StrategyId = u16::MAX;

/// One simulated latency band: mean plus uniform jitter, microseconds
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LatencyBand {
    pub mean_us: f64,
    pub jitter_us: f64,
}

impl LatencyBand {
    pub const fn new(mean_us: f64, jitter_us: f64) -> Self {
        Self { mean_us, jitter_us }
    }

    fn sample_ns(&self, rng: &mut StdRng) -> u64 {
        let jitter = if self.jitter_us > 0.0 {
            rng.gen_range(-self.jitter_us..self.jitter_us)
        } else {
            0.0
        };
        ((self.mean_us + jitter).max(0.0) * 1_000.0) as u64
    }
}

/// Simulated exchange latency and per-trader message-rate controls
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LatencyProfile {
    pub order_ack: LatencyBand,
    pub cancel_ack: LatencyBand,
    pub fill: LatencyBand,
    pub market_data: LatencyBand,
    /// Orders per second per trader
    pub max_order_rate: f64,
    /// Cancel-to-fill ratio cap per trader
    pub max_cancel_ratio: f64,
    /// Total messages per second per trader
    pub max_message_rate: f64,
}

impl Default for LatencyProfile {
    fn default() -> Self {
        Self {
            order_ack: LatencyBand::new(100.0, 20.0),
            cancel_ack: LatencyBand::new(80.0, 15.0),
            fill: LatencyBand::new(120.0, 30.0),
            market_data: LatencyBand::new(50.0, 10.0),
            max_order_rate: 1_000.0,
            max_cancel_ratio: 100.0,
            max_message_rate: 5_000.0,
        }
    }
}

impl LatencyProfile {
    /// Zero latency everywhere: work items release on the next
    /// `process_matching` call. Used by deterministic tests.
    pub fn zero() -> Self {
        Self {
            order_ack: LatencyBand::new(0.0, 0.0),
            cancel_ack: LatencyBand::new(0.0, 0.0),
            fill: LatencyBand::new(0.0, 0.0),
            market_data: LatencyBand::new(0.0, 0.0),
            ..Self::default()
        }
    }
}

/// Bounded market-impact model applied to resting displayed quantity
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ImpactModel {
    pub linear_impact: f64,
    pub sqrt_impact: f64,
    pub participation_rate: f64,
    /// Hard cap on the per-match shave, basis points
    pub max_impact_bps: u64,
}

impl Default for ImpactModel {
    fn default() -> Self {
        Self {
            linear_impact: 1e-6,
            sqrt_impact: 1e-4,
            participation_rate: 0.1,
            max_impact_bps: 50,
        }
    }
}

impl ImpactModel {
    /// Shave, in basis points of remaining displayed quantity, caused by
    /// an aggressor with `remaining` unfilled size
    fn impact_bps(&self, remaining: Quantity) -> u64 {
        let size = fixed_point::to_f64(remaining);
        let factor = self.linear_impact * size + self.sqrt_impact * size.sqrt();
        let fraction = factor * self.participation_rate * 0.1;
        ((fraction * 10_000.0) as u64).min(self.max_impact_bps)
    }
}

/// Iceberg-refresh simulation: occasionally seed a large order one tick
/// beyond the BBO on each side
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HiddenLiquidityConfig {
    pub iceberg_probability: f64,
    pub iceberg_size: Quantity,
    pub tick: Price,
}

impl Default for HiddenLiquidityConfig {
    fn default() -> Self {
        Self {
            iceberg_probability: 0.1,
            iceberg_size: 1_000 * fixed_point::SCALE,
            tick: fixed_point::SCALE / 100, // $0.01
        }
    }
}

impl HiddenLiquidityConfig {
    /// Disabled, for deterministic runs
    pub fn off() -> Self {
        Self { iceberg_probability: 0.0, ..Self::default() }
    }
}

/// Per-trader counters and moving-window rate state
#[derive(Debug, Clone, Default)]
pub struct TraderStats {
    pub orders_sent: u64,
    pub orders_filled: u64,
    pub orders_cancelled: u64,
    pub messages_sent: u64,
    pub total_fees: f64,
    recent_orders: VecDeque<u64>,
    recent_messages: VecDeque<u64>,
}

const RATE_WINDOW_NS: u64 = 1_000_000_000;

impl TraderStats {
    pub fn cancel_ratio(&self) -> f64 {
        if self.orders_filled == 0 {
            return 0.0;
        }
        self.orders_cancelled as f64 / self.orders_filled as f64
    }

    fn prune(&mut self, now_ns: u64) {
        let horizon = now_ns.saturating_sub(RATE_WINDOW_NS);
        while self.recent_orders.front().is_some_and(|&t| t < horizon) {
            self.recent_orders.pop_front();
        }
        while self.recent_messages.front().is_some_and(|&t| t < horizon) {
            self.recent_messages.pop_front();
        }
    }
}

/// Per-symbol running statistics
#[derive(Debug, Clone, Copy, Default)]
pub struct SymbolStats {
    pub trades: u64,
    pub volume: Quantity,
    pub last_price: Price,
    pub spread_bps: f64,
    pub book_depth: usize,
}

/// Engine-wide statistics snapshot
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    pub total_orders: u64,
    pub total_trades: u64,
    pub total_volume: Quantity,
    pub total_fees_collected: f64,
    pub active_orders: usize,
    pub symbols: HashMap<SymbolId, SymbolStats>,
}

enum WorkItem {
    Ack { execute_at_ns: u64, order: Order },
    Cancel { execute_at_ns: u64, order_id: OrderId, symbol_id: SymbolId },
    MarketData { execute_at_ns: u64, symbol_id: SymbolId, bid: Price, ask: Price },
}

impl WorkItem {
    fn execute_at(&self) -> u64 {
        match self {
            WorkItem::Ack { execute_at_ns, .. }
            | WorkItem::Cancel { execute_at_ns, .. }
            | WorkItem::MarketData { execute_at_ns, .. } => *execute_at_ns,
        }
    }
}

type AckCallback = Box<dyn FnMut(&Order) + Send>;
type RejectCallback = Box<dyn FnMut(&Order, &RejectReason) + Send>;
type FillCallback = Box<dyn FnMut(&Fill) + Send>;
type MarketDataCallback = Box<dyn FnMut(SymbolId, Price, Price) + Send>;

#[derive(Default)]
struct Callbacks {
    ack: Option<AckCallback>,
    reject: Option<RejectCallback>,
    fill: Option<FillCallback>,
    market_data: Option<MarketDataCallback>,
}

/// The matching engine: books, deferred work queue, fee and impact
/// models, per-trader statistics
pub struct MatchingEngine {
    books: HashMap<SymbolId, OrderBook>,
    traders: HashMap<StrategyId, TraderStats>,
    pending: Vec<WorkItem>,
    callbacks: Callbacks,
    latency: LatencyProfile,
    fees: FeeStructure,
    impact: ImpactModel,
    hidden: HiddenLiquidityConfig,
    clock: Arc<dyn Clock>,
    rng: StdRng,
    next_order_id: OrderId,
    next_trade_id: u64,
    total_orders: u64,
    total_trades: u64,
    total_volume: Quantity,
    total_fees: f64,
    symbol_stats: HashMap<SymbolId, SymbolStats>,
}

impl MatchingEngine {
    /// Engine with the default BTC/ETH books and an entropy-seeded RNG
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_seed(clock, rand::random())
    }

    /// Engine with a fixed RNG seed for reproducible simulations
    pub fn with_seed(clock: Arc<dyn Clock>, seed: u64) -> Self {
        let mut books = HashMap::new();
        books.insert(symbol::BTC_USD, OrderBook::new(symbol::BTC_USD));
        books.insert(symbol::ETH_USD, OrderBook::new(symbol::ETH_USD));

        Self {
            books,
            traders: HashMap::new(),
            pending: Vec::new(),
            callbacks: Callbacks::default(),
            latency: LatencyProfile::default(),
            fees: FeeStructure::default(),
            impact: ImpactModel::default(),
            hidden: HiddenLiquidityConfig::default(),
            clock,
            rng: StdRng::seed_from_u64(seed),
            next_order_id: 1,
            next_trade_id: 1,
            total_orders: 0,
            total_trades: 0,
            total_volume: 0,
            total_fees: 0.0,
            symbol_stats: HashMap::new(),
        }
    }

    pub fn add_symbol(&mut self, symbol_id: SymbolId) {
        self.books
            .entry(symbol_id)
            .or_insert_with(|| OrderBook::new(symbol_id));
    }

    pub fn set_latency_profile(&mut self, profile: LatencyProfile) {
        self.latency = profile;
    }

    pub fn set_fee_structure(&mut self, fees: FeeStructure) {
        self.fees = fees;
    }

    pub fn set_impact_model(&mut self, impact: ImpactModel) {
        self.impact = impact;
    }

    pub fn set_hidden_liquidity(&mut self, hidden: HiddenLiquidityConfig) {
        self.hidden = hidden;
    }

    pub fn on_order_ack(&mut self, callback: impl FnMut(&Order) + Send + 'static) {
        self.callbacks.ack = Some(Box::new(callback));
    }

    pub fn on_order_reject(&mut self, callback: impl FnMut(&Order, &RejectReason) + Send + 'static) {
        self.callbacks.reject = Some(Box::new(callback));
    }

    pub fn on_fill(&mut self, callback: impl FnMut(&Fill) + Send + 'static) {
        self.callbacks.fill = Some(Box::new(callback));
    }

    pub fn on_market_data(&mut self, callback: impl FnMut(SymbolId, Price, Price) + Send + 'static) {
        self.callbacks.market_data = Some(Box::new(callback));
    }

    /// Book access for inspection
    pub fn book(&self, symbol_id: SymbolId) -> Option<&OrderBook> {
        self.books.get(&symbol_id)
    }

    pub fn trader_stats(&self, trader: StrategyId) -> Option<&TraderStats> {
        self.traders.get(&trader)
    }

    /// Submit an order. Returns the assigned id, or 0 if the order was
    /// rejected (rate limit or validation); the reject callback fires
    /// synchronously in that case. Accepted orders are acknowledged on a
    /// later `process_matching` call once their simulated latency has
    /// elapsed.
    pub fn submit_order(&mut self, mut order: Order) -> OrderId {
        let now = self.clock.now_ns();

        // Rate gate first, mirroring the venue: an over-rate trader is
        // refused before validation spends any time on the message
        if let Some(kind) = self.rate_limit_violation(order.trader, now) {
            return self.reject(order, RejectReason::RateLimited { detail: kind });
        }

        if order.quantity == 0 {
            return self.reject(order, RejectReason::ZeroQuantity);
        }
        if order.order_type != OrderType::Market && order.price == 0 {
            return self.reject(order, RejectReason::ZeroPrice);
        }
        let Some(book) = self.books.get(&order.symbol) else {
            let symbol_id = order.symbol;
            return self.reject(order, RejectReason::UnknownSymbol { symbol: symbol_id });
        };

        if order.order_type == OrderType::PostOnly && book.would_cross(order.side, order.price) {
            let price = order.price;
            return self.reject(order, RejectReason::PostOnlyWouldCross { price });
        }

        if order.tif == TimeInForce::Fok {
            let limit = (order.order_type != OrderType::Market).then_some(order.price);
            let available = book.fillable_quantity(order.side, limit);
            if available < order.quantity {
                let requested = order.quantity;
                return self.reject(order, RejectReason::FokUnfillable { requested, available });
            }
        }

        order.id = self.next_order_id;
        self.next_order_id += 1;
        order.timestamp_ns = now;
        order.status = OrderStatus::Pending;

        let delay = self.latency.order_ack.sample_ns(&mut self.rng);
        let id = order.id;
        let trader = order.trader;
        self.pending.push(WorkItem::Ack { execute_at_ns: now + delay, order });

        self.total_orders += 1;
        let stats = self.traders.entry(trader).or_default();
        stats.orders_sent += 1;
        stats.messages_sent += 1;
        stats.recent_orders.push_back(now);
        stats.recent_messages.push_back(now);
        id
    }

    /// Cancel a resting order owned by `trader`. Returns `false` if no
    /// such order exists; otherwise the cancel applies after its
    /// simulated latency.
    pub fn cancel_order(&mut self, order_id: OrderId, trader: StrategyId) -> bool {
        let now = self.clock.now_ns();

        let found = self
            .books
            .iter()
            .find_map(|(symbol_id, book)| {
                (book.owner_of(order_id) == Some(trader)).then_some(*symbol_id)
            });
        let Some(symbol_id) = found else {
            return false;
        };

        let delay = self.latency.cancel_ack.sample_ns(&mut self.rng);
        self.pending.push(WorkItem::Cancel { execute_at_ns: now + delay, order_id, symbol_id });

        let stats = self.traders.entry(trader).or_default();
        stats.orders_cancelled += 1;
        stats.messages_sent += 1;
        stats.recent_messages.push_back(now);
        true
    }

    /// Advance simulated time: apply every due work item, run the
    /// matching loop for every symbol, cancel IOC residue, seed hidden
    /// liquidity, and schedule BBO publication. Never blocks.
    pub fn process_matching(&mut self) {
        let now = self.clock.now_ns();

        let (due, later): (Vec<_>, Vec<_>) = self
            .pending
            .drain(..)
            .partition(|item| item.execute_at() <= now);
        self.pending = later;

        for item in due {
            match item {
                WorkItem::Ack { order, .. } => self.apply_ack(order, now),
                WorkItem::Cancel { order_id, symbol_id, .. } => {
                    if let Some(book) = self.books.get_mut(&symbol_id) {
                        if let Some(mut order) = book.remove(order_id) {
                            order.status = OrderStatus::Cancelled;
                            debug!(order_id, symbol_id, "order cancelled");
                        }
                    }
                }
                WorkItem::MarketData { symbol_id, bid, ask, .. } => {
                    if let Some(callback) = &mut self.callbacks.market_data {
                        callback(symbol_id, bid, ask);
                    }
                }
            }
        }

        let symbols: Vec<SymbolId> = self.books.keys().copied().collect();
        for symbol_id in &symbols {
            self.match_book(*symbol_id);
        }

        // IOC residue must not rest across calls
        for symbol_id in &symbols {
            if let Some(book) = self.books.get_mut(symbol_id) {
                for mut order in book.drain_ioc() {
                    order.status = OrderStatus::Cancelled;
                    debug!(order_id = order.id, "IOC residue cancelled");
                }
            }
        }

        for symbol_id in &symbols {
            self.maybe_seed_hidden_liquidity(*symbol_id, now);
        }

        for symbol_id in symbols {
            let Some(book) = self.books.get(&symbol_id) else { continue };
            let (bid, ask) = book.bbo();
            if bid.is_some() || ask.is_some() {
                let delay = self.latency.market_data.sample_ns(&mut self.rng);
                self.pending.push(WorkItem::MarketData {
                    execute_at_ns: now + delay,
                    symbol_id,
                    bid: bid.unwrap_or(0),
                    ask: ask.unwrap_or(0),
                });
            }
        }
    }

    /// Engine statistics snapshot
    pub fn statistics(&self) -> EngineStats {
        let mut symbols = HashMap::new();
        let mut active_orders = 0;

        for (symbol_id, book) in &self.books {
            let mut stats = self.symbol_stats.get(symbol_id).copied().unwrap_or_default();
            stats.book_depth = book.total_orders();
            if let (Some(bid), Some(ask)) = book.bbo() {
                let mid = (fixed_point::to_f64(bid) + fixed_point::to_f64(ask)) / 2.0;
                if mid > 0.0 {
                    stats.spread_bps =
                        (fixed_point::to_f64(ask) - fixed_point::to_f64(bid)) / mid * 10_000.0;
                }
            }
            active_orders += stats.book_depth;
            symbols.insert(*symbol_id, stats);
        }

        EngineStats {
            total_orders: self.total_orders,
            total_trades: self.total_trades,
            total_volume: self.total_volume,
            total_fees_collected: self.total_fees,
            active_orders,
            symbols,
        }
    }

    fn rate_limit_violation(&mut self, trader: StrategyId, now: u64) -> Option<RateLimitKind> {
        let max_order_rate = self.latency.max_order_rate;
        let max_message_rate = self.latency.max_message_rate;
        let max_cancel_ratio = self.latency.max_cancel_ratio;

        let stats = self.traders.entry(trader).or_default();
        stats.prune(now);

        if stats.recent_messages.len() as f64 >= max_message_rate {
            return Some(RateLimitKind::MessagesPerSecond);
        }
        if stats.recent_orders.len() as f64 >= max_order_rate {
            return Some(RateLimitKind::OrdersPerSecond);
        }
        if stats.orders_filled > 0 && stats.cancel_ratio() > max_cancel_ratio {
            return Some(RateLimitKind::CancelRatio);
        }
        None
    }

    fn reject(&mut self, mut order: Order, reason: RejectReason) -> OrderId {
        order.status = OrderStatus::Rejected;
        warn!(trader = order.trader, symbol = order.symbol, %reason, "order rejected");
        if let Some(callback) = &mut self.callbacks.reject {
            callback(&order, &reason);
        }
        0
    }

    fn apply_ack(&mut self, mut order: Order, now: u64) {
        order.status = OrderStatus::Acknowledged;

        if order.order_type == OrderType::Market {
            if let Some(callback) = &mut self.callbacks.ack {
                callback(&order);
            }
            self.execute_market(order, now);
            return;
        }

        if let Some(book) = self.books.get_mut(&order.symbol) {
            book.add(order.clone());
        }
        if let Some(callback) = &mut self.callbacks.ack {
            callback(&order);
        }
    }

    /// Resolve every crossing at the top of one book
    fn match_book(&mut self, symbol_id: SymbolId) {
        loop {
            let Some(book) = self.books.get_mut(&symbol_id) else { return };
            let (Some(best_bid), Some(best_ask)) = book.bbo() else { return };
            if best_bid < best_ask {
                return;
            }

            let Some((bid_head, ask_head)) = book.best_heads_mut() else { return };

            // Zero-remaining heads can appear after an impact shave;
            // retire them before they wedge the loop
            if bid_head.remaining() == 0 {
                book.pop_best_head(Side::Buy);
                continue;
            }
            if ask_head.remaining() == 0 {
                book.pop_best_head(Side::Sell);
                continue;
            }

            // The resting side arrived first; tie-break on the per-book
            // priority counter. Crossings execute at the resting price.
            let bid_is_resting = (bid_head.timestamp_ns, bid_head.priority)
                <= (ask_head.timestamp_ns, ask_head.priority);
            let match_price = if bid_is_resting { bid_head.price } else { ask_head.price };
            let match_quantity = bid_head.remaining().min(ask_head.remaining());

            bid_head.apply_fill(match_quantity);
            ask_head.apply_fill(match_quantity);

            let bid_snapshot = (bid_head.id, bid_head.trader, bid_head.is_fully_filled());
            let ask_snapshot = (ask_head.id, ask_head.trader, ask_head.is_fully_filled());
            let aggressor_side = if bid_is_resting { Side::Sell } else { Side::Buy };
            let aggressor_remaining = if bid_is_resting {
                ask_head.remaining()
            } else {
                bid_head.remaining()
            };

            let maker_fee = self.fees.fee(match_price, match_quantity, true);
            let taker_fee = self.fees.fee(match_price, match_quantity, false);
            let (bid_fee, ask_fee) = if bid_is_resting {
                (maker_fee, taker_fee)
            } else {
                (taker_fee, maker_fee)
            };

            let trade_id = self.next_trade_id;
            self.next_trade_id += 1;

            let bid_fill = Fill {
                order_id: bid_snapshot.0,
                trader: bid_snapshot.1,
                symbol: symbol_id,
                side: Side::Buy,
                price: match_price,
                quantity: match_quantity,
                timestamp_ns: self.clock.now_ns(),
                trade_id,
                fee: bid_fee,
                is_maker: bid_is_resting,
            };
            let ask_fill = Fill {
                order_id: ask_snapshot.0,
                trader: ask_snapshot.1,
                symbol: symbol_id,
                side: Side::Sell,
                price: match_price,
                quantity: match_quantity,
                timestamp_ns: bid_fill.timestamp_ns,
                trade_id,
                fee: ask_fee,
                is_maker: !bid_is_resting,
            };

            // Impact lands on the side the aggressor is consuming
            let impact_bps = self.impact.impact_bps(aggressor_remaining);
            let book = self.books.get_mut(&symbol_id).expect("book exists");
            book.shave_displayed_quantity(aggressor_side.opposite(), impact_bps);

            if bid_snapshot.2 {
                book.pop_best_head(Side::Buy);
            }
            if ask_snapshot.2 {
                book.pop_best_head(Side::Sell);
            }

            self.record_trade(symbol_id, match_price, match_quantity, bid_fee + ask_fee);
            self.traders.entry(bid_snapshot.1).or_default().orders_filled += 1;
            self.traders.entry(bid_snapshot.1).or_default().total_fees += bid_fee;
            self.traders.entry(ask_snapshot.1).or_default().orders_filled += 1;
            self.traders.entry(ask_snapshot.1).or_default().total_fees += ask_fee;

            if let Some(callback) = &mut self.callbacks.fill {
                callback(&bid_fill);
                callback(&ask_fill);
            }
        }
    }

    /// Walk the opposite side of the book at progressively worse levels
    /// until the market order is exhausted or the book is empty
    fn execute_market(&mut self, mut order: Order, now: u64) {
        let symbol_id = order.symbol;
        let resting_side = order.side.opposite();

        while order.remaining() > 0 {
            let Some(book) = self.books.get_mut(&symbol_id) else { break };
            let Some(head) = book.best_head_mut(resting_side) else { break };

            if head.remaining() == 0 {
                book.pop_best_head(resting_side);
                continue;
            }

            let match_price = head.price;
            let match_quantity = order.remaining().min(head.remaining());
            head.apply_fill(match_quantity);
            order.apply_fill(match_quantity);

            let head_snapshot = (head.id, head.trader, head.is_fully_filled());

            let maker_fee = self.fees.fee(match_price, match_quantity, true);
            let taker_fee = self.fees.fee(match_price, match_quantity, false);
            let trade_id = self.next_trade_id;
            self.next_trade_id += 1;

            let maker_fill = Fill {
                order_id: head_snapshot.0,
                trader: head_snapshot.1,
                symbol: symbol_id,
                side: resting_side,
                price: match_price,
                quantity: match_quantity,
                timestamp_ns: now,
                trade_id,
                fee: maker_fee,
                is_maker: true,
            };
            let taker_fill = Fill {
                order_id: order.id,
                trader: order.trader,
                symbol: symbol_id,
                side: order.side,
                price: match_price,
                quantity: match_quantity,
                timestamp_ns: now,
                trade_id,
                fee: taker_fee,
                is_maker: false,
            };

            let book = self.books.get_mut(&symbol_id).expect("book exists");
            if head_snapshot.2 {
                book.pop_best_head(resting_side);
            }

            self.record_trade(symbol_id, match_price, match_quantity, maker_fee + taker_fee);
            self.traders.entry(head_snapshot.1).or_default().orders_filled += 1;
            self.traders.entry(head_snapshot.1).or_default().total_fees += maker_fee;
            self.traders.entry(order.trader).or_default().orders_filled += 1;
            self.traders.entry(order.trader).or_default().total_fees += taker_fee;

            if let Some(callback) = &mut self.callbacks.fill {
                callback(&maker_fill);
                callback(&taker_fill);
            }
        }

        if order.remaining() > 0 {
            // Book exhausted: the residue is cancelled, never rested
            order.status = OrderStatus::Cancelled;
            debug!(order_id = order.id, remaining = order.remaining(), "market order residue cancelled");
        }
    }

    fn record_trade(&mut self, symbol_id: SymbolId, price: Price, quantity: Quantity, fees: f64) {
        self.total_trades += 1;
        self.total_volume += quantity;
        self.total_fees += fees;

        let stats = self.symbol_stats.entry(symbol_id).or_default();
        stats.trades += 1;
        stats.volume += quantity;
        stats.last_price = price;
    }

    fn maybe_seed_hidden_liquidity(&mut self, symbol_id: SymbolId, now: u64) {
        if self.hidden.iceberg_probability <= 0.0 {
            return;
        }

        let (best_bid, best_ask) = match self.books.get(&symbol_id) {
            Some(book) => book.bbo(),
            None => return,
        };

        if self.rng.gen::<f64>() < self.hidden.iceberg_probability {
            if let Some(bid) = best_bid {
                if bid > self.hidden.tick {
                    self.seed_hidden(symbol_id, Side::Buy, bid - self.hidden.tick, now);
                }
            }
        }
        if self.rng.gen::<f64>() < self.hidden.iceberg_probability {
            if let Some(ask) = best_ask {
                self.seed_hidden(symbol_id, Side::Sell, ask + self.hidden.tick, now);
            }
        }
    }

    fn seed_hidden(&mut self, symbol_id: SymbolId, side: Side, price: Price, now: u64) {
        let mut order = Order::limit(
            symbol_id,
            side,
            price,
            self.hidden.iceberg_size,
            HIDDEN_LIQUIDITY_TRADER,
        );
        order.id = self.next_order_id;
        self.next_order_id += 1;
        order.timestamp_ns = now;
        order.status = OrderStatus::Acknowledged;

        if let Some(book) = self.books.get_mut(&symbol_id) {
            debug!(symbol_id, %side, price, "hidden liquidity seeded");
            book.add(order);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;

    fn fp(value: f64) -> u64 {
        fixed_point::from_f64(value)
    }

    fn test_engine() -> (MatchingEngine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let mut engine = MatchingEngine::with_seed(Arc::clone(&clock) as Arc<dyn crate::core::Clock>, 7);
        engine.set_latency_profile(LatencyProfile::zero());
        engine.set_hidden_liquidity(HiddenLiquidityConfig::off());
        (engine, clock)
    }

    #[test]
    fn test_submit_assigns_monotonic_ids() {
        let (mut engine, _clock) = test_engine();
        let a = engine.submit_order(Order::limit(symbol::BTC_USD, Side::Buy, fp(100.0), fp(1.0), 1));
        let b = engine.submit_order(Order::limit(symbol::BTC_USD, Side::Buy, fp(99.0), fp(1.0), 1));
        assert_eq!(a, 1);
        assert_eq!(b, 2);
    }

    #[test]
    fn test_validation_rejections_return_zero() {
        let (mut engine, _clock) = test_engine();

        let zero_qty = Order::limit(symbol::BTC_USD, Side::Buy, fp(100.0), 0, 1);
        assert_eq!(engine.submit_order(zero_qty), 0);

        let zero_price = Order::limit(symbol::BTC_USD, Side::Buy, 0, fp(1.0), 1);
        assert_eq!(engine.submit_order(zero_price), 0);

        let unknown = Order::limit(999, Side::Buy, fp(100.0), fp(1.0), 1);
        assert_eq!(engine.submit_order(unknown), 0);
    }

    #[test]
    fn test_reject_callback_fires_synchronously() {
        use std::sync::atomic::{AtomicU32, Ordering};
        let (mut engine, _clock) = test_engine();

        let rejects = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&rejects);
        engine.on_order_reject(move |order, reason| {
            assert_eq!(order.status, OrderStatus::Rejected);
            assert!(matches!(reason, RejectReason::ZeroQuantity));
            seen.fetch_add(1, Ordering::Relaxed);
        });

        engine.submit_order(Order::limit(symbol::BTC_USD, Side::Buy, fp(100.0), 0, 1));
        assert_eq!(rejects.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_ack_lands_on_book_after_processing() {
        let (mut engine, _clock) = test_engine();
        let id = engine.submit_order(Order::limit(symbol::BTC_USD, Side::Buy, fp(100.0), fp(1.0), 1));
        assert_ne!(id, 0);

        // Not on the book until the work item releases
        assert!(!engine.book(symbol::BTC_USD).unwrap().contains(id));
        engine.process_matching();
        assert!(engine.book(symbol::BTC_USD).unwrap().contains(id));
    }

    #[test]
    fn test_deferred_ack_respects_latency() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let mut engine = MatchingEngine::with_seed(Arc::clone(&clock) as Arc<dyn crate::core::Clock>, 7);
        engine.set_hidden_liquidity(HiddenLiquidityConfig::off());
        // Default profile: ~100us ack latency
        let id = engine.submit_order(Order::limit(symbol::BTC_USD, Side::Buy, fp(100.0), fp(1.0), 1));

        engine.process_matching();
        assert!(!engine.book(symbol::BTC_USD).unwrap().contains(id));

        clock.advance(200_000); // 200us
        engine.process_matching();
        assert!(engine.book(symbol::BTC_USD).unwrap().contains(id));
    }

    #[test]
    fn test_cancel_owned_order_only() {
        let (mut engine, _clock) = test_engine();
        let id = engine.submit_order(Order::limit(symbol::BTC_USD, Side::Buy, fp(100.0), fp(1.0), 1));
        engine.process_matching();

        // Wrong owner
        assert!(!engine.cancel_order(id, 2));
        // Unknown id
        assert!(!engine.cancel_order(999, 1));

        assert!(engine.cancel_order(id, 1));
        engine.process_matching();
        assert!(!engine.book(symbol::BTC_USD).unwrap().contains(id));
    }

    #[test]
    fn test_order_rate_limit() {
        let (mut engine, _clock) = test_engine();
        let mut profile = LatencyProfile::zero();
        profile.max_order_rate = 2.0;
        engine.set_latency_profile(profile);

        assert_ne!(engine.submit_order(Order::limit(symbol::BTC_USD, Side::Buy, fp(100.0), fp(1.0), 5)), 0);
        assert_ne!(engine.submit_order(Order::limit(symbol::BTC_USD, Side::Buy, fp(99.0), fp(1.0), 5)), 0);
        // Third order inside the window is refused
        assert_eq!(engine.submit_order(Order::limit(symbol::BTC_USD, Side::Buy, fp(98.0), fp(1.0), 5)), 0);

        let stats = engine.trader_stats(5).unwrap();
        assert_eq!(stats.orders_sent, 2);
    }

    #[test]
    fn test_rate_window_slides() {
        let (mut engine, clock) = test_engine();
        let mut profile = LatencyProfile::zero();
        profile.max_order_rate = 1.0;
        engine.set_latency_profile(profile);

        assert_ne!(engine.submit_order(Order::limit(symbol::BTC_USD, Side::Buy, fp(100.0), fp(1.0), 5)), 0);
        assert_eq!(engine.submit_order(Order::limit(symbol::BTC_USD, Side::Buy, fp(99.0), fp(1.0), 5)), 0);

        clock.advance(1_100_000_000); // 1.1s
        assert_ne!(engine.submit_order(Order::limit(symbol::BTC_USD, Side::Buy, fp(98.0), fp(1.0), 5)), 0);
    }

    #[test]
    fn test_post_only_rejected_when_crossing() {
        let (mut engine, _clock) = test_engine();
        engine.submit_order(Order::limit(symbol::BTC_USD, Side::Sell, fp(100.0), fp(1.0), 1));
        engine.process_matching();

        let crossing = Order::post_only(symbol::BTC_USD, Side::Buy, fp(100.0), fp(1.0), 2);
        assert_eq!(engine.submit_order(crossing), 0);

        let passive = Order::post_only(symbol::BTC_USD, Side::Buy, fp(99.0), fp(1.0), 2);
        assert_ne!(engine.submit_order(passive), 0);
    }

    #[test]
    fn test_fok_requires_full_liquidity() {
        let (mut engine, _clock) = test_engine();
        engine.submit_order(Order::limit(symbol::BTC_USD, Side::Sell, fp(100.0), fp(0.5), 1));
        engine.process_matching();

        let too_big = Order::limit(symbol::BTC_USD, Side::Buy, fp(100.0), fp(1.0), 2)
            .with_tif(TimeInForce::Fok);
        assert_eq!(engine.submit_order(too_big), 0);

        let fillable = Order::limit(symbol::BTC_USD, Side::Buy, fp(100.0), fp(0.5), 2)
            .with_tif(TimeInForce::Fok);
        assert_ne!(engine.submit_order(fillable), 0);
    }

    #[test]
    fn test_statistics_track_trades() {
        let (mut engine, _clock) = test_engine();
        engine.submit_order(Order::limit(symbol::BTC_USD, Side::Buy, fp(100.0), fp(1.0), 1));
        engine.submit_order(Order::limit(symbol::BTC_USD, Side::Sell, fp(100.0), fp(0.4), 2));
        engine.process_matching();

        let stats = engine.statistics();
        assert_eq!(stats.total_orders, 2);
        assert_eq!(stats.total_trades, 1);
        assert_eq!(stats.total_volume, fp(0.4));
        assert_eq!(stats.symbols[&symbol::BTC_USD].last_price, fp(100.0));
    }
}
