//! Matching engine scenarios: crossing, price-time priority, order
//! type semantics, and the book invariants that must hold after every
//! `process_matching` pass.

use osprey_core::core::{fixed_point, symbol, ManualClock, OrderStatus, Side, TimeInForce, Venue};
use osprey_core::engine::{Fill, HiddenLiquidityConfig, LatencyProfile, MatchingEngine, Order};
use std::sync::{Arc, Mutex};

fn fp(value: f64) -> u64 {
    fixed_point::from_f64(value)
}

struct Harness {
    engine: MatchingEngine,
    clock: Arc<ManualClock>,
    fills: Arc<Mutex<Vec<Fill>>>,
}

fn harness() -> Harness {
    let clock = Arc::new(ManualClock::new(1_000_000_000));
    let mut engine = MatchingEngine::with_seed(Arc::clone(&clock) as Arc<dyn osprey_core::core::Clock>, 42);
    engine.set_latency_profile(LatencyProfile::zero());
    engine.set_hidden_liquidity(HiddenLiquidityConfig::off());

    let fills = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&fills);
    engine.on_fill(move |fill| sink.lock().unwrap().push(fill.clone()));

    Harness { engine, clock, fills }
}

#[test]
fn test_simple_cross_fills_at_resting_price() {
    // S1: maker posts buy 100.00 x 1.0, taker sells 99.50 x 0.4
    let mut h = harness();

    let maker_id = h
        .engine
        .submit_order(Order::limit(symbol::BTC_USD, Side::Buy, fp(100.0), fp(1.0), 1));
    h.engine.process_matching();
    h.clock.advance(1_000);

    let taker_id = h
        .engine
        .submit_order(Order::limit(symbol::BTC_USD, Side::Sell, fp(99.5), fp(0.4), 2));
    h.engine.process_matching();

    let fills = h.fills.lock().unwrap();
    assert_eq!(fills.len(), 2);
    for fill in fills.iter() {
        assert_eq!(fill.price, fp(100.0));
        assert_eq!(fill.quantity, fp(0.4));
    }

    let maker_fill = fills.iter().find(|fill| fill.order_id == maker_id).unwrap();
    let taker_fill = fills.iter().find(|fill| fill.order_id == taker_id).unwrap();
    assert!(maker_fill.is_maker);
    assert!(!taker_fill.is_maker);
    assert!(maker_fill.fee < 0.0, "maker earns a rebate");
    assert!(taker_fill.fee > 0.0, "taker pays");

    // Maker's residue rests; taker is gone
    let book = h.engine.book(symbol::BTC_USD).unwrap();
    assert_eq!(book.find(maker_id).unwrap().remaining(), fp(0.6));
    assert!(!book.contains(taker_id));

    let stats = h.engine.statistics();
    assert_eq!(stats.total_trades, 1);
    assert_eq!(stats.total_volume, fp(0.4));
}

#[test]
fn test_price_time_priority() {
    // S2: A then B post buy 100.00 x 0.5; C sells 100.00 x 0.7
    let mut h = harness();

    let a = h
        .engine
        .submit_order(Order::limit(symbol::BTC_USD, Side::Buy, fp(100.0), fp(0.5), 1));
    h.engine.process_matching();
    h.clock.advance(1_000);

    let b = h
        .engine
        .submit_order(Order::limit(symbol::BTC_USD, Side::Buy, fp(100.0), fp(0.5), 2));
    h.engine.process_matching();
    h.clock.advance(1_000);

    let c = h
        .engine
        .submit_order(Order::limit(symbol::BTC_USD, Side::Sell, fp(100.0), fp(0.7), 3));
    h.engine.process_matching();

    let fills = h.fills.lock().unwrap();
    let filled_for = |id| -> u64 {
        fills
            .iter()
            .filter(|fill| fill.order_id == id)
            .map(|fill| fill.quantity)
            .sum()
    };

    // A fully fills before any of B's quantity trades
    assert_eq!(filled_for(a), fp(0.5));
    assert_eq!(filled_for(b), fp(0.2));
    assert_eq!(filled_for(c), fp(0.7));

    let book = h.engine.book(symbol::BTC_USD).unwrap();
    assert!(!book.contains(a));
    let b_order = book.find(b).unwrap();
    assert_eq!(b_order.status, OrderStatus::PartiallyFilled);
    assert_eq!(b_order.remaining(), fp(0.3));
    assert!(!book.contains(c));
}

#[test]
fn test_fill_conservation() {
    // Property 6: per match, maker and taker fill the same quantity at
    // the same price, under the same trade id
    let mut h = harness();

    h.engine
        .submit_order(Order::limit(symbol::ETH_USD, Side::Sell, fp(3_000.0), fp(2.0), 1));
    h.engine.process_matching();
    h.clock.advance(1_000);
    h.engine
        .submit_order(Order::limit(symbol::ETH_USD, Side::Buy, fp(3_001.0), fp(0.7), 2));
    h.engine.process_matching();

    let fills = h.fills.lock().unwrap();
    assert_eq!(fills.len(), 2);
    assert_eq!(fills[0].trade_id, fills[1].trade_id);
    assert_eq!(fills[0].price, fills[1].price);
    assert_eq!(fills[0].quantity, fills[1].quantity);
    assert_ne!(fills[0].is_maker, fills[1].is_maker);
}

#[test]
fn test_ioc_residue_is_cancelled_not_rested() {
    let mut h = harness();

    h.engine
        .submit_order(Order::limit(symbol::BTC_USD, Side::Sell, fp(100.0), fp(0.5), 1));
    h.engine.process_matching();
    h.clock.advance(1_000);

    let ioc = h.engine.submit_order(
        Order::limit(symbol::BTC_USD, Side::Buy, fp(100.0), fp(1.0), 2).with_tif(TimeInForce::Ioc),
    );
    h.engine.process_matching();

    // Partial fill happened, residue did not rest
    let fills = h.fills.lock().unwrap();
    let ioc_filled: u64 = fills
        .iter()
        .filter(|fill| fill.order_id == ioc)
        .map(|fill| fill.quantity)
        .sum();
    assert_eq!(ioc_filled, fp(0.5));

    let book = h.engine.book(symbol::BTC_USD).unwrap();
    assert!(!book.contains(ioc));
    assert_eq!(book.best_bid(), None);
}

#[test]
fn test_market_order_walks_levels_and_never_rests() {
    let mut h = harness();

    h.engine
        .submit_order(Order::limit(symbol::BTC_USD, Side::Sell, fp(100.0), fp(0.5), 1));
    h.engine
        .submit_order(Order::limit(symbol::BTC_USD, Side::Sell, fp(101.0), fp(0.5), 1));
    h.engine.process_matching();
    h.clock.advance(1_000);

    let market = h
        .engine
        .submit_order(Order::market(symbol::BTC_USD, Side::Buy, fp(0.8), 2));
    h.engine.process_matching();

    let fills = h.fills.lock().unwrap();
    let market_fills: Vec<&Fill> = fills.iter().filter(|fill| fill.order_id == market).collect();
    assert_eq!(market_fills.len(), 2);
    assert_eq!(market_fills[0].price, fp(100.0));
    assert_eq!(market_fills[0].quantity, fp(0.5));
    assert_eq!(market_fills[1].price, fp(101.0));
    assert_eq!(market_fills[1].quantity, fp(0.3));

    let book = h.engine.book(symbol::BTC_USD).unwrap();
    assert!(!book.contains(market));
    assert_eq!(book.best_ask(), Some(fp(101.0)));
}

#[test]
fn test_market_order_into_empty_book_cancels() {
    let mut h = harness();
    let id = h
        .engine
        .submit_order(Order::market(symbol::BTC_USD, Side::Sell, fp(1.0), 2));
    assert_ne!(id, 0);
    h.engine.process_matching();

    assert!(h.fills.lock().unwrap().is_empty());
    assert!(!h.engine.book(symbol::BTC_USD).unwrap().contains(id));
}

#[test]
fn test_book_never_crossed_at_rest() {
    // Property 4: after process_matching, best_bid < best_ask
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut h = harness();
    let mut rng = StdRng::seed_from_u64(99);

    for round in 0..200 {
        let side = if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
        let price = fp(95.0 + rng.gen_range(0.0..10.0));
        let qty = fp(rng.gen_range(0.01..2.0));
        let trader = rng.gen_range(1..5);
        h.engine
            .submit_order(Order::limit(symbol::BTC_USD, side, price, qty, trader));

        if round % 3 == 0 {
            h.engine.process_matching();
            let book = h.engine.book(symbol::BTC_USD).unwrap();
            if let (Some(bid), Some(ask)) = book.bbo() {
                assert!(bid < ask, "book crossed at rest: bid {} >= ask {}", bid, ask);
            }
        }
        h.clock.advance(500);
    }
}

#[test]
fn test_hidden_liquidity_owned_by_pseudo_trader() {
    let clock = Arc::new(ManualClock::new(1_000_000_000));
    let mut engine = MatchingEngine::with_seed(Arc::clone(&clock) as Arc<dyn osprey_core::core::Clock>, 1);
    engine.set_latency_profile(LatencyProfile::zero());
    // Force seeding every pass
    engine.set_hidden_liquidity(HiddenLiquidityConfig {
        iceberg_probability: 1.0,
        ..HiddenLiquidityConfig::default()
    });

    engine.submit_order(Order::limit(symbol::BTC_USD, Side::Buy, fp(99.0), fp(1.0), 1));
    engine.submit_order(Order::limit(symbol::BTC_USD, Side::Sell, fp(101.0), fp(1.0), 2));
    engine.process_matching();

    let book = engine.book(symbol::BTC_USD).unwrap();
    // One seeded level beyond the BBO on each side
    assert!(book.total_orders() > 2);
    assert_eq!(book.best_bid(), Some(fp(99.0)));
    assert_eq!(book.best_ask(), Some(fp(101.0)));

    // One extra level per side, owned by the reserved pseudo-trader
    assert_eq!(book.bid_levels(), 2);
    assert_eq!(book.ask_levels(), 2);
}

#[test]
fn test_market_data_callback_publishes_bbo() {
    let clock = Arc::new(ManualClock::new(1_000_000_000));
    let mut engine = MatchingEngine::with_seed(Arc::clone(&clock) as Arc<dyn osprey_core::core::Clock>, 42);
    engine.set_latency_profile(LatencyProfile::zero());
    engine.set_hidden_liquidity(HiddenLiquidityConfig::off());

    let published = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&published);
    engine.on_market_data(move |sym, bid, ask| sink.lock().unwrap().push((sym, bid, ask)));

    engine.submit_order(Order::limit(symbol::BTC_USD, Side::Buy, fp(99.0), fp(1.0), 1));
    engine.submit_order(Order::limit(symbol::BTC_USD, Side::Sell, fp(101.0), fp(1.0), 2));
    engine.process_matching(); // acks land, publication scheduled
    engine.process_matching(); // publication releases

    let published = published.lock().unwrap();
    assert!(published.contains(&(symbol::BTC_USD, fp(99.0), fp(101.0))));
}

#[test]
fn test_fills_report_to_ledger_end_to_end() {
    use osprey_core::ledger::PositionLedger;
    use osprey_core::risk::RiskGate;

    let clock = Arc::new(ManualClock::new(1_000_000_000));
    let ledger = Arc::new(PositionLedger::new(Arc::clone(&clock) as Arc<dyn osprey_core::core::Clock>));
    let gate = Arc::new(RiskGate::new(Arc::clone(&ledger), clock as Arc<dyn osprey_core::core::Clock>));

    let mut h = harness();
    let gate_sink = Arc::clone(&gate);
    h.engine.on_fill(move |fill| {
        let signed = fill.quantity as i64 * fill.side.sign();
        gate_sink.report_execution(Venue::Binance, fill.symbol, signed, fill.price, fill.fee);
    });

    h.engine
        .submit_order(Order::limit(symbol::BTC_USD, Side::Buy, fp(100.0), fp(0.004), 1));
    h.engine.process_matching();
    h.clock.advance(1_000);
    h.engine
        .submit_order(Order::limit(symbol::BTC_USD, Side::Sell, fp(99.0), fp(0.004), 2));
    h.engine.process_matching();

    // Both sides of the match landed in the ledger with opposite signs,
    // so the venue position nets to zero
    let position = ledger.get_position(Venue::Binance, symbol::BTC_USD);
    assert_eq!(position.quantity, 0);
    assert_eq!(position.total_volume, fp(0.008));
}
