//! Timestamped and market-making sequencers
//!
//! [`TimestampSequencer`] pairs every sequence with a calibrated
//! hardware timestamp; [`MarketMakingSequencer`] adds maker/taker and
//! priority bookkeeping on top.

use crate::core::clock::{cycles, cycles_serialized, Calibration};
use crate::core::types::{Side, Venue, MAX_VENUES};
use crossbeam::utils::CachePadded;
use std::sync::atomic::{AtomicU64, Ordering};

/// A sequence number paired with its assignment-time timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StampedSequence {
    pub sequence: u64,
    pub timestamp_ns: u64,
    pub raw_cycles: u64,
}

/// Sequencer that stamps each sequence with a calibrated nanosecond
/// timestamp
///
/// Calibration happens once at construction. The fast path is a cycle
/// read and one multiply/divide; timestamps are monotonic non-decreasing
/// within a single instance.
pub struct TimestampSequencer {
    sequence: CachePadded<AtomicU64>,
    calibration: Calibration,
}

impl TimestampSequencer {
    pub fn new() -> Self {
        Self {
            sequence: CachePadded::new(AtomicU64::new(0)),
            calibration: Calibration::measure(),
        }
    }

    /// Construct with an externally measured calibration (tests)
    pub fn with_calibration(calibration: Calibration) -> Self {
        Self {
            sequence: CachePadded::new(AtomicU64::new(0)),
            calibration,
        }
    }

    /// Sequence plus timestamp
    #[inline]
    pub fn next(&self) -> StampedSequence {
        let sequence = self.sequence.fetch_add(1, Ordering::AcqRel);
        let raw = cycles();
        StampedSequence {
            sequence,
            timestamp_ns: self.calibration.cycles_to_ns(raw),
            raw_cycles: raw,
        }
    }

    /// Sequence plus serializing timestamp: the timestamp is taken after
    /// all prior writes have completed. Use when the stamp must order
    /// against preceding stores.
    #[inline]
    pub fn next_serialized(&self) -> StampedSequence {
        let sequence = self.sequence.fetch_add(1, Ordering::AcqRel);
        let raw = cycles_serialized();
        StampedSequence {
            sequence,
            timestamp_ns: self.calibration.cycles_to_ns(raw),
            raw_cycles: raw,
        }
    }

    pub fn calibration(&self) -> Calibration {
        self.calibration
    }
}

impl Default for TimestampSequencer {
    fn default() -> Self {
        Self::new()
    }
}

/// Bits the global sequence occupies in a priority-embedded sequence
const PRIORITY_SHIFT: u32 = 48;

/// Sequence metadata for market-making order flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketMakingSequence {
    /// Global sequence; priority events carry the priority counter in
    /// the high bits so natural ordering ranks them above same-time
    /// non-priority events
    pub sequence: u64,
    pub timestamp_ns: u64,
    /// Maker- or taker-specific sequence
    pub type_sequence: u64,
    pub venue: Venue,
    pub side: Side,
    pub is_maker: bool,
    pub is_priority: bool,
}

/// Sequencer specialised for market-making strategies
///
/// Tracks liquidity provision and taking separately, keeps per-(venue,
/// side) counters for queue fairness, and offers a priority lane for
/// risk-reduction orders.
pub struct MarketMakingSequencer {
    maker_sequence: CachePadded<AtomicU64>,
    taker_sequence: CachePadded<AtomicU64>,
    global_sequence: CachePadded<AtomicU64>,
    priority_sequence: CachePadded<AtomicU64>,
    venue_bid_sequences: [CachePadded<AtomicU64>; MAX_VENUES],
    venue_ask_sequences: [CachePadded<AtomicU64>; MAX_VENUES],
    calibration: Calibration,
}

impl MarketMakingSequencer {
    pub fn new() -> Self {
        Self {
            maker_sequence: CachePadded::new(AtomicU64::new(0)),
            taker_sequence: CachePadded::new(AtomicU64::new(0)),
            global_sequence: CachePadded::new(AtomicU64::new(0)),
            priority_sequence: CachePadded::new(AtomicU64::new(0)),
            venue_bid_sequences: std::array::from_fn(|_| CachePadded::new(AtomicU64::new(0))),
            venue_ask_sequences: std::array::from_fn(|_| CachePadded::new(AtomicU64::new(0))),
            calibration: Calibration::measure(),
        }
    }

    /// Sequence a liquidity-providing order
    #[inline]
    pub fn sequence_maker(&self, venue: Venue, side: Side) -> MarketMakingSequence {
        let venue_seq = match side {
            Side::Buy => &self.venue_bid_sequences[venue.index()],
            Side::Sell => &self.venue_ask_sequences[venue.index()],
        };
        venue_seq.fetch_add(1, Ordering::Relaxed);

        let maker_seq = self.maker_sequence.fetch_add(1, Ordering::Relaxed);
        let global_seq = self.global_sequence.fetch_add(1, Ordering::AcqRel);
        let raw = cycles();

        MarketMakingSequence {
            sequence: global_seq,
            timestamp_ns: self.calibration.cycles_to_ns(raw),
            type_sequence: maker_seq,
            venue,
            side,
            is_maker: true,
            is_priority: false,
        }
    }

    /// Sequence a liquidity-taking order. Priority orders (risk
    /// reduction) embed the priority counter in the high bits of the
    /// returned sequence.
    #[inline]
    pub fn sequence_taker(&self, venue: Venue, side: Side, is_priority: bool) -> MarketMakingSequence {
        let taker_seq = self.taker_sequence.fetch_add(1, Ordering::Relaxed);

        let priority_seq = if is_priority {
            self.priority_sequence.fetch_add(1, Ordering::AcqRel)
        } else {
            0
        };

        let global_seq = self.global_sequence.fetch_add(1, Ordering::AcqRel);
        let raw = cycles();

        let sequence = if is_priority {
            (priority_seq << PRIORITY_SHIFT) | global_seq
        } else {
            global_seq
        };

        MarketMakingSequence {
            sequence,
            timestamp_ns: self.calibration.cycles_to_ns(raw),
            type_sequence: taker_seq,
            venue,
            side,
            is_maker: false,
            is_priority,
        }
    }

    /// Current (bid, ask) sequence counts for a venue
    pub fn spread_sequences(&self, venue: Venue) -> (u64, u64) {
        (
            self.venue_bid_sequences[venue.index()].load(Ordering::Acquire),
            self.venue_ask_sequences[venue.index()].load(Ordering::Acquire),
        )
    }

    /// Ratio of maker to taker orders sequenced so far; zero when no
    /// takers yet
    pub fn maker_taker_ratio(&self) -> f64 {
        let makers = self.maker_sequence.load(Ordering::Relaxed);
        let takers = self.taker_sequence.load(Ordering::Relaxed);
        if takers == 0 {
            return 0.0;
        }
        makers as f64 / takers as f64
    }
}

impl Default for MarketMakingSequencer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_sequencer_monotonic() {
        let seq = TimestampSequencer::new();
        let a = seq.next();
        let b = seq.next();
        assert_eq!(b.sequence, a.sequence + 1);
        assert!(b.timestamp_ns >= a.timestamp_ns);
    }

    #[test]
    fn test_serialized_variant_orders_after_plain() {
        let seq = TimestampSequencer::new();
        let a = seq.next();
        let b = seq.next_serialized();
        assert!(b.raw_cycles >= a.raw_cycles);
    }

    #[test]
    fn test_maker_taker_counters_independent() {
        let seq = MarketMakingSequencer::new();
        let m = seq.sequence_maker(Venue::Binance, Side::Buy);
        let t = seq.sequence_taker(Venue::Binance, Side::Sell, false);

        assert!(m.is_maker);
        assert!(!t.is_maker);
        assert_eq!(m.type_sequence, 0);
        assert_eq!(t.type_sequence, 0);
        assert_eq!(m.sequence, 0);
        assert_eq!(t.sequence, 1);
        assert!((seq.maker_taker_ratio() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_priority_ranks_above_non_priority() {
        let seq = MarketMakingSequencer::new();
        let plain = seq.sequence_taker(Venue::Okx, Side::Sell, false);
        let urgent = seq.sequence_taker(Venue::Okx, Side::Sell, true);
        assert!(urgent.is_priority);
        // High-bit embedding ranks the priority event above any
        // contemporaneous non-priority sequence
        assert!(urgent.sequence > plain.sequence);
    }

    #[test]
    fn test_venue_side_counters() {
        let seq = MarketMakingSequencer::new();
        seq.sequence_maker(Venue::Deribit, Side::Buy);
        seq.sequence_maker(Venue::Deribit, Side::Buy);
        seq.sequence_maker(Venue::Deribit, Side::Sell);

        let (bids, asks) = seq.spread_sequences(Venue::Deribit);
        assert_eq!((bids, asks), (2, 1));
        assert_eq!(seq.spread_sequences(Venue::Binance), (0, 0));
    }
}
