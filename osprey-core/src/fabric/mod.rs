//! Sequenced message fabric
//!
//! Sequencers assign monotonic sequence numbers (optionally with
//! calibrated hardware timestamps); ring buffers carry
//! [`SequencedMessage`](crate::core::SequencedMessage)s between
//! components. Downstream ordering across queues is recovered from the
//! shared sequencer stamp, never from queue arrival.

pub mod mpsc_ring;
pub mod ring;
pub mod sequencer;
pub mod timestamp;

pub use mpsc_ring::MpscRing;
pub use ring::{SpscRing, MIN_RING_CAPACITY};
pub use sequencer::{MpmcSequencer, MpscSequencer, SpscSequencer};
pub use timestamp::{
    MarketMakingSequence, MarketMakingSequencer, StampedSequence, TimestampSequencer,
};

use crate::core::clock::Clock;
use std::sync::Arc;

/// Construct an unbound SPSC ring. Capacity must be a power of two,
/// at least [`MIN_RING_CAPACITY`].
pub fn spsc_ring(capacity: usize) -> SpscRing {
    SpscRing::new(capacity)
}

/// Construct an SPSC ring bound to a sequencer: accepted writes are
/// stamped and committed automatically.
pub fn spsc_ring_with_sequencer(
    capacity: usize,
    sequencer: Arc<SpscSequencer>,
    clock: Arc<dyn Clock>,
) -> SpscRing {
    SpscRing::with_sequencer(capacity, sequencer, clock)
}

/// Construct an MPSC ring. Capacity must be a power of two, at least
/// [`MIN_RING_CAPACITY`].
pub fn mpsc_ring(capacity: usize) -> MpscRing {
    MpscRing::new(capacity)
}
