//! Sequencers: monotonic sequence generation with commit watermarks
//!
//! Three flavours with increasing coordination cost:
//!
//! - [`SpscSequencer`]: one producer, one consumer. Wait-free `next()`
//!   with relaxed ordering; the commit watermark is a single release
//!   store.
//! - [`MpscSequencer`]: many producers claim with an atomic add; a
//!   per-slot flag ring absorbs out-of-order commits and the visible
//!   head only ever advances over a contiguous committed prefix.
//! - [`MpmcSequencer`]: adds a publish gate that forces strict in-order
//!   publication across producers, plus advisory per-venue fairness
//!   counters.
//!
//! Contract shared by all flavours: a consumer that observes
//! `is_committed(s)` sees every payload write made before the commit of
//! `s` (release/acquire pairing on the watermark).

use crate::core::types::{Venue, MAX_VENUES};
use crossbeam::utils::CachePadded;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Single-producer single-consumer sequencer
///
/// The fastest flavour: sequence generation is a relaxed fetch-add on a
/// counter only one thread writes.
pub struct SpscSequencer {
    /// Producer's sequence counter
    sequence: CachePadded<AtomicU64>,
    /// Commit watermark: sequences below this value are fully written
    committed: CachePadded<AtomicU64>,
}

impl SpscSequencer {
    pub fn new() -> Self {
        Self {
            sequence: CachePadded::new(AtomicU64::new(0)),
            committed: CachePadded::new(AtomicU64::new(0)),
        }
    }

    /// Next sequence number (producer side). Wait-free.
    #[inline(always)]
    pub fn next(&self) -> u64 {
        // Relaxed is safe: a single producer owns this counter
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    /// Claim `count` contiguous sequences; returns the first
    #[inline]
    pub fn claim_batch(&self, count: u32) -> u64 {
        self.sequence.fetch_add(count as u64, Ordering::Relaxed)
    }

    /// Commit a sequence (producer side). Must be issued in
    /// non-decreasing sequence order; release makes every prior payload
    /// write visible to the consumer.
    #[inline(always)]
    pub fn commit(&self, seq: u64) {
        self.committed.store(seq + 1, Ordering::Release);
    }

    /// Commit everything up to and including `highest_seq`
    #[inline]
    pub fn commit_batch(&self, highest_seq: u64) {
        self.committed.store(highest_seq + 1, Ordering::Release);
    }

    /// Highest committed sequence, or `None` before the first commit
    #[inline]
    pub fn get_committed(&self) -> Option<u64> {
        self.committed.load(Ordering::Acquire).checked_sub(1)
    }

    /// Whether `seq` has been committed (consumer side)
    #[inline(always)]
    pub fn is_committed(&self, seq: u64) -> bool {
        seq < self.committed.load(Ordering::Acquire)
    }
}

impl Default for SpscSequencer {
    fn default() -> Self {
        Self::new()
    }
}

/// Size of the out-of-order commit window. A producer must not run more
/// than this many sequences ahead of the committed head.
const COMMIT_WINDOW: usize = 4096;
const COMMIT_MASK: u64 = COMMIT_WINDOW as u64 - 1;

/// Multi-producer single-consumer sequencer
///
/// Producers may claim and commit out of order; the consumer-visible
/// head never skips an uncommitted sequence. Flags covered by a head
/// advance are cleared as it passes. The flag ring is reused modulo
/// [`COMMIT_WINDOW`]: producers must not run more than that many
/// sequences ahead of the committed head.
pub struct MpscSequencer {
    sequence: CachePadded<AtomicU64>,
    committed_head: CachePadded<AtomicU64>,
    commits: Box<[AtomicU8]>,
}

impl MpscSequencer {
    pub fn new() -> Self {
        let commits = (0..COMMIT_WINDOW).map(|_| AtomicU8::new(0)).collect();
        Self {
            sequence: CachePadded::new(AtomicU64::new(0)),
            committed_head: CachePadded::new(AtomicU64::new(0)),
            commits,
        }
    }

    /// Claim a sequence (any producer thread)
    #[inline(always)]
    pub fn claim(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::AcqRel)
    }

    /// Claim `count` contiguous sequences; returns the first
    #[inline]
    pub fn claim_batch(&self, count: u32) -> u64 {
        self.sequence.fetch_add(count as u64, Ordering::AcqRel)
    }

    /// Commit a claimed sequence; commits may arrive in any order
    pub fn commit(&self, seq: u64) {
        self.commits[(seq & COMMIT_MASK) as usize].store(1, Ordering::Release);
        // Full fence so the flag store is ordered before the head load
        // below; without it two committers can each miss the other and
        // leave the head stalled behind a set flag.
        std::sync::atomic::fence(Ordering::SeqCst);

        loop {
            let head = self.committed_head.load(Ordering::Acquire);
            if self.commits[(head & COMMIT_MASK) as usize].load(Ordering::Acquire) == 0 {
                return;
            }
            if self
                .committed_head
                .compare_exchange(head, head + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                // Winner of the advance clears the flag it consumed
                self.commits[(head & COMMIT_MASK) as usize].store(0, Ordering::Relaxed);
            }
        }
    }

    /// Highest sequence `h` such that all sequences `< h + 1` are
    /// committed, or `None` before the first commit
    #[inline]
    pub fn get_committed(&self) -> Option<u64> {
        self.committed_head.load(Ordering::Acquire).checked_sub(1)
    }

    /// Whether `seq` lies within the contiguous committed prefix
    #[inline(always)]
    pub fn is_committed(&self, seq: u64) -> bool {
        seq < self.committed_head.load(Ordering::Acquire)
    }
}

impl Default for MpscSequencer {
    fn default() -> Self {
        Self::new()
    }
}

/// Multi-producer multi-consumer sequencer
///
/// The publish gate guarantees strict in-order publication across
/// producers: each producer spins until the gate reaches its sequence,
/// then advances it. Per-venue counters are advisory fairness
/// instrumentation and never gate correctness.
pub struct MpmcSequencer {
    sequence: CachePadded<AtomicU64>,
    commit_gate: CachePadded<AtomicU64>,
    venue_sequences: [CachePadded<AtomicU64>; MAX_VENUES],
}

impl MpmcSequencer {
    pub fn new() -> Self {
        Self {
            sequence: CachePadded::new(AtomicU64::new(0)),
            commit_gate: CachePadded::new(AtomicU64::new(0)),
            venue_sequences: std::array::from_fn(|_| CachePadded::new(AtomicU64::new(0))),
        }
    }

    /// Claim a sequence, attributing it to `venue` for fairness
    /// inspection
    #[inline]
    pub fn claim(&self, venue: Venue) -> u64 {
        self.venue_sequences[venue.index()].fetch_add(1, Ordering::Relaxed);
        self.sequence.fetch_add(1, Ordering::AcqRel)
    }

    /// Publish `seq`, spinning until every earlier sequence has been
    /// published
    #[inline]
    pub fn publish(&self, seq: u64) {
        while self
            .commit_gate
            .compare_exchange_weak(seq, seq + 1, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            std::hint::spin_loop();
        }
    }

    /// Sequences published so far
    #[inline]
    pub fn published(&self) -> u64 {
        self.commit_gate.load(Ordering::Acquire)
    }

    /// Advisory: how many sequences a venue has claimed
    #[inline]
    pub fn venue_count(&self, venue: Venue) -> u64 {
        self.venue_sequences[venue.index()].load(Ordering::Relaxed)
    }
}

impl Default for MpmcSequencer {
    fn default() -> Self {
        Self::new()
    }
}
