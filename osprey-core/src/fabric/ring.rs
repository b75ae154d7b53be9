//! Single-producer single-consumer ring buffer
//!
//! The workhorse of inter-component communication. No locks, no
//! syscalls, no allocation on the fast path. Producer and consumer index
//! pairs live on their own cache lines, each with a cached view of the
//! opposite index so the steady state touches only one line per side.
//! Indices are monotonic u64s masked into the power-of-two slot array,
//! so the full capacity is usable and full/empty are unambiguous.

use crate::core::clock::Clock;
use crate::core::message::SequencedMessage;
use crate::fabric::sequencer::SpscSequencer;
use crossbeam::utils::CachePadded;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Minimum ring capacity
pub const MIN_RING_CAPACITY: usize = 64;

struct ProducerSide {
    write_pos: AtomicU64,
    /// Producer's cached view of the consumer's read position
    cached_read: UnsafeCell<u64>,
}

struct ConsumerSide {
    read_pos: AtomicU64,
    /// Consumer's cached view of the producer's write position
    cached_write: UnsafeCell<u64>,
}

struct SequencerBinding {
    sequencer: Arc<SpscSequencer>,
    clock: Arc<dyn Clock>,
}

/// Lock-free SPSC ring carrying [`SequencedMessage`]
///
/// # Contract
///
/// Exactly one thread writes and exactly one thread reads. The type is
/// `Sync` so both sides can share an `Arc`, but concurrent writers (or
/// concurrent readers) are undefined behaviour, the same contract the
/// sequencer family states for its producer side.
///
/// When constructed with a sequencer, every accepted write is rewritten
/// with `sequence = sequencer.next()` and a fresh timestamp before the
/// write index is released, and the sequence is committed immediately
/// after.
pub struct SpscRing {
    producer: CachePadded<ProducerSide>,
    consumer: CachePadded<ConsumerSide>,
    slots: Box<[UnsafeCell<SequencedMessage>]>,
    mask: u64,
    binding: Option<SequencerBinding>,
}

unsafe impl Send for SpscRing {}
unsafe impl Sync for SpscRing {}

impl SpscRing {
    /// Create a ring with `capacity` slots. Capacity must be a power of
    /// two and at least [`MIN_RING_CAPACITY`].
    pub fn new(capacity: usize) -> Self {
        Self::build(capacity, None)
    }

    /// Create a ring bound to a sequencer; accepted writes are stamped
    /// and committed automatically.
    pub fn with_sequencer(
        capacity: usize,
        sequencer: Arc<SpscSequencer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::build(capacity, Some(SequencerBinding { sequencer, clock }))
    }

    fn build(capacity: usize, binding: Option<SequencerBinding>) -> Self {
        assert!(capacity.is_power_of_two(), "ring capacity must be a power of two");
        assert!(capacity >= MIN_RING_CAPACITY, "ring capacity must be at least {}", MIN_RING_CAPACITY);

        let slots = (0..capacity)
            .map(|_| UnsafeCell::new(SequencedMessage::default()))
            .collect();

        Self {
            producer: CachePadded::new(ProducerSide {
                write_pos: AtomicU64::new(0),
                cached_read: UnsafeCell::new(0),
            }),
            consumer: CachePadded::new(ConsumerSide {
                read_pos: AtomicU64::new(0),
                cached_write: UnsafeCell::new(0),
            }),
            slots,
            mask: capacity as u64 - 1,
            binding,
        }
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Write a message (producer side). Returns `false` iff the buffer
    /// is full. Never blocks.
    #[inline]
    pub fn write(&self, mut msg: SequencedMessage) -> bool {
        let current_write = self.producer.write_pos.load(Ordering::Relaxed);
        let next_write = current_write + 1;

        // Full check against the cached read position first; only on a
        // miss do we pay the cross-core load.
        let cached_read = unsafe { &mut *self.producer.cached_read.get() };
        if next_write - *cached_read > self.mask + 1 {
            *cached_read = self.consumer.read_pos.load(Ordering::Acquire);
            if next_write - *cached_read > self.mask + 1 {
                return false;
            }
        }

        let committed = if let Some(binding) = &self.binding {
            let seq = binding.sequencer.next();
            msg.sequence = seq;
            msg.timestamp_ns = binding.clock.now_ns();
            Some(seq)
        } else {
            None
        };

        unsafe {
            *self.slots[(current_write & self.mask) as usize].get() = msg;
        }

        // Release publishes the slot contents together with the index
        self.producer.write_pos.store(next_write, Ordering::Release);

        if let (Some(binding), Some(seq)) = (&self.binding, committed) {
            binding.sequencer.commit(seq);
        }

        true
    }

    /// Write a message carrying a pre-assigned sequence (producer side)
    #[inline]
    pub fn write_sequenced(&self, mut msg: SequencedMessage, sequence: u64) -> bool {
        msg.sequence = sequence;
        if msg.timestamp_ns == 0 {
            if let Some(binding) = &self.binding {
                msg.timestamp_ns = binding.clock.now_ns();
            }
        }

        let current_write = self.producer.write_pos.load(Ordering::Relaxed);
        let next_write = current_write + 1;

        let cached_read = unsafe { &mut *self.producer.cached_read.get() };
        if next_write - *cached_read > self.mask + 1 {
            *cached_read = self.consumer.read_pos.load(Ordering::Acquire);
            if next_write - *cached_read > self.mask + 1 {
                return false;
            }
        }

        unsafe {
            *self.slots[(current_write & self.mask) as usize].get() = msg;
        }
        self.producer.write_pos.store(next_write, Ordering::Release);
        true
    }

    /// Write up to `msgs.len()` messages, amortizing the index update.
    /// Returns how many were accepted; partial completion is normal.
    pub fn write_batch(&self, msgs: &[SequencedMessage]) -> usize {
        let current_write = self.producer.write_pos.load(Ordering::Relaxed);

        let cached_read = unsafe { &mut *self.producer.cached_read.get() };
        if current_write - *cached_read + msgs.len() as u64 > self.mask + 1 {
            *cached_read = self.consumer.read_pos.load(Ordering::Acquire);
        }

        let available = (self.mask + 1) - (current_write - *cached_read);
        let to_write = msgs.len().min(available as usize);
        if to_write == 0 {
            return 0;
        }

        let first_seq = self
            .binding
            .as_ref()
            .map(|binding| binding.sequencer.claim_batch(to_write as u32));
        let timestamp_ns = self.binding.as_ref().map(|binding| binding.clock.now_ns());

        for (i, msg) in msgs.iter().take(to_write).enumerate() {
            let mut slot_msg = *msg;
            if let (Some(first), Some(ts)) = (first_seq, timestamp_ns) {
                slot_msg.sequence = first + i as u64;
                slot_msg.timestamp_ns = ts;
            }
            unsafe {
                *self.slots[((current_write + i as u64) & self.mask) as usize].get() = slot_msg;
            }
        }

        self.producer
            .write_pos
            .store(current_write + to_write as u64, Ordering::Release);

        if let (Some(binding), Some(first)) = (&self.binding, first_seq) {
            binding.sequencer.commit_batch(first + to_write as u64 - 1);
        }

        to_write
    }

    /// Read the next message (consumer side). Returns `None` iff the
    /// buffer is empty. Never blocks.
    #[inline]
    pub fn read(&self) -> Option<SequencedMessage> {
        let current_read = self.consumer.read_pos.load(Ordering::Relaxed);

        let cached_write = unsafe { &mut *self.consumer.cached_write.get() };
        if current_read >= *cached_write {
            *cached_write = self.producer.write_pos.load(Ordering::Acquire);
            if current_read >= *cached_write {
                return None;
            }
        }

        let msg = unsafe { *self.slots[(current_read & self.mask) as usize].get() };
        self.consumer.read_pos.store(current_read + 1, Ordering::Release);
        Some(msg)
    }

    /// Look at the next message without consuming it (consumer side)
    #[inline]
    pub fn peek(&self) -> Option<SequencedMessage> {
        let current_read = self.consumer.read_pos.load(Ordering::Relaxed);
        let current_write = self.producer.write_pos.load(Ordering::Acquire);
        if current_read >= current_write {
            return None;
        }
        Some(unsafe { *self.slots[(current_read & self.mask) as usize].get() })
    }

    /// Read up to `out.len()` messages. Returns how many were read.
    pub fn read_batch(&self, out: &mut [SequencedMessage]) -> usize {
        let current_read = self.consumer.read_pos.load(Ordering::Relaxed);

        let cached_write = unsafe { &mut *self.consumer.cached_write.get() };
        if current_read >= *cached_write {
            *cached_write = self.producer.write_pos.load(Ordering::Acquire);
        }

        let available = *cached_write - current_read;
        let to_read = out.len().min(available as usize);
        if to_read == 0 {
            return 0;
        }

        for (i, slot) in out.iter_mut().take(to_read).enumerate() {
            *slot = unsafe { *self.slots[((current_read + i as u64) & self.mask) as usize].get() };
        }

        self.consumer
            .read_pos
            .store(current_read + to_read as u64, Ordering::Release);
        to_read
    }

    /// Messages currently available to read (estimate under concurrency)
    #[inline]
    pub fn len(&self) -> usize {
        let write = self.producer.write_pos.load(Ordering::Acquire);
        let read = self.consumer.read_pos.load(Ordering::Acquire);
        (write - read) as usize
    }

    /// Remaining capacity (estimate under concurrency)
    #[inline]
    pub fn remaining_capacity(&self) -> usize {
        self.capacity() - self.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity()
    }
}
