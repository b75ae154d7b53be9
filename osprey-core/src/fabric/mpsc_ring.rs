//! Multi-producer single-consumer ring buffer
//!
//! Producers claim slots with an atomic counter and mark completion in a
//! per-slot committed flag; the consumer only advances over a contiguous
//! committed prefix, so it never observes a hole. A full ring refuses the
//! claim outright rather than leaving a claimed-but-unwritten slot that
//! would stall the prefix forever.

use crate::core::message::SequencedMessage;
use crossbeam::utils::CachePadded;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use super::ring::MIN_RING_CAPACITY;

/// Lock-free MPSC ring carrying [`SequencedMessage`]
///
/// # Contract
///
/// Any number of threads may call [`write`](Self::write); exactly one
/// thread may call [`read`](Self::read).
pub struct MpscRing {
    /// Next slot to claim (shared among producers)
    write_claim: CachePadded<AtomicU64>,
    /// Contiguous committed prefix visible to the consumer
    write_commit: CachePadded<AtomicU64>,
    /// Consumer position plus its cached view of the commit watermark
    read_pos: CachePadded<AtomicU64>,
    cached_commit: UnsafeCell<u64>,
    slots: Box<[UnsafeCell<SequencedMessage>]>,
    committed: Box<[AtomicU8]>,
    mask: u64,
}

unsafe impl Send for MpscRing {}
unsafe impl Sync for MpscRing {}

impl MpscRing {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity.is_power_of_two(), "ring capacity must be a power of two");
        assert!(capacity >= MIN_RING_CAPACITY, "ring capacity must be at least {}", MIN_RING_CAPACITY);

        Self {
            write_claim: CachePadded::new(AtomicU64::new(0)),
            write_commit: CachePadded::new(AtomicU64::new(0)),
            read_pos: CachePadded::new(AtomicU64::new(0)),
            cached_commit: UnsafeCell::new(0),
            slots: (0..capacity)
                .map(|_| UnsafeCell::new(SequencedMessage::default()))
                .collect(),
            committed: (0..capacity).map(|_| AtomicU8::new(0)).collect(),
            mask: capacity as u64 - 1,
        }
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Write a message (any producer thread). Returns `false` iff the
    /// buffer is full.
    pub fn write(&self, msg: SequencedMessage) -> bool {
        // Claim a slot only if space exists; a blind fetch-add on a full
        // ring would leave an uncommitted hole ahead of the consumer.
        let mut slot = self.write_claim.load(Ordering::Relaxed);
        loop {
            let read = self.read_pos.load(Ordering::Acquire);
            if slot - read >= self.mask + 1 {
                return false;
            }
            match self.write_claim.compare_exchange_weak(
                slot,
                slot + 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => slot = actual,
            }
        }

        let index = (slot & self.mask) as usize;
        unsafe {
            *self.slots[index].get() = msg;
        }
        self.committed[index].store(1, Ordering::Release);
        std::sync::atomic::fence(Ordering::SeqCst);

        // Advance the commit watermark over every contiguous committed
        // slot. Flags are cleared by the consumer as it reads, so a
        // slot's flag is set only within its current generation.
        loop {
            let commit = self.write_commit.load(Ordering::Acquire);
            let idx = (commit & self.mask) as usize;
            if commit == self.write_claim.load(Ordering::Acquire)
                || self.committed[idx].load(Ordering::Acquire) == 0
            {
                return true;
            }
            let _ = self.write_commit.compare_exchange(
                commit,
                commit + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
        }
    }

    /// Read the next message (single consumer thread). Returns `None`
    /// iff no committed message is available.
    pub fn read(&self) -> Option<SequencedMessage> {
        let current_read = self.read_pos.load(Ordering::Relaxed);

        let cached_commit = unsafe { &mut *self.cached_commit.get() };
        if current_read >= *cached_commit {
            *cached_commit = self.write_commit.load(Ordering::Acquire);
            if current_read >= *cached_commit {
                return None;
            }
        }

        let index = (current_read & self.mask) as usize;
        let msg = unsafe { *self.slots[index].get() };
        // Clear before releasing the read index: a producer can only
        // reuse this slot after it observes the advanced index, which
        // orders the clear before any new commit of the slot
        self.committed[index].store(0, Ordering::Relaxed);
        self.read_pos.store(current_read + 1, Ordering::Release);
        Some(msg)
    }

    /// Committed messages currently available (estimate under
    /// concurrency)
    #[inline]
    pub fn len(&self) -> usize {
        let commit = self.write_commit.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Acquire);
        (commit - read) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
