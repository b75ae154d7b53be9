//! Time sources
//!
//! Everything that consumes wall-clock time (the engine's deferred work
//! queue, the circuit-breaker cool-down, message timestamping) goes
//! through the [`Clock`] capability so tests can inject a deterministic
//! source. Real builds use [`CalibratedClock`], which pins a cycle/wall
//! reference pair at construction and converts elapsed cycles to
//! nanoseconds on the fast path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Nanosecond time source
pub trait Clock: Send + Sync {
    /// Monotonic nanoseconds since an arbitrary epoch (calibrated clocks
    /// anchor to the Unix epoch)
    fn now_ns(&self) -> u64;
}

/// Read the raw cycle counter
///
/// On x86-64 this is a single `rdtsc`; elsewhere it falls back to a
/// process-local monotonic nanosecond count, which preserves the
/// monotonicity contract at lower resolution.
#[inline(always)]
pub fn cycles() -> u64 {
    #[cfg(target_arch = "x86_64")]
    unsafe {
        std::arch::x86_64::_rdtsc()
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
        START.get_or_init(Instant::now).elapsed().as_nanos() as u64
    }
}

/// Serializing cycle read: all prior operations complete before the
/// counter is sampled
#[inline(always)]
pub fn cycles_serialized() -> u64 {
    std::sync::atomic::fence(Ordering::SeqCst);
    cycles()
}

/// Wall-clock nanoseconds since the Unix epoch
#[inline]
pub fn wall_clock_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_nanos() as u64
}

/// Calibration result: a (cycles, wall_ns) reference pair plus the
/// measured counter frequency
#[derive(Debug, Clone, Copy)]
pub struct Calibration {
    pub ref_cycles: u64,
    pub ref_wall_ns: u64,
    pub cycles_per_sec: u64,
}

impl Calibration {
    /// Measure the cycle counter against the monotonic clock.
    ///
    /// Runs once at construction; never on a fast path.
    pub fn measure() -> Self {
        let wall_start = wall_clock_ns();
        let instant_start = Instant::now();
        let cycles_start = cycles();

        // Short busy calibration window; sleeping would be at the mercy
        // of scheduler granularity on loaded hosts.
        while instant_start.elapsed() < Duration::from_millis(10) {
            std::hint::spin_loop();
        }

        let cycles_end = cycles();
        let elapsed_ns = instant_start.elapsed().as_nanos() as u64;

        let delta = cycles_end.saturating_sub(cycles_start).max(1);
        let cycles_per_sec = (delta as u128 * 1_000_000_000 / elapsed_ns.max(1) as u128) as u64;

        Self {
            ref_cycles: cycles_start,
            ref_wall_ns: wall_start,
            cycles_per_sec: cycles_per_sec.max(1),
        }
    }

    /// Convert a raw cycle reading to wall nanoseconds
    #[inline(always)]
    pub fn cycles_to_ns(&self, raw: u64) -> u64 {
        let elapsed = raw.saturating_sub(self.ref_cycles);
        let elapsed_ns =
            (elapsed as u128 * 1_000_000_000 / self.cycles_per_sec as u128) as u64;
        self.ref_wall_ns + elapsed_ns
    }
}

/// Cycle-counter clock calibrated against the wall clock at construction
pub struct CalibratedClock {
    calibration: Calibration,
}

impl CalibratedClock {
    pub fn new() -> Self {
        Self { calibration: Calibration::measure() }
    }

    pub fn calibration(&self) -> Calibration {
        self.calibration
    }
}

impl Default for CalibratedClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for CalibratedClock {
    #[inline(always)]
    fn now_ns(&self) -> u64 {
        self.calibration.cycles_to_ns(cycles())
    }
}

/// Deterministic clock for tests; advances only when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ns: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ns: u64) -> Self {
        Self { now_ns: AtomicU64::new(start_ns) }
    }

    pub fn advance(&self, delta_ns: u64) {
        self.now_ns.fetch_add(delta_ns, Ordering::Release);
    }

    pub fn set(&self, now_ns: u64) {
        self.now_ns.store(now_ns, Ordering::Release);
    }
}

impl Clock for ManualClock {
    #[inline(always)]
    fn now_ns(&self) -> u64 {
        self.now_ns.load(Ordering::Acquire)
    }
}
