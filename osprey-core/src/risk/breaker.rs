//! Circuit breaker state machine
//!
//! ```text
//!   Normal ──(hard limit violated, breaker enabled)──▶ CoolingDown
//!   CoolingDown ──(cool-down elapsed, lazy check)────▶ Normal
//!   any ──(explicit emergency_stop)──────────────────▶ Halted
//!   Halted ──(explicit reset)────────────────────────▶ Normal
//! ```
//!
//! The cool-down check is lazy: state only advances when polled, so a
//! caller that never authorises again never pays for a timer.

use tracing::{error, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakerState {
    Normal,
    /// Tripped by a hard limit; self-resets after the cool-down
    CoolingDown { since_ns: u64 },
    /// Explicit operator halt; only an explicit reset clears it
    Halted { reason: String },
}

#[derive(Debug)]
pub struct CircuitBreaker {
    state: BreakerState,
    cooldown_ns: u64,
    total_trips: u64,
}

impl CircuitBreaker {
    pub fn new(cooldown_seconds: u32) -> Self {
        Self {
            state: BreakerState::Normal,
            cooldown_ns: cooldown_seconds as u64 * 1_000_000_000,
            total_trips: 0,
        }
    }

    pub fn set_cooldown_seconds(&mut self, cooldown_seconds: u32) {
        self.cooldown_ns = cooldown_seconds as u64 * 1_000_000_000;
    }

    /// Trip into cool-down. A breaker already cooling or halted stays
    /// where it is.
    pub fn trip(&mut self, now_ns: u64, reason: &str) {
        if matches!(self.state, BreakerState::Normal) {
            error!(reason, cooldown_s = self.cooldown_ns / 1_000_000_000, "circuit breaker tripped");
            self.state = BreakerState::CoolingDown { since_ns: now_ns };
            self.total_trips += 1;
        }
    }

    /// Explicit emergency stop. Idempotent: repeated calls are
    /// equivalent to one.
    pub fn halt(&mut self, reason: &str) {
        if matches!(self.state, BreakerState::Halted { .. }) {
            return;
        }
        error!(reason, "emergency stop");
        self.state = BreakerState::Halted { reason: reason.to_string() };
        self.total_trips += 1;
    }

    /// Explicit reset from any state
    pub fn reset(&mut self) {
        if !matches!(self.state, BreakerState::Normal) {
            warn!("circuit breaker reset");
        }
        self.state = BreakerState::Normal;
    }

    /// Advance the lazy cool-down and return the current state
    pub fn poll(&mut self, now_ns: u64) -> &BreakerState {
        if let BreakerState::CoolingDown { since_ns } = self.state {
            if now_ns.saturating_sub(since_ns) >= self.cooldown_ns {
                warn!("circuit breaker cool-down elapsed, trading resumes");
                self.state = BreakerState::Normal;
            }
        }
        &self.state
    }

    pub fn state(&self) -> &BreakerState {
        &self.state
    }

    pub fn is_halted(&self) -> bool {
        matches!(self.state, BreakerState::Halted { .. })
    }

    pub fn total_trips(&self) -> u64 {
        self.total_trips
    }
}
