//! Generator pacing: a token bucket refilled at the configured rate.
//!
//! The generator ticks every millisecond and emits as many packets as there
//! are whole tokens. Burst is capped at 10 ms worth of traffic so a stalled
//! downstream does not turn into a flood once it drains.

use std::time::{Duration, Instant};

/// Interval between generator wake-ups.
pub const TICK: Duration = Duration::from_millis(1);

const BURST_WINDOW_SECS: f64 = 0.010;

#[derive(Debug)]
pub struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// `rate` is in packets per second and must be non-zero.
    pub fn new(rate: u64) -> Self {
        Self::new_at(rate, Instant::now())
    }

    fn new_at(rate: u64, now: Instant) -> Self {
        let refill_rate = rate as f64;
        let capacity = (refill_rate * BURST_WINDOW_SECS).max(1.0);
        Self {
            tokens: capacity,
            capacity,
            refill_rate,
            last_refill: now,
        }
    }

    /// Drain every whole token accumulated so far.
    pub fn take_available(&mut self) -> u64 {
        self.take_available_at(Instant::now())
    }

    fn take_available_at(&mut self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;

        let whole = self.tokens.floor();
        self.tokens -= whole;
        whole as u64
    }

    pub fn capacity(&self) -> u64 {
        self.capacity as u64
    }
}
