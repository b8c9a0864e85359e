//! Sliding-window throughput estimator shared by both session types.
//!
//! Bytes accumulate in a rolling window; the reported rate steps when the
//! window resets rather than decaying smoothly. Callers sample on a fixed
//! tick (`SAMPLE_INTERVAL`).

use std::time::{Duration, Instant};

/// How long a window accumulates before it resets.
pub const WINDOW_PERIOD: Duration = Duration::from_secs(3);

/// Tick at which views are expected to call [`ThroughputEstimator::sample`].
pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(500);

/// Instantaneous transfer rates in bytes per second.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rates {
    pub in_rate: f64,
    pub out_rate: f64,
}

#[derive(Debug)]
pub struct ThroughputEstimator {
    window_start: Instant,
    bytes_in: u64,
    bytes_out: u64,
    last: Rates,
}

impl ThroughputEstimator {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    fn starting_at(now: Instant) -> Self {
        Self {
            window_start: now,
            bytes_in: 0,
            bytes_out: 0,
            last: Rates::default(),
        }
    }

    pub fn record_in(&mut self, bytes: usize) {
        self.bytes_in += bytes as u64;
    }

    pub fn record_out(&mut self, bytes: usize) {
        self.bytes_out += bytes as u64;
    }

    /// Compute rates for the current window.
    ///
    /// Returns the previous rates unchanged when no time has elapsed.
    /// When the window has run for [`WINDOW_PERIOD`] it resets, after this
    /// sample is computed, so the caller sees one final sample at the old
    /// rate before the step.
    pub fn sample(&mut self) -> Rates {
        self.sample_at(Instant::now())
    }

    fn sample_at(&mut self, now: Instant) -> Rates {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed.is_zero() {
            return self.last;
        }

        let secs = elapsed.as_secs_f64();
        self.last = Rates {
            in_rate: self.bytes_in as f64 / secs,
            out_rate: self.bytes_out as f64 / secs,
        };

        if elapsed >= WINDOW_PERIOD {
            self.window_start = now;
            self.bytes_in = 0;
            self.bytes_out = 0;
        }

        self.last
    }

    /// Drop all window state. Required on reconnect so a stale rate from a
    /// prior connection is never displayed as current.
    pub fn reset(&mut self) {
        self.reset_at(Instant::now());
    }

    fn reset_at(&mut self, now: Instant) {
        self.window_start = now;
        self.bytes_in = 0;
        self.bytes_out = 0;
        self.last = Rates::default();
    }
}

impl Default for ThroughputEstimator {
    fn default() -> Self {
        Self::new()
    }
}
