//! Sampling gate that throttles route progress updates before scanning.
//!
//! Progress arrives many times per second, a scan is only worth running every
//! few seconds. The gate remembers when it last let an update through and drops
//! everything that arrives before the sampling period has elapsed. Dropped
//! updates are not buffered: the next scan always sees the latest progress.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Source of monotonic time for the gate.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to. Used for replaying recorded drives.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new(start: Instant) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Instant::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Per-subscriber throttle.
///
/// # Example
/// ```
/// use std::time::{Duration, Instant};
/// use driver_notification::Sampler;
///
/// let period = Duration::from_millis(800);
/// let start = Instant::now();
/// let mut sampler = Sampler::new();
///
/// assert!(sampler.admit(start, period));
/// assert!(!sampler.admit(start + Duration::from_millis(400), period));
/// assert!(sampler.admit(start + Duration::from_millis(800), period));
/// ```
#[derive(Debug, Default, Clone)]
pub struct Sampler {
    last_sample_at: Option<Instant>,
}

impl Sampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether an update arriving at `now` should be scanned.
    ///
    /// The first update is always admitted. Later ones are admitted once
    /// `period` has passed since the last admitted update.
    pub fn admit(&mut self, now: Instant, period: Duration) -> bool {
        if let Some(last) = self.last_sample_at {
            if now.saturating_duration_since(last) < period {
                return false;
            }
        }
        self.last_sample_at = Some(now);
        true
    }

    /// Forget the last sample so the next update is admitted.
    pub fn reset(&mut self) {
        self.last_sample_at = None;
    }

    pub fn last_sample_at(&self) -> Option<Instant> {
        self.last_sample_at
    }
}
