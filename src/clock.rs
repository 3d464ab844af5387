//! Monotonic time sources.
//!
//! Every timestamp in the crate (button transitions, MIDI note on/off, smoothing
//! history) is a [`Duration`] since an arbitrary per-clock epoch. Registries and
//! resolvers share one clock so their timestamps are comparable.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of monotonic time.
pub trait Clock: Send + Sync {
    /// Time elapsed since this clock's epoch.
    fn now(&self) -> Duration;
}

/// Wall-clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        // Start one millisecond in so that a zero timestamp always means "never".
        self.epoch.elapsed() + Duration::from_millis(1)
    }
}

/// Manually advanced clock for deterministic tests and replay.
///
/// Clones share the same underlying time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new(start: Duration) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, at: Duration) {
        *self.now.lock() = at;
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    /// Convenience for tests written in milliseconds.
    pub fn set_ms(&self, ms: f64) {
        self.set(Duration::from_secs_f64(ms / 1000.0));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock()
    }
}

#[inline]
pub(crate) fn as_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_clones_share_time() {
        let a = ManualClock::new(Duration::from_millis(5));
        let b = a.clone();
        a.advance(Duration::from_millis(10));
        assert_eq!(b.now(), Duration::from_millis(15));
        b.set_ms(2.5);
        assert!((as_ms(a.now()) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_system_clock_is_never_zero() {
        let c = SystemClock::new();
        assert!(c.now() > Duration::ZERO);
    }
}
