//! Wall-clock source for lease arithmetic
//!
//! Leases are compared against wall-clock time in nanoseconds since the Unix
//! epoch, so every client sharing a key must share a roughly synchronized
//! clock. Tests drive time through [`ManualClock`].

use std::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync + Debug {
    /// Nanoseconds since the Unix epoch
    fn now_nanos(&self) -> i64;
}

/// System wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_nanos(&self) -> i64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(d) => i64::try_from(d.as_nanos()).unwrap_or(i64::MAX),
            // Clock set before 1970
            Err(e) => -i64::try_from(e.duration().as_nanos()).unwrap_or(i64::MAX),
        }
    }
}

/// Manually driven clock for tests and simulations
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicI64,
}

impl ManualClock {
    pub fn new(start_nanos: i64) -> Self {
        Self {
            nanos: AtomicI64::new(start_nanos),
        }
    }

    /// Start at the current wall-clock time
    pub fn from_system() -> Self {
        Self::new(SystemClock.now_nanos())
    }

    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(duration_nanos(by), Ordering::SeqCst);
    }

    pub fn set(&self, nanos: i64) {
        self.nanos.store(nanos, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_nanos(&self) -> i64 {
        self.nanos.load(Ordering::SeqCst)
    }
}

/// Duration as signed nanoseconds, saturating at `i64::MAX`
pub fn duration_nanos(d: Duration) -> i64 {
    i64::try_from(d.as_nanos()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_after_2020() {
        // 2020-01-01T00:00:00Z
        assert!(SystemClock.now_nanos() > 1_577_836_800_000_000_000);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now_nanos(), 1_000);

        clock.advance(Duration::from_micros(2));
        assert_eq!(clock.now_nanos(), 3_000);

        clock.set(42);
        assert_eq!(clock.now_nanos(), 42);
    }

    #[test]
    fn test_duration_nanos_saturates() {
        assert_eq!(duration_nanos(Duration::from_millis(3)), 3_000_000);
        assert_eq!(duration_nanos(Duration::MAX), i64::MAX);
    }
}
