//! Injectable wall clock
//!
//! The Coordinator and [`crate::allocator::ChargerState`] never read the
//! system clock directly; they receive `now` (epoch seconds) from whatever
//! implements [`Clock`], so a test can drive the control loop through a
//! deterministic sequence of timestamps instead of waiting on real time.

use std::time::{SystemTime, UNIX_EPOCH};

/// A source of the current time, expressed as epoch seconds.
pub trait Clock: Send + Sync {
    /// Current time in whole seconds since the Unix epoch.
    fn now(&self) -> u64;
}

/// Reads the real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// A clock whose value is set explicitly, for deterministic tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: std::sync::atomic::AtomicU64,
}

impl ManualClock {
    /// Create a manual clock starting at the given time.
    pub fn new(start: u64) -> Self {
        Self {
            now: std::sync::atomic::AtomicU64::new(start),
        }
    }

    /// Set the clock to an absolute time.
    pub fn set(&self, now: u64) {
        self.now.store(now, std::sync::atomic::Ordering::SeqCst);
    }

    /// Advance the clock by the given number of seconds.
    pub fn advance(&self, seconds: u64) {
        self.now
            .fetch_add(seconds, std::sync::atomic::Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new(1000);
        assert_eq!(clock.now(), 1000);
        clock.advance(30);
        assert_eq!(clock.now(), 1030);
        clock.set(2000);
        assert_eq!(clock.now(), 2000);
    }

    #[test]
    fn test_system_clock_is_plausible() {
        let clock = SystemClock;
        assert!(clock.now() > 1_700_000_000);
    }
}
