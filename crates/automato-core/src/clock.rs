//! Injectable time source
//!
//! Caches, triggers and actions read the current time through a [`Clock`] so
//! tests can step time deterministically with [`MockClock`].

use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::sync::{Arc, RwLock};

/// Source of the current time
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A controllable clock for tests
#[derive(Debug, Clone)]
pub struct MockClock {
    current: Arc<RwLock<DateTime<Utc>>>,
}

impl MockClock {
    /// Create a mock clock starting at the current time
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    /// Create a mock clock starting at a specific time
    pub fn at(time: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(RwLock::new(time)),
        }
    }

    /// Set the current time
    pub fn set(&self, time: DateTime<Utc>) {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = time;
    }

    /// Advance time by a duration
    pub fn advance(&self, duration: Duration) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current += duration;
    }

    /// Advance time by seconds
    pub fn advance_seconds(&self, seconds: i64) {
        self.advance(Duration::seconds(seconds));
    }

    /// Advance time by milliseconds
    pub fn advance_millis(&self, millis: i64) {
        self.advance(Duration::milliseconds(millis));
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.read().unwrap_or_else(|e| e.into_inner())
    }
}

// chrono panics above i64::MAX milliseconds
const MAX_SECS: i64 = i64::MAX / 1_000;

/// Convert configured whole seconds into a chrono duration
pub fn secs(seconds: u64) -> Duration {
    Duration::seconds(i64::try_from(seconds).unwrap_or(MAX_SECS).min(MAX_SECS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_clock_advance() {
        let clock = MockClock::new();
        let start = clock.now();

        clock.advance_seconds(30);
        assert_eq!(clock.now() - start, Duration::seconds(30));

        clock.advance_millis(500);
        assert_eq!(clock.now() - start, Duration::milliseconds(30_500));
    }

    #[test]
    fn test_mock_clock_shared() {
        let clock = MockClock::new();
        let handle = clock.clone();
        let start = clock.now();

        handle.advance_seconds(5);
        assert_eq!(clock.now() - start, Duration::seconds(5));
    }

    #[test]
    fn test_secs_saturates() {
        assert_eq!(secs(30), Duration::seconds(30));
        assert_eq!(secs(u64::MAX), Duration::seconds(MAX_SECS));
    }
}
