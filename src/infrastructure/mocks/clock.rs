//! Mock clock for testing.

use crate::application::ports::Clock;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Mock clock for testing.
///
/// Holds a monotonic instant and a wall-clock time that move together, so
/// tests can step through admission windows and stamp events at known times.
///
/// # Examples
///
/// ```
/// use inference_governor::infrastructure::mocks::MockClock;
/// use inference_governor::application::ports::Clock;
/// use std::time::{Duration, Instant};
///
/// let start = Instant::now();
/// let clock = MockClock::new(start);
/// let wall = clock.wall_now();
///
/// clock.advance(Duration::from_millis(1_500));
/// assert_eq!(clock.now(), start + Duration::from_millis(1_500));
/// assert_eq!(clock.wall_now(), wall + chrono::Duration::milliseconds(1_500));
/// ```
///
/// # Thread Safety
///
/// All clones share the same underlying time, so advancing one clone moves
/// every clone.
#[derive(Debug, Clone)]
pub struct MockClock {
    current: Arc<Mutex<(Instant, DateTime<Utc>)>>,
}

impl MockClock {
    /// Create a mock clock starting at `start`, with the wall clock at the real current time.
    pub fn new(start: Instant) -> Self {
        Self::with_wall_time(start, Utc::now())
    }

    /// Create a mock clock starting at the given instant and wall-clock time.
    pub fn with_wall_time(start: Instant, wall: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(Mutex::new((start, wall))),
        }
    }

    /// Advance both clocks by a duration.
    pub fn advance(&self, duration: Duration) {
        let mut current = self
            .current
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock");
        current.0 += duration;
        current.1 += chrono::Duration::from_std(duration)
            .expect("MockClock advanced by a duration outside the wall-clock range");
    }

    /// Advance both clocks by a number of milliseconds.
    pub fn advance_ms(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    /// Set the wall-clock time without touching the monotonic instant.
    pub fn set_wall_time(&self, wall: DateTime<Utc>) {
        let mut current = self
            .current
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock");
        current.1 = wall;
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.current
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock")
            .0
    }

    fn wall_now(&self) -> DateTime<Utc> {
        self.current
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock")
            .1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_mock_clock() {
        let start = Instant::now();
        let wall = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let clock = MockClock::with_wall_time(start, wall);

        assert_eq!(clock.now(), start);
        assert_eq!(clock.wall_now(), wall);

        clock.advance_ms(10_000);
        assert_eq!(clock.now(), start + Duration::from_secs(10));
        assert_eq!(clock.wall_now(), wall + chrono::Duration::seconds(10));

        let later = Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap();
        clock.set_wall_time(later);
        assert_eq!(clock.wall_now(), later);
        assert_eq!(clock.now(), start + Duration::from_secs(10));
    }
}
