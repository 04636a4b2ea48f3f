//! Clock adapters.
//!
//! [`SystemClock`] reads the monotonic clock for window arithmetic and the
//! wall clock for event timestamps. Tests use `MockClock` from
//! `crate::infrastructure::mocks` (feature `test-helpers`) to drive both.

use crate::application::ports::Clock;
use chrono::{DateTime, Utc};
use std::time::Instant;

/// Clock backed by `Instant::now()` and `Utc::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_system_clock_advances() {
        let clock = SystemClock::new();
        let t1 = clock.now();
        let w1 = clock.wall_now();
        std::thread::sleep(Duration::from_millis(10));

        assert!(clock.now() > t1);
        assert!(clock.wall_now() >= w1);
    }
}
