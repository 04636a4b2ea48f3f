//! Sliding-window admission state.
//!
//! A [`RateWindow`] remembers the instants at which a single key was admitted
//! during the trailing window. Old instants are pruned lazily, on access, so
//! an idle key costs nothing until the next check or cleanup pass.

use serde::Deserialize;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Error returned when a window configuration is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WindowConfigError {
    /// The trailing window must be longer than zero
    #[error("window duration must be greater than 0")]
    ZeroWindow,
    /// At least one request per window must be admissible
    #[error("max requests must be greater than 0")]
    ZeroMaxRequests,
}

/// Limits applied to every key of one limiter.
///
/// Fixed at construction. Deserializes from `{"windowMs": .., "maxRequests": ..}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawWindowConfig")]
pub struct WindowConfig {
    window: Duration,
    max_requests: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWindowConfig {
    window_ms: u64,
    max_requests: usize,
}

impl TryFrom<RawWindowConfig> for WindowConfig {
    type Error = WindowConfigError;

    fn try_from(raw: RawWindowConfig) -> Result<Self, Self::Error> {
        WindowConfig::new(Duration::from_millis(raw.window_ms), raw.max_requests)
    }
}

impl WindowConfig {
    /// Create a window configuration.
    ///
    /// # Errors
    /// Returns `WindowConfigError::ZeroWindow` if `window` is zero and
    /// `WindowConfigError::ZeroMaxRequests` if `max_requests` is zero.
    pub fn new(window: Duration, max_requests: usize) -> Result<Self, WindowConfigError> {
        if window.is_zero() {
            return Err(WindowConfigError::ZeroWindow);
        }
        if max_requests == 0 {
            return Err(WindowConfigError::ZeroMaxRequests);
        }
        Ok(Self {
            window,
            max_requests,
        })
    }

    /// Shorthand for `new(Duration::from_millis(window_ms), max_requests)`.
    pub fn from_millis(window_ms: u64, max_requests: usize) -> Result<Self, WindowConfigError> {
        Self::new(Duration::from_millis(window_ms), max_requests)
    }

    /// Length of the trailing window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Admission ceiling per window.
    pub fn max_requests(&self) -> usize {
        self.max_requests
    }
}

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionDecision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Admissions left in the current window after this one
    pub remaining: usize,
    /// Time until the oldest recorded admission leaves the window
    pub reset: Duration,
}

impl AdmissionDecision {
    /// `reset` in whole milliseconds.
    pub fn reset_ms(&self) -> u64 {
        u64::try_from(self.reset.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Admission instants for one key, oldest first.
#[derive(Debug, Clone, Default)]
pub struct RateWindow {
    timestamps: VecDeque<Instant>,
}

impl RateWindow {
    /// Create an empty window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every instant that is no longer strictly inside the window.
    pub fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.timestamps.front() {
            if now.saturating_duration_since(oldest) >= window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Prune, then admit `now` if the ceiling has not been reached.
    pub fn admit(&mut self, now: Instant, config: &WindowConfig) -> AdmissionDecision {
        self.prune(now, config.window);

        if self.timestamps.len() >= config.max_requests {
            return AdmissionDecision {
                allowed: false,
                remaining: 0,
                reset: self.reset_after(now, config.window),
            };
        }

        self.timestamps.push_back(now);
        AdmissionDecision {
            allowed: true,
            remaining: config.max_requests - self.timestamps.len(),
            reset: self.reset_after(now, config.window),
        }
    }

    fn reset_after(&self, now: Instant, window: Duration) -> Duration {
        match self.timestamps.front() {
            Some(&oldest) => (oldest + window).saturating_duration_since(now).min(window),
            None => Duration::ZERO,
        }
    }

    /// Number of admissions currently recorded (may include stale ones until pruned).
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// True when no admissions are recorded.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Oldest recorded admission, if any.
    pub fn oldest(&self) -> Option<Instant> {
        self.timestamps.front().copied()
    }
}
