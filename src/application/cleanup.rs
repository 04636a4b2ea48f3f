//! Periodic removal of idle admission windows.
//!
//! Limiters prune lazily, so a key that stops sending requests keeps its
//! (stale) window until something removes it. The scheduler runs
//! [`SlidingWindowLimiter::cleanup`] on a fixed interval in a tokio task.

use crate::application::limiter::SlidingWindowLimiter;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

/// Error returned when cleanup configuration validation fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CleanupConfigError {
    #[error("cleanup interval must be greater than 0")]
    ZeroInterval,
}

/// Error returned when a background task does not stop cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShutdownError {
    #[error("background task panicked")]
    Panicked,
    #[error("background task was cancelled")]
    Cancelled,
}

impl From<JoinError> for ShutdownError {
    fn from(err: JoinError) -> Self {
        if err.is_panic() {
            ShutdownError::Panicked
        } else {
            ShutdownError::Cancelled
        }
    }
}

/// Runs cleanup passes over a set of limiters.
pub struct CleanupScheduler {
    limiters: Vec<SlidingWindowLimiter>,
    interval: Duration,
}

impl CleanupScheduler {
    /// # Errors
    /// Returns `CleanupConfigError::ZeroInterval` if `interval` is zero.
    pub fn new(interval: Duration) -> Result<Self, CleanupConfigError> {
        if interval.is_zero() {
            return Err(CleanupConfigError::ZeroInterval);
        }
        Ok(Self {
            limiters: Vec::new(),
            interval,
        })
    }

    /// Add a limiter to every pass. Clones share state with the original.
    pub fn with_limiter(mut self, limiter: SlidingWindowLimiter) -> Self {
        self.limiters.push(limiter);
        self
    }

    /// Run one pass over every limiter. Returns the number of windows removed.
    pub fn run_once(&self) -> usize {
        self.limiters.iter().map(|limiter| limiter.cleanup()).sum()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start running passes in the background.
    ///
    /// The first pass runs one interval after the call.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn start(self) -> CleanupHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker = interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = self.run_once();
                        debug!(removed, "cleanup pass finished");
                    }
                    _ = &mut stop_rx => break,
                }
            }
        });

        CleanupHandle {
            stop: Some(stop_tx),
            task,
        }
    }
}

/// Handle to a running [`CleanupScheduler`].
///
/// Dropping the handle also stops the task, without waiting for it.
#[derive(Debug)]
pub struct CleanupHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl CleanupHandle {
    /// Stop the task and wait for it to exit.
    pub async fn shutdown(mut self) -> Result<(), ShutdownError> {
        if let Some(stop) = self.stop.take() {
            // The task may already be gone; joining reports why.
            let _ = stop.send(());
        }
        (&mut self.task).await.map_err(ShutdownError::from)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
