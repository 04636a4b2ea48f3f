//! Observability metrics for admission and telemetry.
//!
//! Counters are shared by every limiter and the governor so one snapshot
//! describes the whole pipeline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Metrics tracking admission and recording statistics.
///
/// All metrics use atomic operations for thread-safe updates and reads.
/// Clones share the same counters.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    /// Requests admitted by a limiter
    admitted: AtomicU64,
    /// Requests rejected by a limiter
    rejected: AtomicU64,
    /// Idle windows removed by cleanup
    windows_evicted: AtomicU64,
    /// Events handed to the log (or its writer queue)
    events_recorded: AtomicU64,
    /// Events lost to a write failure or a full queue
    events_dropped: AtomicU64,
}

impl Metrics {
    /// Create a new metrics tracker.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                admitted: AtomicU64::new(0),
                rejected: AtomicU64::new(0),
                windows_evicted: AtomicU64::new(0),
                events_recorded: AtomicU64::new(0),
                events_dropped: AtomicU64::new(0),
            }),
        }
    }

    pub(crate) fn record_admitted(&self) {
        self.inner.admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.inner.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_evictions(&self, count: usize) {
        self.inner
            .windows_evicted
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_event(&self) {
        self.inner.events_recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.inner.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the total number of admitted requests.
    pub fn admitted(&self) -> u64 {
        self.inner.admitted.load(Ordering::Relaxed)
    }

    /// Get the total number of rejected requests.
    pub fn rejected(&self) -> u64 {
        self.inner.rejected.load(Ordering::Relaxed)
    }

    /// Get the total number of windows removed by cleanup.
    pub fn windows_evicted(&self) -> u64 {
        self.inner.windows_evicted.load(Ordering::Relaxed)
    }

    /// Get the total number of events accepted for recording.
    pub fn events_recorded(&self) -> u64 {
        self.inner.events_recorded.load(Ordering::Relaxed)
    }

    /// Get the total number of events that could not be recorded.
    pub fn events_dropped(&self) -> u64 {
        self.inner.events_dropped.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            admitted: self.admitted(),
            rejected: self.rejected(),
            windows_evicted: self.windows_evicted(),
            events_recorded: self.events_recorded(),
            events_dropped: self.events_dropped(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub admitted: u64,
    pub rejected: u64,
    pub windows_evicted: u64,
    pub events_recorded: u64,
    pub events_dropped: u64,
}

impl MetricsSnapshot {
    /// Calculate the rejection rate (0.0 to 1.0).
    ///
    /// Returns 0.0 if no admission checks have been made.
    pub fn rejection_rate(&self) -> f64 {
        let total = self.total_checks();
        if total == 0 {
            0.0
        } else {
            self.rejected as f64 / total as f64
        }
    }

    /// Get the total number of admission checks (admitted + rejected).
    pub fn total_checks(&self) -> u64 {
        self.admitted.saturating_add(self.rejected)
    }
}
