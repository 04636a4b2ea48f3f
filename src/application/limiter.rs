//! Sliding-window admission.
//!
//! Each caller key gets its own [`RateWindow`]. A check prunes the key's
//! expired admissions, then either records the new one or rejects with the
//! time until the oldest admission leaves the window.

use crate::application::metrics::Metrics;
use crate::application::ports::{Clock, Storage};
use crate::application::registry::WindowRegistry;
use crate::domain::window::{AdmissionDecision, RateWindow, WindowConfig};
use crate::infrastructure::storage::ShardedStorage;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Storage used by limiters unless another backend is supplied.
pub type DefaultWindowStorage = Arc<ShardedStorage<String, RateWindow>>;

/// Per-key sliding-window limiter.
///
/// Checks never fail and never wait on another key. State lives only in
/// memory and starts empty.
#[derive(Clone)]
pub struct SlidingWindowLimiter<S = DefaultWindowStorage>
where
    S: Storage<String, RateWindow> + Clone,
{
    registry: WindowRegistry<S>,
    metrics: Metrics,
    label: &'static str,
}

impl SlidingWindowLimiter {
    /// Create a limiter over fresh sharded storage.
    pub fn new(config: WindowConfig, clock: Arc<dyn Clock>) -> Self {
        Self::with_storage(Arc::new(ShardedStorage::new()), clock, config)
    }
}

impl<S> SlidingWindowLimiter<S>
where
    S: Storage<String, RateWindow> + Clone,
{
    /// Create a limiter over the given storage backend.
    pub fn with_storage(storage: S, clock: Arc<dyn Clock>, config: WindowConfig) -> Self {
        Self {
            registry: WindowRegistry::new(storage, clock, config),
            metrics: Metrics::new(),
            label: "default",
        }
    }

    /// Report into shared metrics instead of a private set.
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Name attached to this limiter's log records.
    pub fn with_label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    /// Check and, if allowed, record one admission for `key` now.
    pub fn check(&self, key: &str) -> AdmissionDecision {
        self.check_at(key, self.registry.clock().now())
    }

    /// Check and, if allowed, record one admission for `key` at `now`.
    ///
    /// `now` must not go backwards for a given key; earlier instants are
    /// treated as if no time had passed.
    pub fn check_at(&self, key: &str, now: Instant) -> AdmissionDecision {
        let config = *self.registry.config();
        let decision = self
            .registry
            .with_window_at(key, now, |window, now| window.admit(now, &config));

        if decision.allowed {
            self.metrics.record_admitted();
        } else {
            self.metrics.record_rejected();
            debug!(
                limiter = self.label,
                key,
                retry_after_ms = decision.reset_ms(),
                "admission rejected"
            );
        }

        decision
    }

    /// Remove every key whose window holds no live admission. Returns the number removed.
    pub fn cleanup(&self) -> usize {
        self.cleanup_at(self.registry.clock().now())
    }

    /// Like [`cleanup`](Self::cleanup), treating `now` as the current instant.
    pub fn cleanup_at(&self, now: Instant) -> usize {
        let window = self.registry.config().window();
        let mut removed = 0usize;

        self.registry.cleanup(|_, state| {
            state.prune(now, window);
            let keep = !state.is_empty();
            if !keep {
                removed += 1;
            }
            keep
        });

        if removed > 0 {
            self.metrics.record_evictions(removed);
            debug!(
                limiter = self.label,
                removed,
                remaining = self.registry.len(),
                "removed idle admission windows"
            );
        }
        removed
    }

    pub fn config(&self) -> &WindowConfig {
        self.registry.config()
    }

    pub fn registry(&self) -> &WindowRegistry<S> {
        &self.registry
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}
