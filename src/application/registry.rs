//! Central registry of per-key admission windows.
//!
//! The registry owns one [`RateWindow`] per caller key, all sharing a single
//! [`WindowConfig`]. Windows are created on first access and only removed
//! by an explicit cleanup.

use crate::application::ports::{Clock, Storage};
use crate::domain::window::{RateWindow, WindowConfig};
use std::sync::Arc;
use std::time::Instant;

/// Registry managing every key's admission window.
///
/// Uses the Storage port for concurrent access; operations on different keys
/// never contend on the same lock. In production, use `Arc<ShardedStorage>`.
#[derive(Clone)]
pub struct WindowRegistry<S>
where
    S: Storage<String, RateWindow> + Clone,
{
    storage: S,
    clock: Arc<dyn Clock>,
    config: WindowConfig,
}

impl<S> WindowRegistry<S>
where
    S: Storage<String, RateWindow> + Clone,
{
    pub fn new(storage: S, clock: Arc<dyn Clock>, config: WindowConfig) -> Self {
        Self {
            storage,
            clock,
            config,
        }
    }

    /// Access or create the window for `key` at the current instant.
    pub fn with_window<F, R>(&self, key: &str, f: F) -> R
    where
        F: FnOnce(&mut RateWindow, Instant) -> R,
    {
        self.with_window_at(key, self.clock.now(), f)
    }

    /// Access or create the window for `key`, treating `now` as the current instant.
    pub fn with_window_at<F, R>(&self, key: &str, now: Instant, f: F) -> R
    where
        F: FnOnce(&mut RateWindow, Instant) -> R,
    {
        self.storage
            .with_entry_mut(key.to_owned(), RateWindow::new, |window| f(window, now))
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Get the number of tracked keys.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Forget every window.
    pub fn clear(&self) {
        self.storage.clear();
    }

    /// Iterate over all windows with a callback.
    pub fn for_each<F>(&self, f: F)
    where
        F: FnMut(&String, &RateWindow),
    {
        self.storage.for_each(f);
    }

    /// Keep only the windows for which `f` returns true.
    pub fn cleanup<F>(&self, f: F)
    where
        F: FnMut(&String, &mut RateWindow) -> bool,
    {
        self.storage.retain(f);
    }
}
