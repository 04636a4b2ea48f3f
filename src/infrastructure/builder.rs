//! Governor construction and configuration.
//!
//! [`GovernorBuilder`] validates limits, picks the event log, and starts the
//! optional background tasks. [`GovernorConfig`] is the serde-friendly form
//! of the same settings, for loading from a config file.

use crate::application::governor::{EndpointClass, Governor};
use crate::application::ports::{Clock, EventLog};
use crate::domain::window::{WindowConfig, WindowConfigError};
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::event_log::{JsonlEventLog, DEFAULT_LOG_PATH};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[cfg(feature = "async")]
use crate::infrastructure::queued_writer::QueuedEventWriter;

/// Default window for both endpoint classes.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);
/// Default content admissions per window.
pub const DEFAULT_CONTENT_MAX: usize = 10;
/// Default conversation admissions per window.
pub const DEFAULT_CONVERSATION_MAX: usize = 20;

/// Error returned when building a [`Governor`] fails.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid {class} limit: {source}")]
    Window {
        class: EndpointClass,
        #[source]
        source: WindowConfigError,
    },
    #[error("cleanup interval must be greater than 0")]
    ZeroCleanupInterval,
    #[error("write queue capacity must be greater than 0")]
    ZeroQueueCapacity,
    /// Background tasks were requested outside a tokio runtime
    #[error("a tokio runtime is required for background tasks")]
    NoRuntime,
    /// Background tasks were requested without the `async` feature
    #[error("background tasks require the `async` feature")]
    AsyncDisabled,
}

/// Window and ceiling for one endpoint class, as written in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitSettings {
    pub window_ms: u64,
    pub max_requests: usize,
}

impl LimitSettings {
    fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// File-friendly governor settings.
///
/// Every field is optional in the input; missing ones take the defaults.
///
/// ```
/// use inference_governor::GovernorConfig;
///
/// let config: GovernorConfig = serde_json::from_str(
///     r#"{"content": {"windowMs": 30000, "maxRequests": 5}, "queueCapacity": 256}"#,
/// ).unwrap();
///
/// assert_eq!(config.content.max_requests, 5);
/// assert_eq!(config.conversation.max_requests, 20);
/// assert_eq!(config.queue_capacity, Some(256));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GovernorConfig {
    pub content: LimitSettings,
    pub conversation: LimitSettings,
    pub log_path: PathBuf,
    pub cleanup_interval_ms: Option<u64>,
    pub queue_capacity: Option<usize>,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        let window_ms = DEFAULT_WINDOW.as_millis() as u64;
        Self {
            content: LimitSettings {
                window_ms,
                max_requests: DEFAULT_CONTENT_MAX,
            },
            conversation: LimitSettings {
                window_ms,
                max_requests: DEFAULT_CONVERSATION_MAX,
            },
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
            cleanup_interval_ms: None,
            queue_capacity: None,
        }
    }
}

/// Builder for [`Governor`].
#[derive(Debug)]
pub struct GovernorBuilder {
    content: (Duration, usize),
    conversation: (Duration, usize),
    log_path: PathBuf,
    log: Option<Arc<dyn EventLog>>,
    clock: Option<Arc<dyn Clock>>,
    cleanup_interval: Option<Duration>,
    queue_capacity: Option<usize>,
}

impl Default for GovernorBuilder {
    fn default() -> Self {
        Self::from_config(GovernorConfig::default())
    }
}

impl GovernorBuilder {
    /// Start from `config` instead of the defaults.
    pub fn from_config(config: GovernorConfig) -> Self {
        Self {
            content: (config.content.window(), config.content.max_requests),
            conversation: (
                config.conversation.window(),
                config.conversation.max_requests,
            ),
            log_path: config.log_path,
            log: None,
            clock: None,
            cleanup_interval: config.cleanup_interval_ms.map(Duration::from_millis),
            queue_capacity: config.queue_capacity,
        }
    }

    /// Set the content endpoints' window and ceiling.
    ///
    /// Validated when `build()` is called.
    pub fn with_content_limit(mut self, window: Duration, max_requests: usize) -> Self {
        self.content = (window, max_requests);
        self
    }

    /// Set the conversation endpoints' window and ceiling.
    ///
    /// Validated when `build()` is called.
    pub fn with_conversation_limit(mut self, window: Duration, max_requests: usize) -> Self {
        self.conversation = (window, max_requests);
        self
    }

    /// Append events to a JSONL file at `path`.
    pub fn with_event_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = path.into();
        self.log = None;
        self
    }

    /// Use a custom event log instead of the JSONL file.
    pub fn with_event_log(mut self, log: Arc<dyn EventLog>) -> Self {
        self.log = Some(log);
        self
    }

    /// Set a custom clock (mainly for testing).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Remove idle windows on a fixed interval.
    ///
    /// **Requires the `async` feature** and a running tokio runtime at
    /// `build()` time.
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = Some(interval);
        self
    }

    /// Write events from a single background task fed by a queue of `capacity`.
    ///
    /// **Requires the `async` feature** and a running tokio runtime at
    /// `build()` time.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// Build the governor.
    ///
    /// # Errors
    /// Returns `BuildError` if a limit, the cleanup interval, or the queue
    /// capacity is invalid, or if background tasks cannot be started.
    pub fn build(self) -> Result<Governor, BuildError> {
        let content = limit(EndpointClass::Content, self.content)?;
        let conversation = limit(EndpointClass::Conversation, self.conversation)?;

        if self.cleanup_interval.is_some_and(|interval| interval.is_zero()) {
            return Err(BuildError::ZeroCleanupInterval);
        }
        if self.queue_capacity == Some(0) {
            return Err(BuildError::ZeroQueueCapacity);
        }
        let wants_background = self.cleanup_interval.is_some() || self.queue_capacity.is_some();

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock::new()));
        let log: Arc<dyn EventLog> = match self.log {
            Some(log) => log,
            None => Arc::new(JsonlEventLog::new(self.log_path)),
        };

        #[cfg(not(feature = "async"))]
        if wants_background {
            return Err(BuildError::AsyncDisabled);
        }
        #[cfg(feature = "async")]
        if wants_background && tokio::runtime::Handle::try_current().is_err() {
            return Err(BuildError::NoRuntime);
        }

        #[allow(unused_mut)]
        let mut governor = Governor::new(content, conversation, log.clone(), clock);

        #[cfg(feature = "async")]
        {
            if let Some(capacity) = self.queue_capacity {
                let (writer, handle) =
                    QueuedEventWriter::spawn(log, capacity, governor.metrics().clone());
                governor = governor.with_sink(Arc::new(writer));
                governor.attach_writer(handle);
            }

            if let Some(interval) = self.cleanup_interval {
                let handle = governor
                    .start_cleanup(interval)
                    .map_err(|_| BuildError::ZeroCleanupInterval)?;
                governor.attach_cleanup(handle);
            }
        }

        Ok(governor)
    }
}

fn limit(class: EndpointClass, (window, max): (Duration, usize)) -> Result<WindowConfig, BuildError> {
    WindowConfig::new(window, max).map_err(|source| BuildError::Window { class, source })
}

impl Governor {
    /// Create a builder for configuring the governor.
    ///
    /// Defaults:
    /// - Content: 10 requests per 60 seconds per caller
    /// - Conversation: 20 requests per 60 seconds per caller
    /// - Event log: JSONL file at `.data/telemetry.jsonl`, written inline
    /// - Cleanup: none (windows are pruned lazily)
    pub fn builder() -> GovernorBuilder {
        GovernorBuilder::default()
    }
}
