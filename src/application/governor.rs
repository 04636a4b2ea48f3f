//! Admission and recording facade.
//!
//! Request handlers talk to a [`Governor`] only: [`Governor::admit`] before
//! any metered work starts, then [`Governor::complete`] (or
//! [`Governor::record`]) once it has finished, on success and error paths
//! alike. Telemetry failures end here as warnings; they never reach the
//! request.

use crate::application::aggregator::{Aggregator, EventPage, EventQuery};
use crate::application::limiter::SlidingWindowLimiter;
use crate::application::metrics::Metrics;
use crate::application::ports::{Clock, EventLog, EventSink};
use crate::domain::event::{Event, EventDraft};
use crate::domain::summary::Summary;
use crate::domain::window::WindowConfig;
use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[cfg(feature = "async")]
use crate::application::cleanup::{
    CleanupConfigError, CleanupHandle, CleanupScheduler, ShutdownError,
};
#[cfg(feature = "async")]
use crate::infrastructure::queued_writer::WriterHandle;

/// Endpoint families with separate limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointClass {
    /// Content generation, the stricter class
    Content,
    /// Conversation turns
    Conversation,
}

impl EndpointClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointClass::Content => "content",
            EndpointClass::Conversation => "conversation",
        }
    }
}

impl fmt::Display for EndpointClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An admitted request whose work is being metered.
///
/// Hand it back to [`Governor::complete`] exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "an admitted request should be completed so its event is recorded"]
pub struct MeteredRequest {
    class: EndpointClass,
    caller_key: String,
    started: Instant,
    remaining: usize,
    reset: Duration,
}

impl MeteredRequest {
    pub fn class(&self) -> EndpointClass {
        self.class
    }

    pub fn caller_key(&self) -> &str {
        &self.caller_key
    }

    /// When metering began.
    pub fn started(&self) -> Instant {
        self.started
    }

    /// Admissions left for this caller in the current window.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Time until the caller's oldest admission leaves the window.
    pub fn reset(&self) -> Duration {
        self.reset
    }
}

/// A request refused by its limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejected {
    class: EndpointClass,
    retry_after: Duration,
}

impl Rejected {
    pub fn class(&self) -> EndpointClass {
        self.class
    }

    /// Time until the next admission is likely to succeed.
    pub fn retry_after(&self) -> Duration {
        self.retry_after
    }

    pub fn retry_after_ms(&self) -> u64 {
        u64::try_from(self.retry_after.as_millis()).unwrap_or(u64::MAX)
    }

    /// Whole seconds, rounded up, for a `Retry-After` header.
    pub fn retry_after_secs(&self) -> u64 {
        self.retry_after_ms().div_ceil(1_000)
    }
}

impl fmt::Display for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "too many {} requests, retry in {} ms",
            self.class,
            self.retry_after_ms()
        )
    }
}

impl std::error::Error for Rejected {}

#[cfg(feature = "async")]
#[derive(Debug, Default)]
struct Background {
    writer: Option<WriterHandle>,
    cleanup: Option<CleanupHandle>,
}

/// Explicitly constructed service shared by request handlers.
///
/// Build one with [`Governor::new`] or, with defaults and validation,
/// through `Governor::builder()`.
pub struct Governor {
    content: SlidingWindowLimiter,
    conversation: SlidingWindowLimiter,
    sink: Arc<dyn EventSink>,
    aggregator: Aggregator<Arc<dyn EventLog>>,
    clock: Arc<dyn Clock>,
    metrics: Metrics,
    #[cfg(feature = "async")]
    background: Background,
}

impl Governor {
    /// Create a governor that appends straight to `log`.
    pub fn new(
        content: WindowConfig,
        conversation: WindowConfig,
        log: Arc<dyn EventLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let metrics = Metrics::new();
        let limiter = |config: WindowConfig, class: EndpointClass| {
            SlidingWindowLimiter::new(config, clock.clone())
                .with_metrics(metrics.clone())
                .with_label(class.as_str())
        };

        Self {
            content: limiter(content, EndpointClass::Content),
            conversation: limiter(conversation, EndpointClass::Conversation),
            sink: Arc::new(log.clone()),
            aggregator: Aggregator::new(log, clock.clone()),
            clock,
            metrics,
            #[cfg(feature = "async")]
            background: Background::default(),
        }
    }

    /// Route recorded events through `sink` instead of appending directly.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Check admission for `caller_key` on an endpoint of `class`.
    ///
    /// On success, metering starts now.
    pub fn admit(&self, class: EndpointClass, caller_key: &str) -> Result<MeteredRequest, Rejected> {
        let decision = self.limiter(class).check(caller_key);
        if !decision.allowed {
            return Err(Rejected {
                class,
                retry_after: decision.reset,
            });
        }

        Ok(MeteredRequest {
            class,
            caller_key: caller_key.to_owned(),
            started: self.clock.now(),
            remaining: decision.remaining,
            reset: decision.reset,
        })
    }

    /// Stamp `draft` with the completion time and the elapsed duration of
    /// `request`, then record it.
    pub fn complete(&self, request: MeteredRequest, draft: EventDraft) {
        let elapsed = self.clock.now().saturating_duration_since(request.started);
        let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.record(draft.finish(self.clock.wall_now(), duration_ms));
    }

    /// Hand a finished event to the log. Failures are logged and counted, never returned.
    pub fn record(&self, event: Event) {
        let kind = event.kind();
        let subject = event.subject();

        match self.sink.submit(event) {
            Ok(()) => self.metrics.record_event(),
            Err(err) => {
                self.metrics.record_dropped();
                warn!(error = %err, ?kind, %subject, "dropping telemetry event");
            }
        }
    }

    /// Remove idle windows from both limiters. Returns the number removed.
    pub fn cleanup(&self) -> usize {
        let removed = self.content.cleanup() + self.conversation.cleanup();
        debug!(removed, "governor cleanup finished");
        removed
    }

    /// Summary of the whole log as of now, in local time.
    pub fn summary(&self) -> Summary {
        self.aggregator.summarize()
    }

    /// Summary of the whole log as of `now`, in `now`'s time zone.
    pub fn summary_at<Tz>(&self, now: DateTime<Tz>) -> Summary
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        self.aggregator.summarize_at(now)
    }

    /// Raw events, newest first.
    pub fn events(&self, query: EventQuery) -> EventPage {
        self.aggregator.events(query)
    }

    pub fn limiter(&self, class: EndpointClass) -> &SlidingWindowLimiter {
        match class {
            EndpointClass::Content => &self.content,
            EndpointClass::Conversation => &self.conversation,
        }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn aggregator(&self) -> &Aggregator<Arc<dyn EventLog>> {
        &self.aggregator
    }

    /// Start periodic cleanup of both limiters on the current tokio runtime.
    ///
    /// **Requires the `async` feature.**
    #[cfg(feature = "async")]
    pub fn start_cleanup(&self, interval: Duration) -> Result<CleanupHandle, CleanupConfigError> {
        Ok(CleanupScheduler::new(interval)?
            .with_limiter(self.content.clone())
            .with_limiter(self.conversation.clone())
            .start())
    }

    #[cfg(feature = "async")]
    pub(crate) fn attach_writer(&mut self, handle: WriterHandle) {
        self.background.writer = Some(handle);
    }

    #[cfg(feature = "async")]
    pub(crate) fn attach_cleanup(&mut self, handle: CleanupHandle) {
        self.background.cleanup = Some(handle);
    }

    /// Stop background tasks started by the builder and flush queued events.
    ///
    /// Queued events are written before this resolves, provided no other
    /// clone of the writer queue is still alive.
    ///
    /// **Requires the `async` feature.**
    #[cfg(feature = "async")]
    pub async fn shutdown(self) -> Result<(), ShutdownError> {
        let Governor {
            sink, background, ..
        } = self;

        if let Some(cleanup) = background.cleanup {
            cleanup.shutdown().await?;
        }
        drop(sink);
        if let Some(writer) = background.writer {
            writer.join().await?;
        }
        Ok(())
    }
}

impl fmt::Debug for Governor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Governor")
            .field("content", self.content.config())
            .field("conversation", self.conversation.config())
            .field("sink", &self.sink)
            .field("metrics", &self.metrics.snapshot())
            .finish_non_exhaustive()
    }
}
