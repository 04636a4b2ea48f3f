//! # inference-governor
//!
//! Sliding-window admission control and append-only request telemetry for
//! inference endpoints.
//!
//! A [`Governor`] sits between request handlers and paid inference calls:
//! it admits or rejects each request per caller, records one event per
//! completed request in an append-only JSONL log, and computes operational
//! summaries from that log on demand.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use inference_governor::{caller_key, EndpointClass, EventDraft, Governor, SubjectId};
//! use std::time::Duration;
//!
//! let governor = Governor::builder()
//!     .with_content_limit(Duration::from_secs(60), 10)
//!     .with_conversation_limit(Duration::from_secs(60), 20)
//!     .with_event_log_path(".data/telemetry.jsonl")
//!     .build()
//!     .unwrap();
//!
//! let caller = caller_key(Some("203.0.113.7, 10.0.0.1"), None);
//! match governor.admit(EndpointClass::Content, &caller) {
//!     Ok(request) => {
//!         // ... run the metered work ...
//!         let draft = EventDraft::content_fetch(SubjectId::new(2, 47), &caller, "model-a")
//!             .usage(Some(812), Some(1_904));
//!         governor.complete(request, draft);
//!     }
//!     Err(rejected) => {
//!         // Respond 429 with `Retry-After: rejected.retry_after_secs()`.
//!         eprintln!("{rejected}");
//!     }
//! }
//!
//! let summary = governor.summary();
//! println!("{}", summary.format_message());
//! ```
//!
//! ## Admission
//!
//! Each endpoint class ([`EndpointClass::Content`],
//! [`EndpointClass::Conversation`]) has its own [`SlidingWindowLimiter`].
//! A limiter keeps, per caller key, the instants of the admissions made
//! during the trailing window. A check drops instants that have left the
//! window, then admits if fewer than `max_requests` remain:
//!
//! ```rust
//! use inference_governor::{SlidingWindowLimiter, SystemClock, WindowConfig};
//! use std::sync::Arc;
//!
//! let config = WindowConfig::from_millis(1_000, 2).unwrap();
//! let limiter = SlidingWindowLimiter::new(config, Arc::new(SystemClock::new()));
//!
//! assert_eq!(limiter.check("a").remaining, 1);
//! assert_eq!(limiter.check("a").remaining, 0);
//!
//! let rejected = limiter.check("a");
//! assert!(!rejected.allowed);
//! assert!(rejected.reset_ms() <= 1_000);
//! ```
//!
//! Different keys never contend: windows live in a sharded concurrent map.
//! Windows are pruned lazily; call [`Governor::cleanup`] or enable a
//! periodic pass with `with_cleanup_interval` to forget idle callers.
//!
//! ## Telemetry
//!
//! [`Governor::complete`] stamps the event with the completion time and the
//! duration since admission, then hands it to the log. Write failures are
//! logged at `warn` and counted in [`Metrics`]; they never reach the
//! request. With `with_queue_capacity`, events go through a bounded queue to
//! a single writer task instead of being written inline.
//!
//! The log is one JSON object per line. Unparseable lines (for example a
//! record torn by a crash) are skipped on read, and the next append starts
//! on a fresh line.
//!
//! ## Summaries
//!
//! [`Governor::summary`] rereads the whole log and returns a [`Summary`]:
//! totals, today's usage per kind, cache hit rate, a 24-bucket hourly
//! histogram, the most requested subjects, and the latest events. An
//! unreadable log produces a zeroed summary.
//!
//! ## Observability
//!
//! ```rust
//! # use inference_governor::{Governor, MemoryEventLog};
//! # use std::sync::Arc;
//! # let governor = Governor::builder()
//! #     .with_event_log(Arc::new(MemoryEventLog::new()))
//! #     .build()
//! #     .unwrap();
//! let snapshot = governor.metrics().snapshot();
//! println!(
//!     "admitted={} rejected={} dropped={} rejection_rate={:.1}%",
//!     snapshot.admitted,
//!     snapshot.rejected,
//!     snapshot.events_dropped,
//!     snapshot.rejection_rate() * 100.0
//! );
//! ```
//!
//! ## Feature Flags
//!
//! - `async` (default): queued writer and periodic cleanup on tokio
//! - `test-helpers`: mock clock, failing event log, and capturing tracing layer

// Domain layer - pure business logic
pub mod domain;

// Application layer - orchestration
pub mod application;

// Infrastructure layer - external adapters
pub mod infrastructure;

// Re-export commonly used types for convenience
pub use domain::{
    event::{Event, EventDraft, EventKind, Outcome, SubjectId, CACHE_SOURCE},
    identity::{caller_key, UNKNOWN_CALLER},
    summary::{HourBucket, SubjectCount, Summary},
    window::{AdmissionDecision, RateWindow, WindowConfig, WindowConfigError},
};

pub use application::{
    aggregator::{summarize_events, Aggregator, EventPage, EventQuery},
    governor::{EndpointClass, Governor, MeteredRequest, Rejected},
    limiter::SlidingWindowLimiter,
    metrics::{Metrics, MetricsSnapshot},
    ports::{Clock, EventLog, EventLogError, EventSink, Storage},
    registry::WindowRegistry,
};

#[cfg(feature = "async")]
pub use application::cleanup::{CleanupConfigError, CleanupHandle, CleanupScheduler, ShutdownError};

pub use infrastructure::{
    builder::{BuildError, GovernorBuilder, GovernorConfig, LimitSettings},
    clock::SystemClock,
    event_log::{JsonlEventLog, DEFAULT_LOG_PATH},
    memory_log::MemoryEventLog,
    storage::ShardedStorage,
};

#[cfg(feature = "async")]
pub use infrastructure::queued_writer::{QueuedEventWriter, WriterHandle};
