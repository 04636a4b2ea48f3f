//! Single-writer telemetry queue.
//!
//! Request handlers hand events to a bounded channel and return at once. One
//! blocking task owns the log and appends events in the order they were
//! queued. When the queue is full the event is refused rather than making
//! the request wait.

use crate::application::cleanup::ShutdownError;
use crate::application::metrics::Metrics;
use crate::application::ports::{EventLog, EventLogError, EventSink};
use crate::domain::event::Event;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Queue capacity used when none is configured.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1_024;

/// Sending side of the writer queue. Clones share the same queue.
#[derive(Debug, Clone)]
pub struct QueuedEventWriter {
    tx: mpsc::Sender<Event>,
}

/// Handle to the background writer task.
#[derive(Debug)]
pub struct WriterHandle {
    task: JoinHandle<()>,
}

impl QueuedEventWriter {
    /// Start the writer task on the current tokio runtime.
    ///
    /// A `capacity` of zero is treated as one. Failed appends are logged and
    /// counted as dropped in `metrics`.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn spawn(
        log: Arc<dyn EventLog>,
        capacity: usize,
        metrics: Metrics,
    ) -> (Self, WriterHandle) {
        let (tx, mut rx) = mpsc::channel::<Event>(capacity.max(1));

        let task = tokio::task::spawn_blocking(move || {
            while let Some(event) = rx.blocking_recv() {
                if let Err(err) = log.append(&event) {
                    metrics.record_dropped();
                    warn!(
                        error = %err,
                        kind = ?event.kind(),
                        caller = event.caller_key(),
                        "dropping telemetry event"
                    );
                }
            }
            debug!("telemetry writer stopped");
        });

        (Self { tx }, WriterHandle { task })
    }

    /// Room left in the queue.
    pub fn available(&self) -> usize {
        self.tx.capacity()
    }
}

impl EventSink for QueuedEventWriter {
    fn submit(&self, event: Event) -> Result<(), EventLogError> {
        self.tx.try_send(event).map_err(|err| match err {
            TrySendError::Full(_) => EventLogError::QueueFull,
            TrySendError::Closed(_) => EventLogError::QueueClosed,
        })
    }
}

impl WriterHandle {
    /// Wait for the writer to drain the queue and stop.
    ///
    /// Resolves once every [`QueuedEventWriter`] clone has been dropped and
    /// all queued events have been appended.
    pub async fn join(self) -> Result<(), ShutdownError> {
        self.task.await.map_err(ShutdownError::from)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
