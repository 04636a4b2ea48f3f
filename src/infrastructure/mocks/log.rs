//! Event log that can be switched into a failing state.

use crate::application::ports::{EventLog, EventLogError};
use crate::domain::event::Event;
use crate::infrastructure::memory_log::MemoryEventLog;
use std::sync::atomic::{AtomicBool, Ordering};

/// In-memory log whose reads and writes fail while `set_failing(true)` is in effect.
#[derive(Debug, Default)]
pub struct FailingEventLog {
    inner: MemoryEventLog,
    failing: AtomicBool,
}

impl FailingEventLog {
    /// A log that starts out failing.
    pub fn new() -> Self {
        let log = Self::default();
        log.set_failing(true);
        log
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Events that made it into the log while it was healthy.
    pub fn stored(&self) -> Vec<Event> {
        self.inner.snapshot()
    }

    fn check(&self) -> Result<(), EventLogError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(EventLogError::Unavailable("storage offline".to_string()))
        } else {
            Ok(())
        }
    }
}

impl EventLog for FailingEventLog {
    fn append(&self, event: &Event) -> Result<(), EventLogError> {
        self.check()?;
        self.inner.append(event)
    }

    fn read_all(&self) -> Result<Vec<Event>, EventLogError> {
        self.check()?;
        self.inner.read_all()
    }
}
