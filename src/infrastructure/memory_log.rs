//! In-memory event log.
//!
//! Useful for tests, benchmarks, and deployments that only need summaries
//! for the lifetime of the process.

use crate::application::ports::{EventLog, EventLogError};
use crate::domain::event::Event;
use std::sync::{PoisonError, RwLock};

/// Event log held in a vector behind a read-write lock.
#[derive(Debug, Default)]
pub struct MemoryEventLog {
    events: RwLock<Vec<Event>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A log pre-populated with `events`, in order.
    pub fn with_events(events: impl IntoIterator<Item = Event>) -> Self {
        Self {
            events: RwLock::new(events.into_iter().collect()),
        }
    }

    /// Copy of every stored event.
    pub fn snapshot(&self) -> Vec<Event> {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventLog for MemoryEventLog {
    fn append(&self, event: &Event) -> Result<(), EventLogError> {
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<Event>, EventLogError> {
        Ok(self.snapshot())
    }
}
