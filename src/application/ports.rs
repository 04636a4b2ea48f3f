//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the application
//! layer needs. Infrastructure adapters implement these ports.

use crate::domain::event::Event;
use chrono::{DateTime, Utc};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Port for obtaining current time.
///
/// This abstraction allows the application layer to work with time
/// without depending on system clock implementation details.
/// Infrastructure provides concrete implementations (SystemClock, MockClock).
pub trait Clock: Send + Sync + Debug {
    /// Get the current monotonic instant, used for window arithmetic.
    fn now(&self) -> Instant;

    /// Get the current wall-clock time, used to stamp and bucket events.
    fn wall_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Port for concurrent key-value storage.
///
/// This abstraction allows the application layer to store and retrieve values
/// without depending on specific concurrent data structure implementations.
/// Infrastructure provides concrete implementations (ShardedStorage).
pub trait Storage<K, V>: Send + Sync + Debug
where
    K: Hash + Eq + Clone + Send + Sync,
    V: Send + Sync,
{
    /// Access an entry with mutable access, creating it if necessary.
    ///
    /// The entry stays locked for the duration of `accessor`, so concurrent
    /// accesses to the same key are serialized.
    ///
    /// # Arguments
    /// * `key` - The key to look up
    /// * `factory` - Function to create a new value if the key doesn't exist
    /// * `accessor` - Function that gets mutable access to the value
    ///
    /// # Returns
    /// The result from the accessor function
    fn with_entry_mut<F, R>(&self, key: K, factory: impl FnOnce() -> V, accessor: F) -> R
    where
        F: FnOnce(&mut V) -> R;

    /// Get the number of entries in the storage.
    fn len(&self) -> usize;

    /// Check if the storage is empty.
    fn is_empty(&self) -> bool;

    /// Clear all entries from the storage.
    fn clear(&self);

    /// Iterate over all entries, providing access to both key and value.
    fn for_each<F>(&self, f: F)
    where
        F: FnMut(&K, &V);

    /// Remove entries for which the predicate returns false.
    fn retain<F>(&self, f: F)
    where
        F: FnMut(&K, &mut V) -> bool;
}

/// Errors raised by event log adapters.
#[derive(Debug, Error)]
pub enum EventLogError {
    /// The backing file could not be opened, read, or written
    #[error("event log i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// The event could not be encoded as a record
    #[error("event encoding error: {0}")]
    Encode(#[from] serde_json::Error),
    /// The writer queue is at capacity
    #[error("event queue is full")]
    QueueFull,
    /// The writer task has stopped
    #[error("event queue is closed")]
    QueueClosed,
    /// The storage refused the operation
    #[error("event log unavailable: {0}")]
    Unavailable(String),
}

/// Port for the append-only event log.
///
/// Records are never updated or deleted. Reads return events in append order
/// and skip records that cannot be decoded.
pub trait EventLog: Send + Sync + Debug {
    /// Add one event at the end of the log.
    fn append(&self, event: &Event) -> Result<(), EventLogError>;

    /// All readable events, oldest first.
    fn read_all(&self) -> Result<Vec<Event>, EventLogError>;

    /// Events with `timestamp >= since`, oldest first.
    fn read_since(&self, since: DateTime<Utc>) -> Result<Vec<Event>, EventLogError> {
        let mut events = self.read_all()?;
        events.retain(|event| event.timestamp() >= since);
        Ok(events)
    }
}

impl<L> EventLog for Arc<L>
where
    L: EventLog + ?Sized,
{
    fn append(&self, event: &Event) -> Result<(), EventLogError> {
        (**self).append(event)
    }

    fn read_all(&self) -> Result<Vec<Event>, EventLogError> {
        (**self).read_all()
    }

    fn read_since(&self, since: DateTime<Utc>) -> Result<Vec<Event>, EventLogError> {
        (**self).read_since(since)
    }
}

/// Port through which completed requests hand their events over.
///
/// A sink either persists the event right away or queues it for a writer.
/// Errors are reported back so the caller can log them; they must never be
/// surfaced to the request that produced the event.
pub trait EventSink: Send + Sync + Debug {
    fn submit(&self, event: Event) -> Result<(), EventLogError>;
}

/// Writing straight through to a shared log.
impl<L> EventSink for Arc<L>
where
    L: EventLog + ?Sized,
{
    fn submit(&self, event: Event) -> Result<(), EventLogError> {
        self.append(&event)
    }
}
