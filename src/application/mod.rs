//! Application layer - orchestration of domain logic.
//!
//! This layer coordinates the domain logic and manages runtime behavior:
//! - Window registry (per-key admission state)
//! - Sliding-window limiter (admission decisions)
//! - Aggregator (summaries over the event log)
//! - Governor (the facade request handlers call)
//! - Cleanup scheduler (periodic removal of idle windows)
//!
//! ## Ports
//!
//! The application layer defines ports (traits) that infrastructure
//! adapters must implement. This keeps the application layer independent
//! from infrastructure details.

pub mod aggregator;
#[cfg(feature = "async")]
pub mod cleanup;
pub mod governor;
pub mod limiter;
pub mod metrics;
pub mod ports;
pub mod registry;
