//! Domain layer - pure types and algorithms with no I/O.
//!
//! - Sliding admission windows and their configuration
//! - Telemetry events and the drafts they are built from
//! - Derived summaries
//! - Caller identity derivation
//!
//! All types in this layer are pure and easily testable.

pub mod event;
pub mod identity;
pub mod summary;
pub mod window;
