//! Mock implementations for testing.
//!
//! Test doubles for infrastructure adapters: a controllable clock, a
//! tracing layer that captures emitted events, and an event log that can be
//! told to fail.

pub mod clock;
pub mod layer;
pub mod log;

pub use clock::MockClock;
pub use layer::{CapturedEvent, MockCaptureLayer};
pub use log::FailingEventLog;
