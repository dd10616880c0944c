//! Replay of queued operations against the remote API.
//!
//! The driver owns ordering, state transitions, backoff and the retry limit.
//! Talking to the remote is left to a [`RemoteApplier`] supplied by the app.

mod backoff;
mod driver;

pub use backoff::Backoff;
pub use driver::{
  OperationReport, RemoteApplier, ReplayConfig, ReplayDriver, ReplayOutcome, ReplayReport,
  SkipReason,
};
