//! Offline operation queue.
//!
//! Mutations that cannot reach the remote API right away are queued here in
//! FIFO order and replayed later by [`crate::replay::ReplayDriver`].

mod operation;
mod store;

pub use operation::{Operation, OperationKind, OperationState};
pub use store::{OfflineQueueStore, QueueStats, CACHE_KEY, QUEUE_KEY};
