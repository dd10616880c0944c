//! offq - offline operation queue for the donor app.
//!
//! Mutations that cannot reach the remote API are queued durably in FIFO
//! order and replayed once connectivity returns; fetched responses are kept
//! in a key-value cache so reads keep working offline. Both live on top of a
//! pluggable async [`KeyValueStore`].

pub mod cache;
pub mod config;
pub mod error;
pub mod kv;
pub mod queue;
pub mod replay;

pub use error::{ApplyError, Error, PersistenceError, Result};
pub use kv::{KeyValueStore, MemoryStore, SqliteStore};
pub use queue::{OfflineQueueStore, Operation, OperationKind, OperationState, QueueStats};
pub use replay::{RemoteApplier, ReplayConfig, ReplayDriver, ReplayReport};
