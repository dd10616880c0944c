//! Error types for the offline queue.
//!
//! Storage failures are never swallowed: every `PersistenceError` reaches the
//! caller of the method that triggered it, so the UI can report a change as
//! "not saved" instead of silently dropping it.

use thiserror::Error;

use crate::queue::OperationState;

/// Result type alias using the crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Failure of the underlying key-value persistence primitive.
#[derive(Debug, Error)]
pub enum PersistenceError {
  /// The backend could not read or write (I/O, quota, lock poisoned).
  #[error("storage backend error: {message}")]
  Backend { message: String },

  /// A stored value exists but is not valid JSON for the expected shape.
  #[error("corrupt data under key '{key}': {source}")]
  Corrupt {
    key: String,
    #[source]
    source: serde_json::Error,
  },

  /// A value could not be serialized before writing.
  #[error("failed to encode value: {source}")]
  Encode {
    #[source]
    source: serde_json::Error,
  },
}

impl PersistenceError {
  pub fn backend(message: impl Into<String>) -> Self {
    Self::Backend {
      message: message.into(),
    }
  }
}

impl From<rusqlite::Error> for PersistenceError {
  fn from(err: rusqlite::Error) -> Self {
    Self::backend(err.to_string())
  }
}

/// The error type for queue and cache operations.
#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Persistence(#[from] PersistenceError),

  /// Caller supplied an argument the queue refuses to store.
  #[error("invalid input: {message}")]
  InvalidInput { message: String },

  /// A state transition named an operation that is not queued.
  #[error("operation {id} is not queued")]
  NotQueued { id: String },

  /// A state transition that the operation lifecycle does not allow.
  #[error("operation {id} cannot move from {from} to {to}")]
  InvalidTransition {
    id: String,
    from: OperationState,
    to: OperationState,
  },
}

/// Failure reported by a [`RemoteApplier`](crate::replay::RemoteApplier).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApplyError {
  /// The remote could not be reached or answered with a retryable failure.
  #[error("remote unavailable: {0}")]
  Unavailable(String),

  /// The remote refused the operation; retrying will not help.
  #[error("rejected by remote: {0}")]
  Rejected(String),
}

impl ApplyError {
  /// Whether the replay driver should stop retrying this operation.
  pub fn is_permanent(&self) -> bool {
    matches!(self, Self::Rejected(_))
  }
}
