//! Key-value persistence primitive the queue is layered on.
//!
//! The queue only ever needs whole-value `get`/`set`/`remove` on string keys.
//! Backends make no transactional promises; callers that read, modify and
//! write back must serialize those cycles themselves.

mod memory;
mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::PersistenceError;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// An async string key-value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
  /// Read the value stored under `key`, if any.
  async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;

  /// Store `value` under `key`, replacing any previous value.
  async fn set(&self, key: &str, value: String) -> Result<(), PersistenceError>;

  /// Delete `key`. Deleting a missing key is not an error.
  async fn remove(&self, key: &str) -> Result<(), PersistenceError>;
}

#[async_trait]
impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
  async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
    (**self).get(key).await
  }

  async fn set(&self, key: &str, value: String) -> Result<(), PersistenceError> {
    (**self).set(key, value).await
  }

  async fn remove(&self, key: &str) -> Result<(), PersistenceError> {
    (**self).remove(key).await
  }
}
