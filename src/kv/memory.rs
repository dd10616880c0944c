//! In-process key-value store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::KeyValueStore;
use crate::error::PersistenceError;

/// Volatile store backed by a `HashMap`.
///
/// Useful for tests and for sessions that never need to survive a restart.
/// Can be flipped read-only to simulate a backend that rejects writes.
#[derive(Debug, Default)]
pub struct MemoryStore {
  entries: Mutex<HashMap<String, String>>,
  read_only: AtomicBool,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Reject every `set` and `remove` while `read_only` is true.
  pub fn set_read_only(&self, read_only: bool) {
    self.read_only.store(read_only, Ordering::SeqCst);
  }

  /// Number of keys currently stored.
  ///
  /// A poisoned lock still holds a complete map, since no write leaves it
  /// half-updated, so the count is read through the poison.
  pub fn len(&self) -> usize {
    self
      .entries
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn check_writable(&self) -> Result<(), PersistenceError> {
    if self.read_only.load(Ordering::SeqCst) {
      return Err(PersistenceError::backend("store is read-only"));
    }
    Ok(())
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, PersistenceError> {
    self
      .entries
      .lock()
      .map_err(|e| PersistenceError::backend(format!("Lock poisoned: {}", e)))
  }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
  async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
    Ok(self.lock()?.get(key).cloned())
  }

  async fn set(&self, key: &str, value: String) -> Result<(), PersistenceError> {
    self.check_writable()?;
    self.lock()?.insert(key.to_string(), value);
    Ok(())
  }

  async fn remove(&self, key: &str) -> Result<(), PersistenceError> {
    self.check_writable()?;
    self.lock()?.remove(key);
    Ok(())
  }
}
