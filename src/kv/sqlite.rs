//! SQLite-backed key-value store.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::KeyValueStore;
use crate::error::PersistenceError;

/// Schema for the key-value table.
const KV_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// Durable store keeping every key as one row in a SQLite table.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open the store at the default location.
  pub fn open() -> Result<Self, PersistenceError> {
    let path = Self::default_path()?;
    Self::open_at(&path)
  }

  /// Open or create the store at `path`.
  pub fn open_at(path: &Path) -> Result<Self, PersistenceError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).map_err(|e| {
        PersistenceError::backend(format!("Failed to create store directory: {}", e))
      })?;
    }

    let conn = Connection::open(path).map_err(|e| {
      PersistenceError::backend(format!(
        "Failed to open store at {}: {}",
        path.display(),
        e
      ))
    })?;

    debug!(path = %path.display(), "opened sqlite store");
    Self::with_connection(conn)
  }

  /// Open a store that lives only as long as this value.
  pub fn open_in_memory() -> Result<Self, PersistenceError> {
    let conn = Connection::open_in_memory()?;
    Self::with_connection(conn)
  }

  /// Get the default store path.
  pub fn default_path() -> Result<PathBuf, PersistenceError> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| PersistenceError::backend("Could not determine data directory"))?;

    Ok(data_dir.join("offq").join("store.db"))
  }

  fn with_connection(conn: Connection) -> Result<Self, PersistenceError> {
    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;
    Ok(store)
  }

  fn run_migrations(&self) -> Result<(), PersistenceError> {
    self
      .lock()?
      .execute_batch(KV_SCHEMA)
      .map_err(|e| PersistenceError::backend(format!("Failed to run migrations: {}", e)))
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, PersistenceError> {
    self
      .conn
      .lock()
      .map_err(|e| PersistenceError::backend(format!("Lock poisoned: {}", e)))
  }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
  async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
    let conn = self.lock()?;
    let value = conn
      .query_row(
        "SELECT value FROM kv_store WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| PersistenceError::backend(format!("Failed to read '{}': {}", key, e)))?;

    Ok(value)
  }

  async fn set(&self, key: &str, value: String) -> Result<(), PersistenceError> {
    let conn = self.lock()?;
    conn
      .execute(
        "INSERT OR REPLACE INTO kv_store (key, value, updated_at)
         VALUES (?, ?, datetime('now'))",
        params![key, value],
      )
      .map_err(|e| PersistenceError::backend(format!("Failed to write '{}': {}", key, e)))?;

    Ok(())
  }

  async fn remove(&self, key: &str) -> Result<(), PersistenceError> {
    let conn = self.lock()?;
    conn
      .execute("DELETE FROM kv_store WHERE key = ?", params![key])
      .map_err(|e| PersistenceError::backend(format!("Failed to delete '{}': {}", key, e)))?;

    Ok(())
  }
}
