//! Durable queue and response cache over a key-value store.
//!
//! The whole queue lives under one key and the whole cache under another, so
//! every mutation is a read-modify-write of a full JSON document. A single
//! async mutex per store serializes those cycles; two stores sharing one
//! backend are not coordinated. A second mutex keeps replay passes over the
//! same store from overlapping.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::operation::{Operation, OperationKind, OperationState};
use crate::error::{Error, PersistenceError, Result};
use crate::kv::KeyValueStore;

/// Storage key holding the JSON array of queued operations.
pub const QUEUE_KEY: &str = "offq.queue";
/// Storage key holding the JSON object of cached responses.
pub const CACHE_KEY: &str = "offq.cache";

const INTERRUPTED: &str = "interrupted";

/// Queue statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
  pub pending: usize,
  pub syncing: usize,
  pub failed: usize,
  pub exhausted: usize,
  /// Enqueue time of the oldest operation still pending
  pub oldest_pending: Option<DateTime<Utc>>,
}

impl QueueStats {
  pub fn total(&self) -> usize {
    self.pending + self.syncing + self.failed + self.exhausted
  }
}

/// Ordered queue of pending mutations plus a keyed response cache.
pub struct OfflineQueueStore<S: KeyValueStore> {
  storage: S,
  gate: Mutex<()>,
  replay: Mutex<()>,
}

impl<S: KeyValueStore> OfflineQueueStore<S> {
  pub fn new(storage: S) -> Self {
    Self {
      storage,
      gate: Mutex::new(()),
      replay: Mutex::new(()),
    }
  }

  /// The backing key-value store.
  pub fn storage(&self) -> &S {
    &self.storage
  }

  // ==========================================================================
  // Queue
  // ==========================================================================

  /// Append a new pending operation and return it with its generated id.
  ///
  /// # Errors
  ///
  /// `InvalidInput` for a blank target; `Persistence` if the queue cannot be
  /// read or written. On error the queue is left as it was.
  #[instrument(skip(self, payload))]
  pub async fn enqueue(&self, kind: OperationKind, target: &str, payload: Value) -> Result<Operation> {
    if target.trim().is_empty() {
      return Err(Error::InvalidInput {
        message: "operation target must not be empty".to_string(),
      });
    }

    let _guard = self.gate.lock().await;
    let mut queue = self.load_queue().await?;

    let id = loop {
      let candidate = Uuid::new_v4().to_string();
      if !queue.iter().any(|op| op.id == candidate) {
        break candidate;
      }
    };

    let operation = Operation::new(id, kind, target.to_string(), payload);
    queue.push(operation.clone());
    self.save_queue(&queue).await?;

    debug!(id = %operation.id, queued = queue.len(), "enqueued operation");
    Ok(operation)
  }

  /// All queued operations in insertion order, whatever their state.
  pub async fn list_pending(&self) -> Result<Vec<Operation>> {
    let _guard = self.gate.lock().await;
    self.load_queue().await
  }

  /// Queued operations in `state`, in insertion order.
  pub async fn list_by_state(&self, state: OperationState) -> Result<Vec<Operation>> {
    let _guard = self.gate.lock().await;
    let queue = self.load_queue().await?;
    Ok(queue.into_iter().filter(|op| op.state == state).collect())
  }

  /// Look up a single operation.
  pub async fn get(&self, id: &str) -> Result<Option<Operation>> {
    let _guard = self.gate.lock().await;
    let queue = self.load_queue().await?;
    Ok(queue.into_iter().find(|op| op.id == id))
  }

  /// Remove the operation with `id`.
  ///
  /// Returns whether anything was removed. Unknown ids are a no-op and do
  /// not touch storage.
  #[instrument(skip(self))]
  pub async fn remove(&self, id: &str) -> Result<bool> {
    let _guard = self.gate.lock().await;
    let mut queue = self.load_queue().await?;

    let before = queue.len();
    queue.retain(|op| op.id != id);
    if queue.len() == before {
      return Ok(false);
    }

    self.save_queue(&queue).await?;
    debug!(id, remaining = queue.len(), "removed operation");
    Ok(true)
  }

  /// Drop every queued operation.
  #[instrument(skip(self))]
  pub async fn clear(&self) -> Result<()> {
    let _guard = self.gate.lock().await;
    self.storage.remove(QUEUE_KEY).await?;
    warn!("offline queue cleared");
    Ok(())
  }

  /// Number of operations in the `PENDING` state.
  pub async fn count_pending(&self) -> Result<usize> {
    let _guard = self.gate.lock().await;
    let queue = self.load_queue().await?;
    Ok(queue.iter().filter(|op| op.is_pending()).count())
  }

  /// Per-state counts.
  pub async fn stats(&self) -> Result<QueueStats> {
    let _guard = self.gate.lock().await;
    let queue = self.load_queue().await?;

    let mut stats = QueueStats::default();
    for op in &queue {
      match op.state {
        OperationState::Pending => {
          stats.pending += 1;
          if stats.oldest_pending.map_or(true, |t| op.enqueued_at < t) {
            stats.oldest_pending = Some(op.enqueued_at);
          }
        }
        OperationState::Syncing => stats.syncing += 1,
        OperationState::Failed => stats.failed += 1,
        OperationState::Exhausted => stats.exhausted += 1,
      }
    }

    Ok(stats)
  }

  /// Mark an operation as being replayed.
  ///
  /// Allowed from `PENDING` and `FAILED`.
  #[instrument(skip(self))]
  pub async fn begin_sync(&self, id: &str) -> Result<Operation> {
    self
      .transition(id, OperationState::Syncing, |op| {
        op.last_attempt_at = Some(Utc::now());
      })
      .await
  }

  /// Record a failed replay attempt that may be retried.
  #[instrument(skip(self))]
  pub async fn mark_failed(&self, id: &str, error: &str) -> Result<Operation> {
    let error = error.to_string();
    self
      .transition(id, OperationState::Failed, move |op| {
        op.retry_count = op.retry_count.saturating_add(1);
        op.last_error = Some(error);
      })
      .await
  }

  /// Record a failed replay attempt after which no retry will be made.
  #[instrument(skip(self))]
  pub async fn mark_exhausted(&self, id: &str, error: &str) -> Result<Operation> {
    let error = error.to_string();
    self
      .transition(id, OperationState::Exhausted, move |op| {
        op.retry_count = op.retry_count.saturating_add(1);
        op.last_error = Some(error);
      })
      .await
  }

  /// Turn operations stuck in `SYNCING` (for example after a crash mid
  /// replay) into failed attempts so they become retryable.
  ///
  /// Waits for any replay pass over this store to finish first, so only
  /// attempts that are really abandoned get recovered. Returns the number of
  /// operations recovered.
  #[instrument(skip(self))]
  pub async fn recover_interrupted(&self) -> Result<usize> {
    let _replay = self.lock_replay().await;
    self.fail_syncing().await
  }

  /// Exclusive right to replay this store. Held for a whole pass; while it
  /// is held, no other attempt on this store is in flight.
  pub(crate) async fn lock_replay(&self) -> MutexGuard<'_, ()> {
    self.replay.lock().await
  }

  /// Fail every `SYNCING` operation. Callers must hold [`Self::lock_replay`].
  pub(crate) async fn fail_syncing(&self) -> Result<usize> {
    let _guard = self.gate.lock().await;
    let mut queue = self.load_queue().await?;

    let mut recovered = 0;
    for op in queue
      .iter_mut()
      .filter(|op| op.state == OperationState::Syncing)
    {
      op.state = OperationState::Failed;
      op.retry_count = op.retry_count.saturating_add(1);
      op.last_error = Some(INTERRUPTED.to_string());
      recovered += 1;
    }

    if recovered > 0 {
      self.save_queue(&queue).await?;
      warn!(recovered, "recovered interrupted operations");
    }
    Ok(recovered)
  }

  async fn transition<F>(&self, id: &str, to: OperationState, update: F) -> Result<Operation>
  where
    F: FnOnce(&mut Operation) + Send,
  {
    let _guard = self.gate.lock().await;
    let mut queue = self.load_queue().await?;

    let op = queue
      .iter_mut()
      .find(|op| op.id == id)
      .ok_or_else(|| Error::NotQueued { id: id.to_string() })?;

    if !op.state.can_transition_to(to) {
      return Err(Error::InvalidTransition {
        id: id.to_string(),
        from: op.state,
        to,
      });
    }

    let from = op.state;
    op.state = to;
    update(op);
    let updated = op.clone();

    self.save_queue(&queue).await?;
    debug!(id, %from, %to, retry_count = updated.retry_count, "operation transitioned");
    Ok(updated)
  }

  async fn load_queue(&self) -> Result<Vec<Operation>> {
    match self.storage.get(QUEUE_KEY).await? {
      Some(raw) => serde_json::from_str(&raw).map_err(|source| {
        Error::from(PersistenceError::Corrupt {
          key: QUEUE_KEY.to_string(),
          source,
        })
      }),
      None => Ok(Vec::new()),
    }
  }

  async fn save_queue(&self, queue: &[Operation]) -> Result<()> {
    let raw =
      serde_json::to_string(queue).map_err(|source| PersistenceError::Encode { source })?;
    self.storage.set(QUEUE_KEY, raw).await?;
    Ok(())
  }

  // ==========================================================================
  // Cache
  // ==========================================================================

  /// Store `value` under `key`, replacing any previous value.
  #[instrument(skip(self, value))]
  pub async fn cache_put(&self, key: &str, value: Value) -> Result<()> {
    let _guard = self.gate.lock().await;
    let mut cache = self.load_cache().await?;
    cache.insert(key.to_string(), value);
    self.save_cache(&cache).await?;
    debug!(key, entries = cache.len(), "cached value");
    Ok(())
  }

  /// Read the cached value for `key`; `None` when it was never written.
  pub async fn cache_get(&self, key: &str) -> Result<Option<Value>> {
    let _guard = self.gate.lock().await;
    let mut cache = self.load_cache().await?;
    Ok(cache.remove(key))
  }

  /// Read the cached value for `key` as `T`.
  ///
  /// # Errors
  ///
  /// `Persistence` with `Corrupt` if the stored value does not fit `T`.
  pub async fn cache_get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
    match self.cache_get(key).await? {
      Some(value) => serde_json::from_value(value).map(Some).map_err(|source| {
        Error::from(PersistenceError::Corrupt {
          key: format!("{}/{}", CACHE_KEY, key),
          source,
        })
      }),
      None => Ok(None),
    }
  }

  /// Forget the cached value for `key`. Returns whether one existed.
  #[instrument(skip(self))]
  pub async fn cache_remove(&self, key: &str) -> Result<bool> {
    let _guard = self.gate.lock().await;
    let mut cache = self.load_cache().await?;
    if cache.remove(key).is_none() {
      return Ok(false);
    }
    self.save_cache(&cache).await?;
    Ok(true)
  }

  /// Drop every cached value.
  #[instrument(skip(self))]
  pub async fn cache_clear(&self) -> Result<()> {
    let _guard = self.gate.lock().await;
    self.storage.remove(CACHE_KEY).await?;
    Ok(())
  }

  async fn load_cache(&self) -> Result<Map<String, Value>> {
    match self.storage.get(CACHE_KEY).await? {
      Some(raw) => serde_json::from_str(&raw).map_err(|source| {
        Error::from(PersistenceError::Corrupt {
          key: CACHE_KEY.to_string(),
          source,
        })
      }),
      None => Ok(Map::new()),
    }
  }

  async fn save_cache(&self, cache: &Map<String, Value>) -> Result<()> {
    let raw =
      serde_json::to_string(cache).map_err(|source| PersistenceError::Encode { source })?;
    self.storage.set(CACHE_KEY, raw).await?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::kv::MemoryStore;
  use async_trait::async_trait;
  use serde_json::json;
  use std::sync::Arc;

  fn create_test_store() -> OfflineQueueStore<MemoryStore> {
    OfflineQueueStore::new(MemoryStore::new())
  }

  fn ids(ops: &[Operation]) -> Vec<String> {
    ops.iter().map(|op| op.id.clone()).collect()
  }

  /// Yields to the scheduler between every storage call so that unguarded
  /// read-modify-write cycles would interleave.
  struct YieldingStore(MemoryStore);

  #[async_trait]
  impl KeyValueStore for YieldingStore {
    async fn get(&self, key: &str) -> std::result::Result<Option<String>, PersistenceError> {
      tokio::task::yield_now().await;
      self.0.get(key).await
    }

    async fn set(&self, key: &str, value: String) -> std::result::Result<(), PersistenceError> {
      tokio::task::yield_now().await;
      self.0.set(key, value).await
    }

    async fn remove(&self, key: &str) -> std::result::Result<(), PersistenceError> {
      tokio::task::yield_now().await;
      self.0.remove(key).await
    }
  }

  #[tokio::test]
  async fn test_enqueue_preserves_order() {
    let store = create_test_store();

    let mut expected = Vec::new();
    for i in 0..5 {
      let op = store
        .enqueue(OperationKind::Create, "donors", json!({ "n": i }))
        .await
        .unwrap();
      expected.push(op.id);
    }

    let pending = store.list_pending().await.unwrap();
    assert_eq!(ids(&pending), expected);
    assert_eq!(pending[3].payload, json!({ "n": 3 }));
  }

  #[tokio::test]
  async fn test_enqueued_operation_fields() {
    let store = create_test_store();
    let op = store
      .enqueue(OperationKind::Delete, "alerts", json!({ "id": 9 }))
      .await
      .unwrap();

    assert!(!op.id.is_empty());
    assert_eq!(op.kind, OperationKind::Delete);
    assert_eq!(op.target, "alerts");
    assert_eq!(op.retry_count, 0);
    assert_eq!(op.state, OperationState::Pending);

    let loaded = store.get(&op.id).await.unwrap();
    assert_eq!(loaded, Some(op));
  }

  #[tokio::test]
  async fn test_enqueue_rejects_blank_target() {
    let store = create_test_store();
    let err = store
      .enqueue(OperationKind::Create, "  ", json!({}))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::InvalidInput { .. }));
    assert!(store.storage().is_empty());
  }

  #[tokio::test]
  async fn test_ids_are_unique() {
    let store = create_test_store();
    let mut seen = std::collections::HashSet::new();
    for _ in 0..100 {
      let op = store
        .enqueue(OperationKind::Query, "donors", Value::Null)
        .await
        .unwrap();
      assert!(seen.insert(op.id));
    }
  }

  #[tokio::test]
  async fn test_enqueue_then_remove_leaves_empty() {
    let store = create_test_store();
    let op = store
      .enqueue(OperationKind::Create, "donors", json!({}))
      .await
      .unwrap();

    assert!(store.remove(&op.id).await.unwrap());
    assert!(store.list_pending().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_remove_unknown_is_noop() {
    let store = create_test_store();
    store
      .enqueue(OperationKind::Create, "donors", json!({}))
      .await
      .unwrap();
    let before = store.list_pending().await.unwrap();

    assert!(!store.remove("does-not-exist").await.unwrap());
    assert_eq!(store.list_pending().await.unwrap(), before);
  }

  #[tokio::test]
  async fn test_remove_scenario() {
    let store = create_test_store();
    let id1 = store
      .enqueue(OperationKind::Create, "donors", json!({"name": "A"}))
      .await
      .unwrap()
      .id;
    let id2 = store
      .enqueue(OperationKind::Update, "donors", json!({"id": 1, "name": "B"}))
      .await
      .unwrap()
      .id;

    assert_eq!(
      ids(&store.list_pending().await.unwrap()),
      vec![id1.clone(), id2.clone()]
    );

    store.remove(&id1).await.unwrap();
    assert_eq!(ids(&store.list_pending().await.unwrap()), vec![id2]);
  }

  #[tokio::test]
  async fn test_clear() {
    let store = create_test_store();
    for _ in 0..3 {
      store
        .enqueue(OperationKind::Create, "donors", json!({}))
        .await
        .unwrap();
    }
    store.cache_put("profile", json!({"age": 30})).await.unwrap();

    store.clear().await.unwrap();

    assert!(store.list_pending().await.unwrap().is_empty());
    assert_eq!(store.count_pending().await.unwrap(), 0);
    // The cache is untouched
    assert!(store.cache_get("profile").await.unwrap().is_some());
  }

  #[tokio::test]
  async fn test_count_pending_scenario() {
    let store = create_test_store();
    assert_eq!(store.count_pending().await.unwrap(), 0);

    let first = store
      .enqueue(OperationKind::Create, "donors", json!({}))
      .await
      .unwrap();
    for _ in 0..2 {
      store
        .enqueue(OperationKind::Update, "donors", json!({}))
        .await
        .unwrap();
    }
    assert_eq!(store.count_pending().await.unwrap(), 3);

    store.begin_sync(&first.id).await.unwrap();
    assert_eq!(store.count_pending().await.unwrap(), 2);

    let all = store.list_pending().await.unwrap();
    let pending = all.iter().filter(|op| op.is_pending()).count();
    assert_eq!(store.count_pending().await.unwrap(), pending);
  }

  #[tokio::test]
  async fn test_state_transitions() {
    let store = create_test_store();
    let op = store
      .enqueue(OperationKind::Update, "profile", json!({}))
      .await
      .unwrap();

    let syncing = store.begin_sync(&op.id).await.unwrap();
    assert_eq!(syncing.state, OperationState::Syncing);
    assert!(syncing.last_attempt_at.is_some());

    let failed = store.mark_failed(&op.id, "timeout").await.unwrap();
    assert_eq!(failed.state, OperationState::Failed);
    assert_eq!(failed.retry_count, 1);
    assert_eq!(failed.last_error.as_deref(), Some("timeout"));

    store.begin_sync(&op.id).await.unwrap();
    let exhausted = store.mark_exhausted(&op.id, "409 conflict").await.unwrap();
    assert_eq!(exhausted.state, OperationState::Exhausted);
    assert_eq!(exhausted.retry_count, 2);

    assert_eq!(
      store.list_by_state(OperationState::Exhausted).await.unwrap(),
      vec![exhausted]
    );
  }

  #[tokio::test]
  async fn test_invalid_transitions_are_rejected() {
    let store = create_test_store();
    let op = store
      .enqueue(OperationKind::Create, "donors", json!({}))
      .await
      .unwrap();

    let err = store.mark_failed(&op.id, "nope").await.unwrap_err();
    assert!(matches!(
      err,
      Error::InvalidTransition {
        from: OperationState::Pending,
        to: OperationState::Failed,
        ..
      }
    ));

    // Nothing changed
    let loaded = store.get(&op.id).await.unwrap().unwrap();
    assert_eq!(loaded.retry_count, 0);
    assert_eq!(loaded.state, OperationState::Pending);

    let err = store.begin_sync("missing").await.unwrap_err();
    assert!(matches!(err, Error::NotQueued { .. }));
  }

  #[tokio::test]
  async fn test_recover_interrupted() {
    let store = create_test_store();
    let a = store
      .enqueue(OperationKind::Create, "donors", json!({}))
      .await
      .unwrap();
    let b = store
      .enqueue(OperationKind::Create, "donors", json!({}))
      .await
      .unwrap();
    store.begin_sync(&a.id).await.unwrap();

    assert_eq!(store.recover_interrupted().await.unwrap(), 1);

    let a = store.get(&a.id).await.unwrap().unwrap();
    assert_eq!(a.state, OperationState::Failed);
    assert_eq!(a.retry_count, 1);
    assert_eq!(a.last_error.as_deref(), Some("interrupted"));

    let b = store.get(&b.id).await.unwrap().unwrap();
    assert_eq!(b.state, OperationState::Pending);

    assert_eq!(store.recover_interrupted().await.unwrap(), 0);
  }

  #[tokio::test]
  async fn test_stats() {
    let store = create_test_store();
    let a = store
      .enqueue(OperationKind::Create, "donors", json!({}))
      .await
      .unwrap();
    let b = store
      .enqueue(OperationKind::Create, "donors", json!({}))
      .await
      .unwrap();
    store
      .enqueue(OperationKind::Create, "donors", json!({}))
      .await
      .unwrap();
    store.begin_sync(&a.id).await.unwrap();
    store.mark_failed(&a.id, "offline").await.unwrap();

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.pending, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.syncing, 0);
    assert_eq!(stats.total(), 3);
    assert_eq!(stats.oldest_pending, Some(b.enqueued_at));
  }

  #[tokio::test]
  async fn test_cache_round_trip_and_absent() {
    let store = create_test_store();
    assert_eq!(store.cache_get("never").await.unwrap(), None);

    store
      .cache_put("alerts", json!([{"id": 1, "blood": "O-"}]))
      .await
      .unwrap();
    assert_eq!(
      store.cache_get("alerts").await.unwrap(),
      Some(json!([{"id": 1, "blood": "O-"}]))
    );
  }

  #[tokio::test]
  async fn test_cache_last_writer_wins() {
    let store = create_test_store();
    store.cache_put("profile", json!({"age": 30})).await.unwrap();
    store.cache_put("profile", json!({"age": 31})).await.unwrap();

    assert_eq!(
      store.cache_get("profile").await.unwrap(),
      Some(json!({"age": 31}))
    );
  }

  #[tokio::test]
  async fn test_cache_remove_and_clear() {
    let store = create_test_store();
    store.cache_put("a", json!(1)).await.unwrap();
    store.cache_put("b", json!(2)).await.unwrap();

    assert!(store.cache_remove("a").await.unwrap());
    assert!(!store.cache_remove("a").await.unwrap());
    assert_eq!(store.cache_get("b").await.unwrap(), Some(json!(2)));

    store.cache_clear().await.unwrap();
    assert_eq!(store.cache_get("b").await.unwrap(), None);
  }

  #[tokio::test]
  async fn test_cache_get_as() {
    #[derive(Debug, PartialEq, serde::Deserialize)]
    struct Profile {
      age: u32,
    }

    let store = create_test_store();
    store.cache_put("profile", json!({"age": 30})).await.unwrap();
    store.cache_put("broken", json!("thirty")).await.unwrap();

    let profile: Option<Profile> = store.cache_get_as("profile").await.unwrap();
    assert_eq!(profile, Some(Profile { age: 30 }));

    let err = store.cache_get_as::<Profile>("broken").await.unwrap_err();
    assert!(matches!(
      err,
      Error::Persistence(PersistenceError::Corrupt { .. })
    ));
  }

  #[tokio::test]
  async fn test_corrupt_queue_surfaces_error() {
    let store = create_test_store();
    store
      .storage()
      .set(QUEUE_KEY, "{not json".to_string())
      .await
      .unwrap();

    let err = store.list_pending().await.unwrap_err();
    assert!(matches!(
      err,
      Error::Persistence(PersistenceError::Corrupt { .. })
    ));

    let err = store
      .enqueue(OperationKind::Create, "donors", json!({}))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Persistence(_)));
  }

  #[tokio::test]
  async fn test_write_failure_propagates() {
    let store = create_test_store();
    store
      .enqueue(OperationKind::Create, "donors", json!({}))
      .await
      .unwrap();
    store.storage().set_read_only(true);

    let err = store
      .enqueue(OperationKind::Create, "donors", json!({}))
      .await
      .unwrap_err();
    assert!(matches!(
      err,
      Error::Persistence(PersistenceError::Backend { .. })
    ));
    assert!(store.cache_put("k", json!(1)).await.is_err());

    // The failed enqueue did not land
    assert_eq!(store.list_pending().await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn test_shared_backend_sees_queue() {
    let backend = Arc::new(MemoryStore::new());
    let first = OfflineQueueStore::new(Arc::clone(&backend));
    let op = first
      .enqueue(OperationKind::Create, "donors", json!({}))
      .await
      .unwrap();
    drop(first);

    let second = OfflineQueueStore::new(backend);
    assert_eq!(ids(&second.list_pending().await.unwrap()), vec![op.id]);
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn test_concurrent_enqueues_are_not_lost() {
    let store = Arc::new(OfflineQueueStore::new(YieldingStore(MemoryStore::new())));

    let tasks: Vec<_> = (0..50)
      .map(|i| {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
          store
            .enqueue(OperationKind::Create, "donors", json!({ "n": i }))
            .await
        })
      })
      .collect();

    for result in futures::future::join_all(tasks).await {
      result.unwrap().unwrap();
    }

    assert_eq!(store.list_pending().await.unwrap().len(), 50);
    assert_eq!(store.count_pending().await.unwrap(), 50);
  }

  #[tokio::test]
  async fn test_concurrent_cache_puts_are_not_lost() {
    let store = OfflineQueueStore::new(YieldingStore(MemoryStore::new()));

    let keys: Vec<String> = (0..20).map(|i| format!("key-{}", i)).collect();
    let puts = keys
      .iter()
      .enumerate()
      .map(|(i, key)| store.cache_put(key, json!(i)));
    for result in futures::future::join_all(puts).await {
      result.unwrap();
    }

    for i in 0..20 {
      assert_eq!(
        store.cache_get(&format!("key-{}", i)).await.unwrap(),
        Some(json!(i))
      );
    }
  }
}
