//! Cache layer that pairs remote fetches with the offline response cache.

use std::future::Future;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::traits::CacheResult;
use crate::error::{Error, PersistenceError};
use crate::kv::KeyValueStore;
use crate::queue::OfflineQueueStore;

/// Failure of a cached fetch.
#[derive(Debug, Error)]
pub enum FetchError<E>
where
  E: std::error::Error + 'static,
{
  /// The fetch failed and there was no cached value to fall back to.
  #[error("fetch failed and nothing is cached: {0}")]
  Unavailable(#[source] E),

  /// The cache itself could not be read or written.
  #[error(transparent)]
  Cache(#[from] Error),
}

/// Cache layer that manages the fetch-then-cache flow.
///
/// The network is always tried first. There is no freshness policy: a cached
/// value is only served when the fetch fails.
pub struct CacheLayer<S: KeyValueStore> {
  store: Arc<OfflineQueueStore<S>>,
}

impl<S: KeyValueStore> CacheLayer<S> {
  pub fn new(store: Arc<OfflineQueueStore<S>>) -> Self {
    Self { store }
  }

  /// Fetch fresh data, caching it under `key`, or serve the cached value if
  /// the fetch fails.
  pub async fn fetch<T, E, F, Fut>(&self, key: &str, fetcher: F) -> Result<CacheResult<T>, FetchError<E>>
  where
    T: Serialize + DeserializeOwned,
    E: std::error::Error + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
  {
    match fetcher().await {
      Ok(data) => {
        let value = serde_json::to_value(&data)
          .map_err(|source| Error::from(PersistenceError::Encode { source }))?;
        self.store.cache_put(key, value).await?;
        debug!(key, "refreshed cache from network");
        Ok(CacheResult::from_network(data))
      }
      Err(err) => match self.store.cache_get_as::<T>(key).await? {
        Some(cached) => {
          // Network failed, return cached value (offline mode)
          warn!(key, error = %err, "fetch failed, serving cached value");
          Ok(CacheResult::offline(cached))
        }
        None => Err(FetchError::Unavailable(err)),
      },
    }
  }

  /// Read the cached value without fetching.
  pub async fn cached<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, Error> {
    self.store.cache_get_as(key).await
  }

  /// Forget the cached value for `key`.
  pub async fn invalidate(&self, key: &str) -> Result<bool, Error> {
    self.store.cache_remove(key).await
  }
}

impl<S: KeyValueStore> Clone for CacheLayer<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
    }
  }
}
