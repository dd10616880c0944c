//! Response cache with offline fallback.
//!
//! This module sits on top of the queue store's key-value cache:
//! - Successful fetches overwrite the cached value for their key
//! - Failed fetches fall back to the last cached value (offline mode)
//! - Nothing expires on its own; callers invalidate explicitly

mod layer;
mod traits;

pub use layer::{CacheLayer, FetchError};
pub use traits::{CacheResult, CacheSource};
