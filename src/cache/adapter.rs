//! JSON cache with a validity window on top of a [`BlobStore`].

use chrono::{Duration, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::store::BlobStore;
use crate::error::{LoadResult, RecoverableError};

/// Content-kind marker for every record this adapter writes.
pub const JSON_KIND: &str = "json";

/// Reads and writes structured JSON under string keys.
///
/// Reads fail open: any problem (stale, missing, unreadable, corrupt) is
/// reported as "nothing cached". Writes fail loud.
pub struct CacheAdapter<S: BlobStore> {
  store: Arc<S>,
  /// How long a written record stays valid
  max_age: Duration,
}

impl<S: BlobStore> CacheAdapter<S> {
  /// Create a new cache adapter with the given storage backend.
  pub fn new(store: S) -> Self {
    Self::from_shared(Arc::new(store))
  }

  /// Create an adapter over a store that is also used elsewhere.
  pub fn from_shared(store: Arc<S>) -> Self {
    Self {
      store,
      max_age: Duration::days(1),
    }
  }

  /// Set the validity window for newly written records.
  pub fn with_max_age(mut self, max_age: Duration) -> Self {
    self.max_age = max_age;
    self
  }

  pub fn max_age(&self) -> Duration {
    self.max_age
  }

  /// The underlying blob store.
  pub fn store(&self) -> &S {
    &self.store
  }

  /// Cached JSON for `key`, or `None` if nothing valid is stored.
  pub async fn get(&self, key: &str) -> Option<Value> {
    let meta = match self.store.metadata(key).await {
      Ok(Some(meta)) => meta,
      Ok(None) => {
        debug!(key, "cache miss");
        return None;
      }
      Err(e) => {
        warn!(key, error = %e, "cache metadata lookup failed");
        return None;
      }
    };

    if meta.is_expired_at(Utc::now()) {
      debug!(key, valid_until = %meta.valid_until, "cache record expired");
      return None;
    }

    match self.store.exists(key).await {
      Ok(true) => {}
      Ok(false) => {
        debug!(key, "cache metadata present but blob is gone");
        return None;
      }
      Err(e) => {
        warn!(key, error = %e, "cache existence check failed");
        return None;
      }
    }

    let text = match self.store.read_text(key).await {
      Ok(text) => text,
      Err(e) => {
        warn!(key, error = %e, "cache read failed");
        return None;
      }
    };

    match serde_json::from_str::<Value>(&text) {
      Ok(value) => {
        debug!(key, "cache hit");
        Some(value)
      }
      Err(e) => {
        warn!(key, error = %e, "cached record is not valid JSON");
        None
      }
    }
  }

  /// Persist `value` under `key`, replacing any previous record.
  pub async fn save(&self, key: &str, value: &Value) -> LoadResult<()> {
    let bytes = serde_json::to_vec(value).map_err(|e| RecoverableError::CacheWrite {
      key: key.to_string(),
      reason: e.to_string(),
    })?;

    self
      .store
      .write(key, bytes, JSON_KIND, self.max_age)
      .await
      .map_err(|e| RecoverableError::CacheWrite {
        key: key.to_string(),
        reason: e.to_string(),
      })?;

    debug!(key, "cache record written");
    Ok(())
  }

  /// Evict the record for `key`.
  pub async fn remove(&self, key: &str) -> LoadResult<()> {
    self
      .store
      .remove(key)
      .await
      .map_err(|e| RecoverableError::CacheWrite {
        key: key.to_string(),
        reason: e.to_string(),
      })?;
    Ok(())
  }
}

impl<S: BlobStore> Clone for CacheAdapter<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      max_age: self.max_age,
    }
  }
}
