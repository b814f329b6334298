//! Keyed blob store primitive and the in-process implementations.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::StoreError;

/// Metadata kept alongside every stored blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobMeta {
  /// Content-kind marker given at write time (e.g. "json")
  pub kind: String,
  /// Instant after which the record must be treated as absent
  pub valid_until: DateTime<Utc>,
}

impl BlobMeta {
  /// Whether the validity window has elapsed at `now`.
  pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
    self.valid_until <= now
  }
}

/// End of the validity window for a record written at `now`.
pub(crate) fn valid_until(
  now: DateTime<Utc>,
  max_age: Duration,
) -> Result<DateTime<Utc>, StoreError> {
  now
    .checked_add_signed(max_age)
    .ok_or_else(|| StoreError::OutOfRange(format!("{} past {}", max_age, now)))
}

/// Trait for keyed blob storage backends.
///
/// Metadata and blob are separate so a store can lose one without the
/// other (a deleted file behind a surviving row, for instance).
#[async_trait]
pub trait BlobStore: Send + Sync {
  /// Metadata for `key`, if any was ever written.
  async fn metadata(&self, key: &str) -> Result<Option<BlobMeta>, StoreError>;

  /// Whether the blob behind `key` still exists.
  async fn exists(&self, key: &str) -> Result<bool, StoreError>;

  /// Read the blob as UTF-8 text.
  async fn read_text(&self, key: &str) -> Result<String, StoreError>;

  /// Replace whatever is stored under `key`, valid for `max_age` from now.
  async fn write(
    &self,
    key: &str,
    bytes: Vec<u8>,
    kind: &str,
    max_age: Duration,
  ) -> Result<(), StoreError>;

  /// Drop the record for `key`. Removing a missing key is not an error.
  async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

#[async_trait]
impl<S: BlobStore + ?Sized> BlobStore for Box<S> {
  async fn metadata(&self, key: &str) -> Result<Option<BlobMeta>, StoreError> {
    (**self).metadata(key).await
  }

  async fn exists(&self, key: &str) -> Result<bool, StoreError> {
    (**self).exists(key).await
  }

  async fn read_text(&self, key: &str) -> Result<String, StoreError> {
    (**self).read_text(key).await
  }

  async fn write(
    &self,
    key: &str,
    bytes: Vec<u8>,
    kind: &str,
    max_age: Duration,
  ) -> Result<(), StoreError> {
    (**self).write(key, bytes, kind, max_age).await
  }

  async fn remove(&self, key: &str) -> Result<(), StoreError> {
    (**self).remove(key).await
  }
}

#[derive(Debug, Clone)]
struct MemoryRecord {
  meta: BlobMeta,
  bytes: Vec<u8>,
}

/// Store that keeps everything in a process-local map.
#[derive(Debug, Default)]
pub struct MemoryStore {
  records: Mutex<HashMap<String, MemoryRecord>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Insert a record with an explicit validity instant.
  pub fn insert_raw(&self, key: &str, bytes: Vec<u8>, kind: &str, valid_until: DateTime<Utc>) {
    if let Ok(mut records) = self.records.lock() {
      records.insert(
        key.to_string(),
        MemoryRecord {
          meta: BlobMeta {
            kind: kind.to_string(),
            valid_until,
          },
          bytes,
        },
      );
    }
  }

  /// Number of stored records.
  pub fn len(&self) -> usize {
    self.records.lock().map(|r| r.len()).unwrap_or(0)
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, MemoryRecord>>, StoreError> {
    self
      .records
      .lock()
      .map_err(|e| StoreError::Lock(e.to_string()))
  }
}

#[async_trait]
impl BlobStore for MemoryStore {
  async fn metadata(&self, key: &str) -> Result<Option<BlobMeta>, StoreError> {
    Ok(self.lock()?.get(key).map(|r| r.meta.clone()))
  }

  async fn exists(&self, key: &str) -> Result<bool, StoreError> {
    Ok(self.lock()?.contains_key(key))
  }

  async fn read_text(&self, key: &str) -> Result<String, StoreError> {
    let records = self.lock()?;
    let record = records
      .get(key)
      .ok_or_else(|| StoreError::Missing(key.to_string()))?;
    String::from_utf8(record.bytes.clone())
      .map_err(|e| StoreError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
  }

  async fn write(
    &self,
    key: &str,
    bytes: Vec<u8>,
    kind: &str,
    max_age: Duration,
  ) -> Result<(), StoreError> {
    let record = MemoryRecord {
      meta: BlobMeta {
        kind: kind.to_string(),
        valid_until: valid_until(Utc::now(), max_age)?,
      },
      bytes,
    };
    self.lock()?.insert(key.to_string(), record);
    Ok(())
  }

  async fn remove(&self, key: &str) -> Result<(), StoreError> {
    self.lock()?.remove(key);
    Ok(())
  }
}

/// Store that doesn't cache anything.
/// Used when caching is disabled - reads always miss, writes are discarded.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStore;

#[async_trait]
impl BlobStore for NoopStore {
  async fn metadata(&self, _key: &str) -> Result<Option<BlobMeta>, StoreError> {
    Ok(None)
  }

  async fn exists(&self, _key: &str) -> Result<bool, StoreError> {
    Ok(false)
  }

  async fn read_text(&self, key: &str) -> Result<String, StoreError> {
    Err(StoreError::Missing(key.to_string()))
  }

  async fn write(
    &self,
    _key: &str,
    _bytes: Vec<u8>,
    _kind: &str,
    _max_age: Duration,
  ) -> Result<(), StoreError> {
    Ok(())
  }

  async fn remove(&self, _key: &str) -> Result<(), StoreError> {
    Ok(())
  }
}
