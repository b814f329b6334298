//! SQLite-indexed file store.
//!
//! Metadata rows live in `cache.db`; blob bytes live as individual files in
//! `blobs/`, named by the SHA-256 of the key.

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{debug, warn};

use super::store::{valid_until, BlobMeta, BlobStore};
use crate::error::StoreError;

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cache_object (
    key TEXT PRIMARY KEY,
    file_name TEXT NOT NULL,
    kind TEXT NOT NULL,
    valid_until TEXT NOT NULL,
    touched_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_cache_object_valid_until
    ON cache_object(valid_until);
"#;

/// Distinguishes temp files of concurrent writers to the same key.
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Extension of blobs that are still being written.
const TMP_SUFFIX: &str = "tmp";

/// Row of the `cache_object` table.
struct ObjectRow {
  file_name: String,
  kind: String,
  valid_until: String,
}

/// SQLite-based blob store implementation.
pub struct SqliteStore {
  conn: Mutex<Connection>,
  blob_dir: PathBuf,
}

impl SqliteStore {
  /// Open (or create) a store rooted at `dir`.
  pub fn open(dir: &Path) -> Result<Self, StoreError> {
    let blob_dir = dir.join("blobs");
    std::fs::create_dir_all(&blob_dir)?;
    sweep_temp_files(&blob_dir)?;

    let conn = Connection::open(dir.join("cache.db"))?;
    conn.execute_batch(CACHE_SCHEMA)?;

    Ok(Self {
      conn: Mutex::new(conn),
      blob_dir,
    })
  }

  /// Open the store at the platform cache location.
  pub fn open_default() -> Result<Self, StoreError> {
    Self::open(&Self::default_dir()?)
  }

  /// Get the default cache directory.
  pub fn default_dir() -> Result<PathBuf, StoreError> {
    let cache_dir = dirs::cache_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".cache")))
      .ok_or_else(|| {
        StoreError::Io(std::io::Error::new(
          std::io::ErrorKind::NotFound,
          "could not determine cache directory",
        ))
      })?;

    Ok(cache_dir.join("huddle"))
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
    self
      .conn
      .lock()
      .map_err(|e| StoreError::Lock(e.to_string()))
  }

  fn row(&self, key: &str) -> Result<Option<ObjectRow>, StoreError> {
    let conn = self.lock()?;
    let row = conn
      .query_row(
        "SELECT file_name, kind, valid_until FROM cache_object WHERE key = ?",
        params![key],
        |row| {
          Ok(ObjectRow {
            file_name: row.get(0)?,
            kind: row.get(1)?,
            valid_until: row.get(2)?,
          })
        },
      )
      .optional()?;
    Ok(row)
  }

  fn blob_path(&self, file_name: &str) -> PathBuf {
    self.blob_dir.join(file_name)
  }
}

#[async_trait]
impl BlobStore for SqliteStore {
  async fn metadata(&self, key: &str) -> Result<Option<BlobMeta>, StoreError> {
    let Some(row) = self.row(key)? else {
      return Ok(None);
    };
    Ok(Some(BlobMeta {
      kind: row.kind,
      valid_until: parse_datetime(&row.valid_until)?,
    }))
  }

  async fn exists(&self, key: &str) -> Result<bool, StoreError> {
    match self.row(key)? {
      Some(row) => Ok(tokio::fs::try_exists(self.blob_path(&row.file_name)).await?),
      None => Ok(false),
    }
  }

  async fn read_text(&self, key: &str) -> Result<String, StoreError> {
    let row = self
      .row(key)?
      .ok_or_else(|| StoreError::Missing(key.to_string()))?;
    Ok(tokio::fs::read_to_string(self.blob_path(&row.file_name)).await?)
  }

  async fn write(
    &self,
    key: &str,
    bytes: Vec<u8>,
    kind: &str,
    max_age: Duration,
  ) -> Result<(), StoreError> {
    let expires = valid_until(Utc::now(), max_age)?.to_rfc3339_opts(SecondsFormat::Millis, true);
    let file_name = blob_file_name(key, kind);
    let path = self.blob_path(&file_name);

    // Rename over the old file so readers never see a half-written blob
    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let tmp = path.with_extension(format!("{}.{}.{}", kind, seq, TMP_SUFFIX));
    let staged = match tokio::fs::write(&tmp, &bytes).await {
      Ok(()) => tokio::fs::rename(&tmp, &path).await,
      Err(e) => Err(e),
    };
    if let Err(e) = staged {
      if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
        if cleanup.kind() != std::io::ErrorKind::NotFound {
          warn!(path = %tmp.display(), error = %cleanup, "failed to remove temp blob");
        }
      }
      return Err(e.into());
    }

    let conn = self.lock()?;
    conn.execute(
      "INSERT OR REPLACE INTO cache_object (key, file_name, kind, valid_until, touched_at)
       VALUES (?, ?, ?, ?, datetime('now'))",
      params![key, file_name, kind, expires],
    )?;

    Ok(())
  }

  async fn remove(&self, key: &str) -> Result<(), StoreError> {
    let Some(row) = self.row(key)? else {
      return Ok(());
    };

    {
      let conn = self.lock()?;
      conn.execute("DELETE FROM cache_object WHERE key = ?", params![key])?;
    }

    match tokio::fs::remove_file(self.blob_path(&row.file_name)).await {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(e.into()),
    }
  }
}

/// Delete temp blobs left behind by writes that never finished.
fn sweep_temp_files(blob_dir: &Path) -> Result<(), StoreError> {
  for entry in std::fs::read_dir(blob_dir)? {
    let path = entry?.path();
    if path.extension().is_some_and(|ext| ext == TMP_SUFFIX) {
      debug!(path = %path.display(), "removing stale temp blob");
      if let Err(e) = std::fs::remove_file(&path) {
        warn!(path = %path.display(), error = %e, "failed to remove stale temp blob");
      }
    }
  }
  Ok(())
}

/// Stable, fixed-length file name for a key.
fn blob_file_name(key: &str, kind: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(key.as_bytes());
  format!("{}.{}", hex::encode(hasher.finalize()), kind)
}

/// Parse a stored RFC 3339 validity timestamp.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| {
      StoreError::Io(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("invalid valid_until '{}': {}", s, e),
      ))
    })
}
