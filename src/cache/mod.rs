//! Keyed local cache for structured JSON.
//!
//! This module provides the fallback side of loading:
//! - A `BlobStore` primitive (SQLite-indexed files, in-memory, or no-op)
//! - A `CacheAdapter` adding a validity window and JSON encoding on top
//! - Deterministic `CacheKeys` shared by readers and the write-back path

mod adapter;
mod sqlite;
mod store;

pub use adapter::{CacheAdapter, JSON_KIND};
pub use sqlite::SqliteStore;
pub use store::{BlobMeta, BlobStore, MemoryStore, NoopStore};

/// Builds cache keys of the form `<namespace>:<id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeys {
  namespace: String,
}

impl CacheKeys {
  pub fn new(namespace: impl Into<String>) -> Self {
    Self {
      namespace: namespace.into(),
    }
  }

  pub fn namespace(&self) -> &str {
    &self.namespace
  }

  /// Key for the entity with lookup id `id`.
  pub fn key(&self, id: &str) -> String {
    format!("{}:{}", self.namespace, id)
  }
}
