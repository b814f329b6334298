//! Classified errors for the loading layer.
//!
//! Every failure is classified once, where it originates. Callers (and the
//! fallback loader) only ever branch on the variant.

use thiserror::Error;

/// Result type for load operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// The only error type crossing a `load` call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
  /// Credentials or session were rejected. Never served from cache.
  #[error("session invalidated (HTTP {status}), sign in again")]
  NotRecoverable { status: u16 },

  /// Anything else that went wrong talking to the remote side.
  #[error(transparent)]
  Recoverable(#[from] RecoverableError),

  /// The cache holds nothing usable for this key.
  #[error("no usable cached record for {key}")]
  Absent { key: String },
}

impl LoadError {
  /// True for failures that may be compensated by cached data.
  pub fn is_recoverable(&self) -> bool {
    matches!(self, LoadError::Recoverable(_))
  }

  /// True when the caller has to re-authenticate.
  pub fn is_not_recoverable(&self) -> bool {
    matches!(self, LoadError::NotRecoverable { .. })
  }

  /// True when the cache had no valid record.
  pub fn is_absent(&self) -> bool {
    matches!(self, LoadError::Absent { .. })
  }
}

/// Failures that allow falling back to cached data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecoverableError {
  #[error("network error: {0}")]
  Network(String),

  #[error("unexpected HTTP status {status}")]
  UnexpectedStatus { status: u16 },

  #[error("malformed response body: {0}")]
  MalformedBody(String),

  #[error("empty response where an entity was expected")]
  EmptyResponse,

  #[error("invalid request URL {url}: {reason}")]
  InvalidUrl { url: String, reason: String },

  #[error("payload does not map to an entity: {0}")]
  Mapping(#[from] MapError),

  #[error("failed to write cache record {key}: {reason}")]
  CacheWrite { key: String, reason: String },
}

/// Errors raised while turning JSON into a domain entity.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MapError {
  #[error("missing field `{0}`")]
  MissingField(&'static str),

  #[error("field `{field}` should be {expected}")]
  WrongType {
    field: &'static str,
    expected: &'static str,
  },

  #[error("field `{field}` holds an invalid timestamp `{value}`")]
  Timestamp { field: &'static str, value: String },
}

impl From<MapError> for LoadError {
  fn from(err: MapError) -> Self {
    LoadError::Recoverable(RecoverableError::Mapping(err))
  }
}

/// Errors from the underlying blob store primitive.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("SQLite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("lock poisoned: {0}")]
  Lock(String),

  #[error("no blob stored for {0}")]
  Missing(String),

  #[error("validity window out of range: {0}")]
  OutOfRange(String),
}
