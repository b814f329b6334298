//! Entity loaders: remote-backed, cache-backed, and the fallback loader that
//! combines them.

mod cached;
mod fallback;
mod remote;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::LoadResult;

pub use cached::CacheLoader;
pub use fallback::FallbackLoader;
pub use remote::{Endpoint, RemoteLoader};

/// Loads a single entity by its lookup id.
#[async_trait]
pub trait Loader: Send + Sync {
  type Entity: Send;

  async fn load(&self, id: &str) -> LoadResult<Self::Entity>;
}

#[async_trait]
impl<L: Loader> Loader for Arc<L> {
  type Entity = L::Entity;

  async fn load(&self, id: &str) -> LoadResult<Self::Entity> {
    (**self).load(id).await
  }
}

/// An entity together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loaded<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: Source,
}

impl<T> Loaded<T> {
  /// Fresh data from the remote side.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: Source::Network,
    }
  }

  /// Previously cached data served because the remote side failed.
  pub fn from_cache(data: T) -> Self {
    Self {
      data,
      source: Source::Cache,
    }
  }

  pub fn is_from_cache(&self) -> bool {
    self.source == Source::Cache
  }
}

/// Indicates where loaded data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
  /// Fresh data from network
  Network,
  /// Cached data, served because the network fetch failed
  Cache,
}

impl std::fmt::Display for Source {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Source::Network => write!(f, "network"),
      Source::Cache => write!(f, "cache"),
    }
  }
}
