use async_trait::async_trait;
use std::sync::Arc;

use super::Loader;
use crate::cache::{BlobStore, CacheAdapter, CacheKeys};
use crate::error::{LoadError, LoadResult};
use crate::event::EntityMapper;

/// Reads an entity from the local cache.
///
/// Cache-internal failures are already folded into "absent" by the
/// adapter, so the only cache-side error this raises is [`LoadError::Absent`].
pub struct CacheLoader<S: BlobStore, M: EntityMapper> {
  cache: Arc<CacheAdapter<S>>,
  mapper: Arc<M>,
  keys: CacheKeys,
}

impl<S: BlobStore, M: EntityMapper> CacheLoader<S, M> {
  pub fn new(cache: Arc<CacheAdapter<S>>, mapper: Arc<M>, keys: CacheKeys) -> Self {
    Self {
      cache,
      mapper,
      keys,
    }
  }
}

#[async_trait]
impl<S: BlobStore, M: EntityMapper> Loader for CacheLoader<S, M> {
  type Entity = M::Entity;

  async fn load(&self, id: &str) -> LoadResult<M::Entity> {
    let key = self.keys.key(id);
    let json = match self.cache.get(&key).await {
      Some(json) => json,
      None => return Err(LoadError::Absent { key }),
    };

    Ok(self.mapper.to_entity(&json)?)
  }
}
