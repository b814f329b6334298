//! Remote-first loading with cache fallback and write-back.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{Loaded, Loader};
use crate::cache::{BlobStore, CacheAdapter, CacheKeys};
use crate::error::{LoadError, LoadResult};
use crate::event::EntityMapper;

/// Loads from the remote side and falls back to the cache.
///
/// Per call:
/// 1. Try the remote loader
/// 2. On success, write the entity back to the cache (best effort) and return it
/// 3. On a not-recoverable failure, return it as-is without touching the cache
/// 4. On any other failure, return whatever the cache loader returns
pub struct FallbackLoader<R, C, S, M>
where
  S: BlobStore,
  M: EntityMapper,
{
  remote: R,
  cached: C,
  /// Write-back target; must share keys with `cached`
  cache: Arc<CacheAdapter<S>>,
  mapper: Arc<M>,
  keys: CacheKeys,
}

impl<R, C, S, M> FallbackLoader<R, C, S, M>
where
  R: Loader<Entity = M::Entity>,
  C: Loader<Entity = M::Entity>,
  S: BlobStore,
  M: EntityMapper,
{
  pub fn new(
    remote: R,
    cached: C,
    cache: Arc<CacheAdapter<S>>,
    mapper: Arc<M>,
    keys: CacheKeys,
  ) -> Self {
    Self {
      remote,
      cached,
      cache,
      mapper,
      keys,
    }
  }

  /// Key the entity with lookup id `id` is written back under.
  pub fn cache_key(&self, id: &str) -> String {
    self.keys.key(id)
  }

  /// Load `id` and report whether it came from the network or the cache.
  pub async fn load_with_source(&self, id: &str) -> LoadResult<Loaded<M::Entity>> {
    let remote_err = match self.remote.load(id).await {
      Ok(entity) => {
        self.write_back(id, &entity).await;
        return Ok(Loaded::from_network(entity));
      }
      Err(err) => err,
    };

    match remote_err {
      LoadError::NotRecoverable { status } => {
        warn!(id, status, "remote rejected credentials, not falling back");
        Err(remote_err)
      }
      LoadError::Recoverable(_) | LoadError::Absent { .. } => {
        info!(id, error = %remote_err, "remote load failed, falling back to cache");
        let entity = self.cached.load(id).await?;
        Ok(Loaded::from_cache(entity))
      }
    }
  }

  /// Persist a freshly fetched entity. Failures are logged, never returned.
  async fn write_back(&self, id: &str, entity: &M::Entity) {
    let key = self.keys.key(id);
    let json = self.mapper.to_json(entity);
    match self.cache.save(&key, &json).await {
      Ok(()) => debug!(key = %key, "write-back complete"),
      Err(e) => warn!(key = %key, error = %e, "write-back failed"),
    }
  }
}

#[async_trait]
impl<R, C, S, M> Loader for FallbackLoader<R, C, S, M>
where
  R: Loader<Entity = M::Entity>,
  C: Loader<Entity = M::Entity>,
  S: BlobStore,
  M: EntityMapper,
  M::Entity: Sync,
{
  type Entity = M::Entity;

  async fn load(&self, id: &str) -> LoadResult<M::Entity> {
    self.load_with_source(id).await.map(|loaded| loaded.data)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{BlobMeta, MemoryStore};
  use crate::error::{RecoverableError, StoreError};
  use crate::event::{Event, EventMapper, Player};
  use crate::loader::{CacheLoader, Source};
  use chrono::{Duration, TimeZone, Utc};
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Mutex;

  fn event(id: &str) -> Event {
    Event {
      id: id.into(),
      title: "Five-a-side".into(),
      description: None,
      location: Some("Pitch 3".into()),
      starts_at: Utc.with_ymd_and_hms(2024, 5, 2, 19, 0, 0).unwrap(),
      players: vec![Player {
        id: "p1".into(),
        name: "Ana".into(),
        role: None,
        confirmed: true,
        confirmed_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()),
      }],
    }
  }

  /// Remote loader returning a fixed outcome and recording the ids it saw.
  struct Scripted {
    result: LoadResult<Event>,
    ids: Mutex<Vec<String>>,
  }

  impl Scripted {
    fn new(result: LoadResult<Event>) -> Arc<Self> {
      Arc::new(Self {
        result,
        ids: Mutex::new(Vec::new()),
      })
    }

    fn ids(&self) -> Vec<String> {
      self.ids.lock().unwrap().clone()
    }
  }

  #[async_trait]
  impl Loader for Scripted {
    type Entity = Event;

    async fn load(&self, id: &str) -> LoadResult<Event> {
      self.ids.lock().unwrap().push(id.to_string());
      self.result.clone()
    }
  }

  /// Memory store counting reads and writes, optionally failing writes.
  #[derive(Default)]
  struct Counting {
    inner: MemoryStore,
    reads: AtomicUsize,
    writes: Mutex<Vec<(String, Vec<u8>)>>,
    fail_writes: bool,
  }

  #[async_trait]
  impl BlobStore for Counting {
    async fn metadata(&self, key: &str) -> Result<Option<BlobMeta>, StoreError> {
      self.reads.fetch_add(1, Ordering::SeqCst);
      self.inner.metadata(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
      self.inner.exists(key).await
    }

    async fn read_text(&self, key: &str) -> Result<String, StoreError> {
      self.inner.read_text(key).await
    }

    async fn write(
      &self,
      key: &str,
      bytes: Vec<u8>,
      kind: &str,
      max_age: Duration,
    ) -> Result<(), StoreError> {
      self
        .writes
        .lock()
        .unwrap()
        .push((key.to_string(), bytes.clone()));
      if self.fail_writes {
        return Err(StoreError::Io(std::io::Error::other("read-only filesystem")));
      }
      self.inner.write(key, bytes, kind, max_age).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
      self.inner.remove(key).await
    }
  }

  type Cached = Arc<CacheLoader<Counting, EventMapper>>;
  type Subject = FallbackLoader<Arc<Scripted>, Cached, Counting, EventMapper>;

  struct Harness {
    loader: Subject,
    remote: Arc<Scripted>,
    cache: Arc<CacheAdapter<Counting>>,
  }

  impl Harness {
    fn new(remote: LoadResult<Event>, store: Counting) -> Self {
      let remote = Scripted::new(remote);
      let cache = Arc::new(CacheAdapter::new(store));
      let mapper = Arc::new(EventMapper);
      let keys = CacheKeys::new("events");
      let cached = Arc::new(CacheLoader::new(
        Arc::clone(&cache),
        Arc::clone(&mapper),
        keys.clone(),
      ));
      let loader =
        FallbackLoader::new(Arc::clone(&remote), cached, Arc::clone(&cache), mapper, keys);
      Self {
        loader,
        remote,
        cache,
      }
    }

    fn store(&self) -> &Counting {
      self.cache.store()
    }

    fn seed(&self, event: &Event) {
      let json = EventMapper.to_json(event);
      self.store().inner.insert_raw(
        "events:g1",
        serde_json::to_vec(&json).unwrap(),
        "json",
        Utc::now() + Duration::hours(1),
      );
    }
  }

  fn server_error() -> LoadError {
    RecoverableError::UnexpectedStatus { status: 500 }.into()
  }

  #[tokio::test]
  async fn success_writes_back_exactly_once() {
    let fresh = event("g1");
    let h = Harness::new(Ok(fresh.clone()), Counting::default());

    let loaded = h.loader.load_with_source("g1").await.unwrap();
    assert_eq!(loaded, Loaded::from_network(fresh.clone()));

    let writes = h.store().writes.lock().unwrap().clone();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].0, "events:g1");
    let written: serde_json::Value = serde_json::from_slice(&writes[0].1).unwrap();
    assert_eq!(written, EventMapper.to_json(&fresh));
    assert_eq!(h.store().reads.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn failed_write_back_does_not_fail_the_load() {
    let store = Counting {
      fail_writes: true,
      ..Default::default()
    };
    let h = Harness::new(Ok(event("g1")), store);

    let loaded = h.loader.load_with_source("g1").await.unwrap();
    assert_eq!(loaded.source, Source::Network);
    assert_eq!(h.store().writes.lock().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn not_recoverable_never_reads_the_cache() {
    let fatal = LoadError::NotRecoverable { status: 401 };
    let h = Harness::new(Err(fatal.clone()), Counting::default());
    h.seed(&event("g1"));

    let err = h.loader.load("g1").await.unwrap_err();
    assert_eq!(err, fatal);
    assert_eq!(h.store().reads.load(Ordering::SeqCst), 0);
    assert!(h.store().writes.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn recoverable_falls_back_once_with_same_id() {
    let cached = event("g1");
    let h = Harness::new(Err(server_error()), Counting::default());
    h.seed(&cached);

    let loaded = h.loader.load_with_source("g1").await.unwrap();
    assert_eq!(loaded, Loaded::from_cache(cached));
    assert!(loaded.is_from_cache());
    assert_eq!(h.remote.ids(), vec!["g1".to_string()]);
    assert_eq!(h.store().reads.load(Ordering::SeqCst), 1);
    assert!(h.store().writes.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn every_recoverable_kind_falls_back() {
    let kinds = [
      RecoverableError::Network("connection reset".into()),
      RecoverableError::MalformedBody("eof".into()),
      RecoverableError::EmptyResponse,
      RecoverableError::UnexpectedStatus { status: 403 },
      RecoverableError::UnexpectedStatus { status: 404 },
    ];
    for kind in kinds {
      let h = Harness::new(Err(kind.into()), Counting::default());
      h.seed(&event("g1"));
      let loaded = h.loader.load_with_source("g1").await.unwrap();
      assert_eq!(loaded.source, Source::Cache);
    }
  }

  #[tokio::test]
  async fn empty_cache_surfaces_absent_not_the_remote_error() {
    let h = Harness::new(Err(server_error()), Counting::default());
    let err = h.loader.load("g1").await.unwrap_err();
    assert_eq!(
      err,
      LoadError::Absent {
        key: "events:g1".into()
      }
    );
  }

  #[tokio::test]
  async fn stale_cache_is_absent_on_fallback() {
    let h = Harness::new(Err(server_error()), Counting::default());
    h.store().inner.insert_raw(
      "events:g1",
      serde_json::to_vec(&EventMapper.to_json(&event("g1"))).unwrap(),
      "json",
      Utc::now() - Duration::minutes(1),
    );
    assert!(h.loader.load("g1").await.unwrap_err().is_absent());
  }

  #[tokio::test]
  async fn written_back_entity_serves_the_next_fallback() {
    let fresh = event("g1");
    let h = Harness::new(Ok(fresh.clone()), Counting::default());
    h.loader.load("g1").await.unwrap();

    let cache_only = CacheLoader::new(
      Arc::clone(&h.cache),
      Arc::new(EventMapper),
      CacheKeys::new("events"),
    );
    assert_eq!(cache_only.load("g1").await.unwrap(), fresh);
    assert_eq!(h.loader.cache_key("g1"), "events:g1");
  }
}
