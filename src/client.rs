//! Event client wiring transport, cache and mapper from configuration.

use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;

use crate::cache::{BlobStore, CacheAdapter, CacheKeys, NoopStore, SqliteStore};
use crate::config::Config;
use crate::error::LoadResult;
use crate::event::{Event, EventMapper};
use crate::loader::{CacheLoader, Endpoint, FallbackLoader, Loaded, RemoteLoader};
use crate::transport::{HttpGet, ReqwestHttp, TransportAdapter};

/// Store selected at runtime from configuration.
pub type DynStore = Box<dyn BlobStore>;

type EventLoader<H> = FallbackLoader<
  RemoteLoader<H, EventMapper>,
  CacheLoader<DynStore, EventMapper>,
  DynStore,
  EventMapper,
>;

/// Loads events with cache fallback.
///
/// Every successful network fetch is written back, so a later failure can
/// still be served from cache.
pub struct EventClient<H: HttpGet = ReqwestHttp> {
  loader: EventLoader<H>,
  cache: Arc<CacheAdapter<DynStore>>,
}

impl EventClient<ReqwestHttp> {
  /// Create a client from configuration, opening the on-disk cache.
  pub fn new(config: &Config) -> Result<Self> {
    let http = ReqwestHttp::new(config.api.timeout())
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    let store: DynStore = if config.cache.enabled {
      let dir = match &config.cache.dir {
        Some(dir) => dir.clone(),
        None => SqliteStore::default_dir().map_err(|e| eyre!("{}", e))?,
      };
      let store = SqliteStore::open(&dir)
        .map_err(|e| eyre!("Failed to open cache at {}: {}", dir.display(), e))?;
      Box::new(store)
    } else {
      Box::new(NoopStore)
    };

    Ok(Self::with_parts(http, store, config))
  }
}

impl<H: HttpGet> EventClient<H> {
  /// Assemble a client from an explicit HTTP primitive and store.
  pub fn with_parts(http: H, store: DynStore, config: &Config) -> Self {
    let mut transport = TransportAdapter::new(http, config.api.base_url.clone());
    if let Some(token) = Config::get_api_token() {
      transport = transport.with_default_header("authorization", format!("Bearer {}", token));
    }

    let mapper = Arc::new(EventMapper);
    let keys = CacheKeys::new(config.cache.namespace.clone());
    let cache = Arc::new(CacheAdapter::new(store).with_max_age(config.cache.max_age()));

    let remote = RemoteLoader::new(
      Arc::new(transport),
      Arc::clone(&mapper),
      Endpoint::new(config.api.event_path.clone()),
    );
    let cached = CacheLoader::new(Arc::clone(&cache), Arc::clone(&mapper), keys.clone());
    let loader = FallbackLoader::new(remote, cached, Arc::clone(&cache), mapper, keys);

    Self { loader, cache }
  }

  /// Get a single event, from the network if possible.
  pub async fn get_event(&self, id: &str) -> LoadResult<Loaded<Event>> {
    self.loader.load_with_source(id).await
  }

  /// Drop the cached copy of an event.
  pub async fn evict(&self, id: &str) -> LoadResult<()> {
    self.cache.remove(&self.loader.cache_key(id)).await
  }
}
