//! Cache Layer
//!
//! Builds and wires the cache components once at startup. Hand the layer
//! (or its parts) to whatever needs data access; there is no global instance.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::info;

use crate::cache::TtlCache;
use crate::config::Config;
use crate::error::Result;
use crate::invalidation::{spawn_invalidation_listener, ChangeFeed, InvalidationCoordinator};
use crate::query::QueryCache;
use crate::repository::{RemoteSource, Repository};
use crate::storage::{FileStore, KeyValueStore, MemoryStore};
use crate::tasks::spawn_cleanup_task;

/// All cache components sharing one store and one namespace.
#[derive(Debug, Clone)]
pub struct CacheLayer {
    /// TTL cache store
    pub cache: Arc<TtlCache>,
    /// Paginated query façade
    pub queries: QueryCache,
    /// Mutation and change-notification invalidation
    pub invalidation: Arc<InvalidationCoordinator>,
    /// Push channel for out-of-band changes
    pub changes: ChangeFeed,
    config: Config,
}

impl CacheLayer {
    /// Opens the store named by `config.storage_path` (in-memory when unset)
    /// and builds the layer on it.
    pub async fn open(config: &Config) -> Result<Self> {
        let store: Arc<dyn KeyValueStore> = match &config.storage_path {
            Some(path) => {
                info!("Opening persistent cache store at {}", path.display());
                Arc::new(FileStore::open(path).await?)
            }
            None => {
                info!("Using in-memory cache store");
                Arc::new(MemoryStore::new())
            }
        };
        Self::from_config(config, store)
    }

    /// Builds the layer over an existing store.
    ///
    /// Fails if `config.namespace` is empty.
    pub fn from_config(config: &Config, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        Ok(Self::with_cache(config, TtlCache::from_config(config, store)?))
    }

    /// Builds the layer around a preconfigured cache (e.g. one with a custom clock).
    pub fn with_cache(config: &Config, cache: TtlCache) -> Self {
        let cache = Arc::new(cache);
        Self {
            queries: QueryCache::from_config(config, cache.clone()),
            invalidation: Arc::new(InvalidationCoordinator::new(cache.clone())),
            changes: ChangeFeed::new(),
            cache,
            config: config.clone(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// A repository for `entity` at the configured page size.
    pub fn repository<T>(
        &self,
        entity: impl Into<String>,
        source: Arc<dyn RemoteSource<T>>,
    ) -> Result<Repository<T>>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        Repository::new(
            entity,
            source,
            self.queries.clone(),
            self.invalidation.clone(),
            self.config.page_size,
        )
    }

    /// Starts the periodic expiry sweep at the configured interval.
    pub fn spawn_cleanup(&self) -> JoinHandle<()> {
        spawn_cleanup_task(self.cache.clone(), self.config.cleanup_period())
    }

    /// Starts forwarding events published on [`CacheLayer::changes`] to the
    /// invalidation coordinator.
    pub fn spawn_change_listener(&self) -> JoinHandle<()> {
        spawn_invalidation_listener(self.invalidation.clone(), self.changes.subscribe())
    }
}
