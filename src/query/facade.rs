//! Paginated query façade.
//!
//! Serves pages from the TTL cache when fresh and falls back to the caller's
//! fetcher otherwise, storing what it fetched.

use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::cache::TtlCache;
use crate::config::Config;
use crate::error::QueryError;
use crate::query::{CacheKey, Filters, PageRequest, PaginatedResult};

/// Read-through cache for paginated remote queries.
///
/// Concurrent misses for the same page are not coalesced; each calls its
/// fetcher and the last write wins.
#[derive(Debug, Clone)]
pub struct QueryCache {
    cache: Arc<TtlCache>,
    bypass_reads: bool,
}

impl QueryCache {
    pub fn new(cache: Arc<TtlCache>) -> Self {
        Self {
            cache,
            bypass_reads: false,
        }
    }

    pub fn from_config(config: &Config, cache: Arc<TtlCache>) -> Self {
        Self::new(cache).with_bypass_reads(config.bypass_reads)
    }

    /// When set, every query goes to the fetcher; results are still cached.
    pub fn with_bypass_reads(mut self, bypass: bool) -> Self {
        self.bypass_reads = bypass;
        self
    }

    pub fn cache(&self) -> &Arc<TtlCache> {
        &self.cache
    }

    // == Query ==
    /// Returns page `request` of `entity` filtered by `filters`.
    ///
    /// On a fresh cache hit the stored envelope is returned as is. On a miss
    /// `fetcher` is called, its result normalized to `request` (page fields,
    /// `total_pages`, rows truncated to `page_size`), stored with the default
    /// TTL, and returned.
    ///
    /// # Errors
    /// - [`QueryError::InvalidArgument`] for `page == 0`, `page_size == 0`, or
    ///   an unusable entity name. Checked before the cache or fetcher is touched.
    /// - [`QueryError::Fetch`] with the fetcher's error, unchanged. Nothing is cached.
    ///
    /// A result that JSON cannot round-trip (e.g. one holding `f64::NAN`) is
    /// returned but not cached, so the next identical query fetches again.
    pub async fn query<T, E, F, Fut>(
        &self,
        entity: &str,
        request: PageRequest,
        filters: &Filters,
        fetcher: F,
    ) -> Result<PaginatedResult<T>, QueryError<E>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(PageRequest, Filters) -> Fut,
        Fut: Future<Output = Result<PaginatedResult<T>, E>>,
    {
        request.validate()?;
        let key = CacheKey::page(entity, request, filters)?.to_string();

        if !self.bypass_reads {
            if let Some(hit) = self.cache.get::<PaginatedResult<T>>(&key).await {
                debug!("Query cache hit for {}", key);
                return Ok(hit);
            }
        }

        debug!("Query cache miss for {}, fetching", key);
        let fetched = fetcher(request, filters.clone())
            .await
            .map_err(QueryError::Fetch)?;
        let result = PaginatedResult::new(fetched.data, fetched.total, request);

        self.cache.set_checked(&key, &result, None).await;
        Ok(result)
    }
}
