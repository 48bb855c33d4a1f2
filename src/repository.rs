//! Repository Module
//!
//! Caller-facing data access for one entity: cached page listing and
//! mutations that invalidate the entity's pages on success.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{QueryError, Result};
use crate::invalidation::InvalidationCoordinator;
use crate::query::{validate_entity, Filters, PageRequest, PaginatedResult, QueryCache};

/// Remote relational backend for one entity.
///
/// Mirrors a count-then-range read: the total is counted separately from
/// the page of rows.
#[async_trait]
pub trait RemoteSource<T>: Send + Sync {
    /// Number of rows matching `filters`.
    async fn count(&self, filters: &Filters) -> anyhow::Result<u64>;

    /// Up to `limit` rows matching `filters`, starting at row `offset`.
    async fn fetch_range(&self, offset: u64, limit: u32, filters: &Filters)
        -> anyhow::Result<Vec<T>>;
}

/// Cached access to a single entity.
pub struct Repository<T> {
    entity: String,
    source: Arc<dyn RemoteSource<T>>,
    queries: QueryCache,
    invalidation: Arc<InvalidationCoordinator>,
    page_size: u32,
}

impl<T> Repository<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    /// Creates a repository for `entity`.
    ///
    /// Fails if `entity` is empty or contains the key delimiter, or if
    /// `page_size` is 0.
    pub fn new(
        entity: impl Into<String>,
        source: Arc<dyn RemoteSource<T>>,
        queries: QueryCache,
        invalidation: Arc<InvalidationCoordinator>,
        page_size: u32,
    ) -> Result<Self> {
        let entity = entity.into();
        validate_entity(&entity)?;
        PageRequest::new(1, page_size)?;
        Ok(Self {
            entity,
            source,
            queries,
            invalidation,
            page_size,
        })
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    // == List ==
    /// Page `page` at the default page size.
    pub async fn list(
        &self,
        page: u32,
        filters: &Filters,
    ) -> std::result::Result<PaginatedResult<T>, QueryError<anyhow::Error>> {
        self.list_page(
            PageRequest {
                page,
                page_size: self.page_size,
            },
            filters,
        )
        .await
    }

    /// Any page, served from cache when fresh.
    pub async fn list_page(
        &self,
        request: PageRequest,
        filters: &Filters,
    ) -> std::result::Result<PaginatedResult<T>, QueryError<anyhow::Error>> {
        let source = self.source.clone();
        self.queries
            .query(&self.entity, request, filters, |request, filters| async move {
                let total = source.count(&filters).await?;
                let rows = source
                    .fetch_range(request.offset(), request.page_size, &filters)
                    .await?;
                Ok::<_, anyhow::Error>(PaginatedResult::new(rows, total, request))
            })
            .await
    }

    // == Mutate ==
    /// Runs a write against the backend and, if it succeeds, invalidates
    /// every cached page of this entity before returning.
    ///
    /// A failed write leaves the cache untouched and returns its error as is.
    pub async fn mutate<R, Fut>(&self, write: Fut) -> anyhow::Result<R>
    where
        Fut: Future<Output = anyhow::Result<R>>,
    {
        let output = write.await?;
        self.invalidation.on_mutation(&self.entity).await;
        Ok(output)
    }
}

impl<T> std::fmt::Debug for Repository<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("entity", &self.entity)
            .field("page_size", &self.page_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TtlCache;
    use crate::storage::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::RwLock;

    /// Backend holding plates newest-first.
    #[derive(Default)]
    struct Plates {
        rows: RwLock<Vec<String>>,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl RemoteSource<String> for Plates {
        async fn count(&self, _filters: &Filters) -> anyhow::Result<u64> {
            Ok(self.rows.read().await.len() as u64)
        }

        async fn fetch_range(
            &self,
            offset: u64,
            limit: u32,
            _filters: &Filters,
        ) -> anyhow::Result<Vec<String>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .rows
                .read()
                .await
                .iter()
                .skip(offset as usize)
                .take(limit as usize)
                .cloned()
                .collect())
        }
    }

    fn repository(source: Arc<Plates>) -> Repository<String> {
        let cache = Arc::new(TtlCache::new(
            Arc::new(MemoryStore::new()),
            "test_",
            Duration::from_secs(60),
        )
        .unwrap());
        Repository::<String>::new(
            "vehicles",
            source,
            QueryCache::new(cache.clone()),
            Arc::new(InvalidationCoordinator::new(cache)),
            2,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_list_uses_count_and_range() {
        let source = Arc::new(Plates::default());
        *source.rows.write().await = vec!["A-1".into(), "B-2".into(), "C-3".into()];
        let repo = repository(source.clone());

        let page = repo.list(2, &Filters::new()).await.unwrap();
        assert_eq!(page.data, vec!["C-3".to_string()]);
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);

        repo.list(2, &Filters::new()).await.unwrap();
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_mutation_invalidates_pages() {
        let source = Arc::new(Plates::default());
        *source.rows.write().await = vec!["A-1".into()];
        let repo = repository(source.clone());
        repo.list(1, &Filters::new()).await.unwrap();

        let rows = source.clone();
        repo.mutate(async move {
            rows.rows.write().await.insert(0, "Z-9".into());
            Ok::<_, anyhow::Error>(())
        })
        .await
        .unwrap();

        let page = repo.list(1, &Filters::new()).await.unwrap();
        assert_eq!(page.data, vec!["Z-9".to_string(), "A-1".to_string()]);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_mutation_keeps_cache() {
        let source = Arc::new(Plates::default());
        let repo = repository(source.clone());
        repo.list(1, &Filters::new()).await.unwrap();

        let result: anyhow::Result<()> = repo
            .mutate(async { Err(anyhow::anyhow!("permission denied")) })
            .await;
        assert_eq!(result.unwrap_err().to_string(), "permission denied");

        repo.list(1, &Filters::new()).await.unwrap();
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_page_zero_is_caller_error() {
        let repo = repository(Arc::new(Plates::default()));
        let result = repo.list(0, &Filters::new()).await;
        assert!(matches!(result, Err(QueryError::InvalidArgument(_))));
    }

    #[test]
    fn test_rejects_bad_entity() {
        let cache = Arc::new(TtlCache::new(
            Arc::new(MemoryStore::new()),
            "test_",
            Duration::from_secs(60),
        )
        .unwrap());
        let result = Repository::<String>::new(
            "a:b",
            Arc::new(Plates::default()),
            QueryCache::new(cache.clone()),
            Arc::new(InvalidationCoordinator::new(cache)),
            20,
        );
        assert!(result.is_err());
    }
}
