//! Invalidation Coordinator
//!
//! Drops cached pages for an entity after it changes, locally or remotely.

use std::sync::Arc;

use tracing::{debug, info};

use crate::cache::{BestEffort, TtlCache};

/// Routes mutation and change signals to cache invalidation.
///
/// Every method completes its storage work before returning, so a query
/// issued afterwards cannot observe an entry that was invalidated. Storage
/// failures are swallowed; the worst outcome is staleness until the entry's
/// TTL runs out.
#[derive(Debug, Clone)]
pub struct InvalidationCoordinator {
    cache: Arc<TtlCache>,
}

impl InvalidationCoordinator {
    pub fn new(cache: Arc<TtlCache>) -> Self {
        Self { cache }
    }

    // == On Mutation ==
    /// Call after a successful create, update or delete against `entity`.
    ///
    /// Returns the number of cached entries dropped.
    pub async fn on_mutation(&self, entity: &str) -> BestEffort<usize> {
        let outcome = self.cache.invalidate_entity(entity).await;
        debug!("Invalidated {:?} cached entries after {} mutation", outcome, entity);
        outcome
    }

    // == On Remote Change ==
    /// Call when a push channel reports that `entity` changed elsewhere.
    pub async fn on_remote_change_notification(&self, entity: &str) -> BestEffort<usize> {
        let outcome = self.cache.invalidate_entity(entity).await;
        debug!("Invalidated {:?} cached entries after remote {} change", outcome, entity);
        outcome
    }

    // == On Session End ==
    /// Drops the whole namespace, e.g. on sign-out or after missed notifications.
    pub async fn on_session_end(&self) -> BestEffort<usize> {
        let outcome = self.cache.clear().await;
        info!("Cleared query cache: {:?}", outcome);
        outcome
    }
}
