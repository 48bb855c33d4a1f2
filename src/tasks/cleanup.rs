//! TTL Cleanup Task
//!
//! Background task that periodically removes expired cache entries, so
//! entries that are never read again do not linger in the persistent store.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{BestEffort, TtlCache};

/// Spawns a background task that periodically purges expired cache entries.
///
/// The task runs in an infinite loop, sleeping for `interval` between
/// sweeps. Sweep failures are logged and retried on the next tick.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during shutdown.
///
/// # Example
/// ```ignore
/// let cleanup_handle = spawn_cleanup_task(cache.clone(), Duration::from_secs(60));
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(cache: Arc<TtlCache>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Starting TTL cleanup task with interval of {} ms",
            interval.as_millis()
        );

        loop {
            tokio::time::sleep(interval).await;

            match cache.purge_expired().await {
                BestEffort::Done(0) => debug!("TTL cleanup: no expired entries found"),
                BestEffort::Done(removed) => {
                    info!("TTL cleanup: removed {} expired entries", removed)
                }
                BestEffort::Degraded => warn!("TTL cleanup: sweep skipped, storage unavailable"),
            }
        }
    })
}
