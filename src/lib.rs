//! TTL Query Cache - persistent read cache for paginated remote queries
//!
//! Memoizes page-indexed query results in a namespaced key-value store with
//! per-entry expiry, and drops an entity's cached pages whenever it is
//! mutated locally or reported changed by a push channel.

pub mod cache;
pub mod config;
pub mod error;
pub mod invalidation;
pub mod layer;
pub mod query;
pub mod repository;
pub mod storage;
pub mod tasks;
pub mod telemetry;

pub use cache::{BestEffort, TtlCache};
pub use config::Config;
pub use error::{CacheError, QueryError};
pub use invalidation::InvalidationCoordinator;
pub use layer::CacheLayer;
pub use query::{Filters, PageRequest, PaginatedResult, QueryCache};
pub use repository::{RemoteSource, Repository};
pub use tasks::spawn_cleanup_task;
