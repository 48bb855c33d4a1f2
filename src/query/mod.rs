//! Query Module
//!
//! Page-indexed result envelopes, canonical cache keys, and the read-through
//! façade in front of a remote data source.

mod facade;
mod key;
mod page;

pub use facade::QueryCache;
pub use key::{validate_entity, CacheKey, Filters};
pub use page::{total_pages, PageRequest, PaginatedResult};
