//! Storage Module
//!
//! The persistent key-value store the cache writes through to. Keys and
//! values are plain strings; the store knows nothing about TTLs.

mod file;
mod memory;

use async_trait::async_trait;

use crate::error::Result;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Asynchronous string key-value store shared process-wide.
///
/// Implementations may fail on any call; the cache treats every error as
/// a miss or a dropped write.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Writes `value` under `key`, replacing any previous value.
    async fn set_item(&self, key: &str, value: String) -> Result<()>;

    /// Reads the value stored under `key`.
    async fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Removes `key`. Removing an absent key is not an error.
    async fn remove_item(&self, key: &str) -> Result<()>;

    /// Lists every key in the store, including keys owned by other users of it.
    async fn all_keys(&self) -> Result<Vec<String>>;

    /// Removes all of `keys` in one call.
    async fn multi_remove(&self, keys: &[String]) -> Result<()>;
}
