//! Cache Store Module
//!
//! TTL cache engine layered over a [`KeyValueStore`]. Every operation is
//! fail-soft: storage and serialization errors are logged and turned into a
//! miss or a dropped write, never returned to the caller.

use std::sync::Arc;
use std::time::Duration;

use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::clock::{Clock, SystemClock};
use crate::cache::stats::StatsRecorder;
use crate::cache::{BestEffort, CacheEntry, CacheStats, SEGMENT_DELIMITER};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::storage::KeyValueStore;

// == TTL Cache ==
/// Namespaced TTL cache over a shared persistent store.
///
/// Construct one per process and share it behind an `Arc`.
pub struct TtlCache {
    /// Underlying persistent store, possibly shared with unrelated data
    store: Arc<dyn KeyValueStore>,
    /// Time source for expiry decisions
    clock: Arc<dyn Clock>,
    /// Prefix of every key owned by this cache
    namespace: String,
    /// TTL applied when `set` is called without one
    default_ttl: Duration,
    /// Performance counters
    stats: StatsRecorder,
}

impl std::fmt::Debug for TtlCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("namespace", &self.namespace)
            .field("default_ttl", &self.default_ttl)
            .field("clock", &self.clock)
            .finish()
    }
}

impl TtlCache {
    // == Constructor ==
    /// Creates a cache writing to `store` under `namespace`, using the system clock.
    ///
    /// Fails with [`CacheError::InvalidArgument`] if `namespace` is empty, since
    /// every key in the store would then belong to this cache.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        namespace: impl Into<String>,
        default_ttl: Duration,
    ) -> Result<Self> {
        let namespace = namespace.into();
        if namespace.is_empty() {
            return Err(CacheError::InvalidArgument(
                "cache namespace must not be empty".to_string(),
            ));
        }
        Ok(Self {
            store,
            clock: Arc::new(SystemClock),
            namespace,
            default_ttl,
            stats: StatsRecorder::default(),
        })
    }

    /// Creates a cache from configuration.
    pub fn from_config(config: &Config, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        Self::new(store, config.namespace.clone(), config.default_ttl())
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Key under which `key` is written to the underlying store.
    pub fn storage_key(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }

    // == Set ==
    /// Stores `value` under `key`, replacing any previous entry.
    ///
    /// `ttl` falls back to the configured default. If the write fails the
    /// key is also removed, so a previous value is never served in its place.
    pub async fn set<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> BestEffort
    where
        T: Serialize + ?Sized,
    {
        let storage_key = self.storage_key(key);
        match self.encode(value, ttl) {
            Ok(serialized) => self.write(&storage_key, serialized).await,
            Err(err) => self.reject(&storage_key, err).await,
        }
    }

    /// Like [`TtlCache::set`], but refuses values that would not read back
    /// as `T`.
    ///
    /// JSON has no encoding for some values (`f64::NAN` becomes `null`), so a
    /// plain `set` of them succeeds while every later `get` misses. This
    /// decodes the encoded entry first and treats a mismatch as a failed write.
    pub async fn set_checked<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> BestEffort
    where
        T: Serialize + DeserializeOwned,
    {
        let storage_key = self.storage_key(key);
        let serialized = match self.encode(value, ttl) {
            Ok(serialized) => serialized,
            Err(err) => return self.reject(&storage_key, err).await,
        };
        if let Err(err) = serde_json::from_str::<CacheEntry<T>>(&serialized) {
            return self.reject(&storage_key, err).await;
        }
        self.write(&storage_key, serialized).await
    }

    fn encode<T>(&self, value: &T, ttl: Option<Duration>) -> serde_json::Result<String>
    where
        T: Serialize + ?Sized,
    {
        let ttl_ms = duration_ms(ttl.unwrap_or(self.default_ttl));
        serde_json::to_string(&CacheEntry::new(value, self.clock.now_ms(), ttl_ms))
    }

    async fn write(&self, storage_key: &str, serialized: String) -> BestEffort {
        match self.store.set_item(storage_key, serialized).await {
            Ok(()) => {
                self.stats.record_write();
                BestEffort::Done(())
            }
            Err(err) => self.reject(storage_key, err).await,
        }
    }

    /// Records a failed write and drops whatever the key held before.
    async fn reject(&self, storage_key: &str, err: impl std::fmt::Display) -> BestEffort {
        warn!("Cache set failed for {}: {}", storage_key, err);
        self.stats.record_storage_error();
        self.discard(storage_key).await;
        BestEffort::Degraded
    }

    // == Get ==
    /// Retrieves the value stored under `key`.
    ///
    /// Returns `None` when the key is absent, expired, unreadable, or the
    /// store fails. Expired entries are removed as a side effect.
    pub async fn get<T>(&self, key: &str) -> Option<T>
    where
        T: DeserializeOwned,
    {
        let storage_key = self.storage_key(key);

        let raw = match self.store.get_item(&storage_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.stats.record_miss();
                return None;
            }
            Err(err) => {
                warn!("Cache get failed for {}: {}", storage_key, err);
                self.stats.record_storage_error();
                self.stats.record_miss();
                return None;
            }
        };

        let entry: CacheEntry<T> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(err) => {
                warn!("Cache get failed for {}: unreadable entry: {}", storage_key, err);
                self.stats.record_storage_error();
                self.stats.record_miss();
                return None;
            }
        };

        if entry.is_expired_at(self.clock.now_ms()) {
            debug!("Cache entry {} expired", storage_key);
            self.discard(&storage_key).await;
            self.stats.record_expired(1);
            self.stats.record_miss();
            return None;
        }

        self.stats.record_hit();
        Some(entry.data)
    }

    // == Delete ==
    /// Removes the entry for `key`. Absent keys are a no-op.
    pub async fn delete(&self, key: &str) -> BestEffort {
        let storage_key = self.storage_key(key);
        match self.store.remove_item(&storage_key).await {
            Ok(()) => {
                self.stats.record_invalidated(1);
                BestEffort::Done(())
            }
            Err(err) => {
                warn!("Cache delete failed for {}: {}", storage_key, err);
                self.stats.record_storage_error();
                BestEffort::Degraded
            }
        }
    }

    // == Clear ==
    /// Removes every entry in this cache's namespace. Other keys in the
    /// store are untouched. Returns the number of keys removed.
    pub async fn clear(&self) -> BestEffort<usize> {
        self.remove_matching("clear", |_| true).await
    }

    // == Invalidate Pattern ==
    /// Removes every namespaced entry whose full key contains `pattern`.
    ///
    /// Plain substring match: `"user"` also hits `users_extended` keys.
    /// Prefer [`TtlCache::invalidate_entity`] for structured keys.
    pub async fn invalidate_pattern(&self, pattern: &str) -> BestEffort<usize> {
        self.remove_matching("invalidate pattern", |key| key.contains(pattern))
            .await
    }

    // == Invalidate Entity ==
    /// Removes every entry whose first key segment is exactly `entity`.
    ///
    /// Matches `<namespace><entity>` and `<namespace><entity>:...`, so
    /// `"user"` never touches `users` or `user_roles`.
    pub async fn invalidate_entity(&self, entity: &str) -> BestEffort<usize> {
        self.remove_matching("invalidate entity", |key| {
            entity_segment(&key[self.namespace.len()..]) == entity
        })
        .await
    }

    // == Purge Expired ==
    /// Removes expired and unreadable entries from the namespace.
    ///
    /// Keys that cannot be read during the sweep are skipped.
    pub async fn purge_expired(&self) -> BestEffort<usize> {
        let keys = match self.namespaced_keys("purge").await {
            Some(keys) => keys,
            None => return BestEffort::Degraded,
        };

        let now = self.clock.now_ms();
        let mut doomed = Vec::new();
        for key in keys {
            match self.store.get_item(&key).await {
                Ok(Some(raw)) => match serde_json::from_str::<CacheEntry<IgnoredAny>>(&raw) {
                    Ok(entry) if !entry.is_expired_at(now) => {}
                    _ => doomed.push(key),
                },
                Ok(None) => {}
                Err(err) => {
                    warn!("Cache purge skipped {}: {}", key, err);
                    self.stats.record_storage_error();
                }
            }
        }

        if doomed.is_empty() {
            return BestEffort::Done(0);
        }

        match self.store.multi_remove(&doomed).await {
            Ok(()) => {
                self.stats.record_expired(doomed.len());
                BestEffort::Done(doomed.len())
            }
            Err(err) => {
                warn!("Cache purge failed: {}", err);
                self.stats.record_storage_error();
                BestEffort::Degraded
            }
        }
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    // == Helpers ==
    async fn namespaced_keys(&self, op: &str) -> Option<Vec<String>> {
        match self.store.all_keys().await {
            Ok(keys) => Some(
                keys.into_iter()
                    .filter(|key| key.starts_with(&self.namespace))
                    .collect(),
            ),
            Err(err) => {
                warn!("Cache {} failed: {}", op, err);
                self.stats.record_storage_error();
                None
            }
        }
    }

    /// Enumerates namespaced keys, keeps those satisfying `matches`, and
    /// bulk-removes them.
    async fn remove_matching<F>(&self, op: &str, matches: F) -> BestEffort<usize>
    where
        F: Fn(&str) -> bool,
    {
        let keys = match self.namespaced_keys(op).await {
            Some(keys) => keys,
            None => return BestEffort::Degraded,
        };

        let doomed: Vec<String> = keys
            .into_iter()
            .filter(|key| matches(key))
            .collect();

        if doomed.is_empty() {
            return BestEffort::Done(0);
        }

        match self.store.multi_remove(&doomed).await {
            Ok(()) => {
                debug!("Cache {} removed {} entries", op, doomed.len());
                self.stats.record_invalidated(doomed.len());
                BestEffort::Done(doomed.len())
            }
            Err(err) => {
                warn!("Cache {} failed: {}", op, err);
                self.stats.record_storage_error();
                BestEffort::Degraded
            }
        }
    }

    async fn discard(&self, storage_key: &str) {
        if let Err(err) = self.store.remove_item(storage_key).await {
            warn!("Cache delete failed for {}: {}", storage_key, err);
            self.stats.record_storage_error();
        }
    }
}

/// First segment of an un-prefixed key.
fn entity_segment(rest: &str) -> &str {
    rest.split(SEGMENT_DELIMITER).next().unwrap_or(rest)
}

fn duration_ms(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::storage::MemoryStore;
    use serde_json::{json, Value};

    const NS: &str = "dtris_cache_";

    fn cache_with(store: Arc<MemoryStore>, clock: Arc<ManualClock>) -> TtlCache {
        TtlCache::new(store, NS, Duration::from_secs(300))
            .unwrap()
            .with_clock(clock)
    }

    fn fresh() -> (TtlCache, Arc<MemoryStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(0));
        (cache_with(store.clone(), clock.clone()), store, clock)
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let (cache, store, _) = fresh();

        assert!(cache.set("key1", &json!({"name": "Test"}), None).await.is_done());
        let value: Option<Value> = cache.get("key1").await;

        assert_eq!(value, Some(json!({"name": "Test"})));
        assert_eq!(store.all_keys().await.unwrap(), vec!["dtris_cache_key1".to_string()]);
    }

    #[tokio::test]
    async fn test_set_writes_expected_envelope() {
        let (cache, store, clock) = fresh();
        clock.set(1_000);

        cache
            .set("test-key", &json!({"name": "Test", "value": 123}), Some(Duration::from_secs(60)))
            .await;

        let raw = store.get_item("dtris_cache_test-key").await.unwrap().unwrap();
        assert!(raw.contains(r#""data":{"name":"Test","value":123}"#));
        assert!(raw.contains(r#""expiresAt":61000"#));
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let (cache, _, _) = fresh();
        assert_eq!(cache.get::<String>("nonexistent").await, None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_default_ttl_applies() {
        let (cache, _, clock) = fresh();
        cache.set("k", "v", None).await;

        clock.set(300_000);
        assert_eq!(cache.get::<String>("k").await.as_deref(), Some("v"));
        clock.set(300_001);
        assert_eq!(cache.get::<String>("k").await, None);
    }

    #[tokio::test]
    async fn test_expired_entry_removed_on_read() {
        let (cache, store, clock) = fresh();
        cache.set("k", "v", Some(Duration::from_millis(10))).await;

        clock.advance(11);
        assert_eq!(cache.get::<String>("k").await, None);
        assert!(store.is_empty().await);

        let stats = cache.stats();
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_overwrite_resets_ttl() {
        let (cache, _, clock) = fresh();
        cache.set("k", "v1", Some(Duration::from_millis(100))).await;
        clock.advance(50);
        cache.set("k", "v2", Some(Duration::from_millis(1_000))).await;

        clock.advance(500);
        assert_eq!(cache.get::<String>("k").await.as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_corrupted_entry_is_a_miss() {
        let (cache, store, _) = fresh();
        store
            .set_item("dtris_cache_corrupted-key", "invalid-json".to_string())
            .await
            .unwrap();

        assert_eq!(cache.get::<Value>("corrupted-key").await, None);
        assert_eq!(cache.stats().storage_errors, 1);
    }

    #[tokio::test]
    async fn test_wrong_shape_is_a_miss() {
        let (cache, _, _) = fresh();
        cache.set("k", &json!({"name": "A"}), None).await;
        assert_eq!(cache.get::<Vec<u32>>("k").await, None);
    }

    #[tokio::test]
    async fn test_delete() {
        let (cache, _, _) = fresh();
        cache.set("k", "v", None).await;

        assert!(cache.delete("k").await.is_done());
        assert_eq!(cache.get::<String>("k").await, None);
        assert!(cache.delete("k").await.is_done(), "deleting absent key is a no-op");
    }

    #[tokio::test]
    async fn test_clear_only_touches_namespace() {
        let (cache, store, _) = fresh();
        for key in ["key1", "key2", "key3"] {
            cache.set(key, "v", None).await;
        }
        store.set_item("other_key", "keep".to_string()).await.unwrap();

        assert_eq!(cache.clear().await, BestEffort::Done(3));
        assert_eq!(store.all_keys().await.unwrap(), vec!["other_key".to_string()]);
    }

    #[tokio::test]
    async fn test_invalidate_pattern() {
        let (cache, store, _) = fresh();
        for key in ["users_1", "users_2", "vehicles_1"] {
            cache.set(key, "v", None).await;
        }
        store.set_item("other_key", "keep".to_string()).await.unwrap();

        assert_eq!(cache.invalidate_pattern("users").await, BestEffort::Done(2));

        let mut keys = store.all_keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["dtris_cache_vehicles_1".to_string(), "other_key".to_string()]);
    }

    #[tokio::test]
    async fn test_invalidate_entity_matches_whole_segment() {
        let (cache, _, _) = fresh();
        for key in ["user:1:20:", "user:2:20:", "users:1:20:", "user_roles:1:20:", "user"] {
            cache.set(key, "v", None).await;
        }

        assert_eq!(cache.invalidate_entity("user").await, BestEffort::Done(3));
        assert!(cache.get::<String>("users:1:20:").await.is_some());
        assert!(cache.get::<String>("user_roles:1:20:").await.is_some());
        assert!(cache.get::<String>("user:1:20:").await.is_none());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (cache, store, clock) = fresh();
        cache.set("short", "v", Some(Duration::from_millis(100))).await;
        cache.set("long", "v", Some(Duration::from_secs(10))).await;
        store
            .set_item("dtris_cache_garbage", "{".to_string())
            .await
            .unwrap();
        store.set_item("foreign", "{".to_string()).await.unwrap();

        clock.advance(1_000);
        assert_eq!(cache.purge_expired().await, BestEffort::Done(2));

        let mut keys = store.all_keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["dtris_cache_long".to_string(), "foreign".to_string()]);
    }

    #[tokio::test]
    async fn test_stats() {
        let (cache, _, _) = fresh();
        cache.set("k", "v", None).await;
        let _ = cache.get::<String>("k").await;
        let _ = cache.get::<String>("missing").await;

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.writes, 1);
    }

    #[test]
    fn test_empty_namespace_rejected() {
        let result = TtlCache::new(Arc::new(MemoryStore::new()), "", Duration::from_secs(300));
        assert!(matches!(result, Err(CacheError::InvalidArgument(_))));

        let config = Config {
            namespace: String::new(),
            ..Config::default()
        };
        let result = TtlCache::from_config(&config, Arc::new(MemoryStore::new()));
        assert!(matches!(result, Err(CacheError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_set_checked_stores_values_that_read_back() {
        let (cache, _, _) = fresh();

        assert!(cache.set_checked("scores", &vec![1.5f64, 2.0], None).await.is_done());
        assert_eq!(cache.get::<Vec<f64>>("scores").await, Some(vec![1.5, 2.0]));
        assert_eq!(cache.stats().writes, 1);
    }

    #[tokio::test]
    async fn test_set_checked_refuses_values_json_cannot_hold() {
        let (cache, store, _) = fresh();
        cache.set_checked("scores", &vec![1.0f64], None).await;

        // NaN encodes as null and would never decode back to f64
        assert_eq!(
            cache.set_checked("scores", &vec![f64::NAN], None).await,
            BestEffort::Degraded
        );

        let stats = cache.stats();
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.storage_errors, 1);
        assert!(store.is_empty().await);
        assert_eq!(cache.get::<Vec<f64>>("scores").await, None);
    }

    #[test]
    fn test_entity_segment() {
        assert_eq!(entity_segment("users:1:20:"), "users");
        assert_eq!(entity_segment("users"), "users");
        assert_eq!(entity_segment(""), "");
    }
}
