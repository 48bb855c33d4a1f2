//! Configuration Module
//!
//! Handles loading cache configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
/// Values are fixed once the cache layer is constructed.
#[derive(Debug, Clone)]
pub struct Config {
    /// Prefix shared by every key this cache writes to the underlying store
    pub namespace: String,
    /// Default TTL in milliseconds for entries stored without an explicit TTL
    pub default_ttl_ms: u64,
    /// Page size used when callers do not pick one
    pub page_size: u32,
    /// Background expiry sweep interval in seconds
    pub cleanup_interval: u64,
    /// Always fetch from the remote source, still writing results to the cache
    pub bypass_reads: bool,
    /// Backing file for persistent storage; in-memory when unset
    pub storage_path: Option<PathBuf>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_NAMESPACE` - Key prefix (default: `dtris_cache_`)
    /// - `CACHE_DEFAULT_TTL_MS` - Default TTL in milliseconds (default: 300000)
    /// - `CACHE_PAGE_SIZE` - Default page size (default: 20)
    /// - `CACHE_CLEANUP_INTERVAL` - Sweep frequency in seconds (default: 60)
    /// - `CACHE_BYPASS_READS` - `true`/`1` to skip cached reads (default: false)
    /// - `CACHE_STORAGE_PATH` - redb database file backing the store (default: unset)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            namespace: env::var("CACHE_NAMESPACE")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.namespace),
            default_ttl_ms: env::var("CACHE_DEFAULT_TTL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_ttl_ms),
            page_size: env::var("CACHE_PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|size: &u32| *size > 0)
                .unwrap_or(defaults.page_size),
            cleanup_interval: env::var("CACHE_CLEANUP_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|secs: &u64| *secs > 0)
                .unwrap_or(defaults.cleanup_interval),
            bypass_reads: env::var("CACHE_BYPASS_READS")
                .ok()
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.bypass_reads),
            storage_path: env::var("CACHE_STORAGE_PATH")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        }
    }

    /// Default TTL as a [`Duration`].
    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    /// Sweep interval as a [`Duration`], never shorter than one second.
    pub fn cleanup_period(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: "dtris_cache_".to_string(),
            default_ttl_ms: 5 * 60 * 1000,
            page_size: 20,
            cleanup_interval: 60,
            bypass_reads: false,
            storage_path: None,
        }
    }
}
