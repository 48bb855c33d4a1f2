//! Error types for the query cache
//!
//! Provides unified error handling using thiserror.
//!
//! Storage and serialization failures never reach callers of the cache: the
//! [`TtlCache`](crate::cache::TtlCache) converts them into misses or no-ops.
//! Only [`QueryError`] is surfaced, for caller bugs and remote fetch failures.

use thiserror::Error;

// == Cache Error Enum ==
/// Errors raised at the storage boundary.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The persistent store rejected the operation (offline, quota, permissions)
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Filesystem failure in a file-backed store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be encoded or a stored value could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed input such as an empty entity name
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

// == Query Error Enum ==
/// Errors visible to callers of the paginated query façade.
///
/// `E` is the remote data source's own error type and is carried unchanged.
#[derive(Error, Debug)]
pub enum QueryError<E> {
    /// Pagination parameters or entity name are invalid
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The remote fetch failed
    #[error("Remote fetch failed: {0}")]
    Fetch(#[source] E),
}

impl<E> QueryError<E> {
    /// Returns the remote error, if this is a fetch failure.
    pub fn into_fetch_error(self) -> Option<E> {
        match self {
            QueryError::Fetch(err) => Some(err),
            QueryError::InvalidArgument(_) => None,
        }
    }
}

impl<E> From<CacheError> for QueryError<E> {
    fn from(err: CacheError) -> Self {
        QueryError::InvalidArgument(err.to_string())
    }
}

// == Result Type Alias ==
/// Convenience Result type for storage operations.
pub type Result<T> = std::result::Result<T, CacheError>;
