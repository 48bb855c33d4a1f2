//! Cache Module
//!
//! Persistent TTL cache with namespace isolation and fail-soft semantics.

mod clock;
mod entry;
mod outcome;
mod stats;
mod store;


// Re-export public types
pub use clock::{current_timestamp_ms, Clock, ManualClock, SystemClock};
pub use entry::CacheEntry;
pub use outcome::BestEffort;
pub use stats::CacheStats;
pub use store::TtlCache;

// == Public Constants ==
/// Separates the entity segment from parameter segments in structured keys
pub const SEGMENT_DELIMITER: char = ':';
