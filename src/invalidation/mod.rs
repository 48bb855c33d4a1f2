//! Invalidation Module
//!
//! Write-through invalidation on local mutations and remote change
//! notifications.

mod coordinator;
mod notify;

pub use coordinator::InvalidationCoordinator;
pub use notify::{spawn_invalidation_listener, ChangeEvent, ChangeFeed, ChangeKind};
