//! Change notification channel.
//!
//! A broadcast hub for "entity changed elsewhere" events, and a listener
//! task that turns each event into a cache invalidation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::invalidation::InvalidationCoordinator;

/// The capacity of the broadcast channel.
/// Listeners that fall behind by more than this many events will miss some.
const CHANNEL_CAPACITY: usize = 256;

/// Kind of row change reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One out-of-band change to an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    /// Entity (table) that changed
    #[serde(alias = "table")]
    pub entity: String,
    #[serde(rename = "eventType")]
    pub kind: ChangeKind,
    /// When the change was committed, if the sender said
    #[serde(default = "Utc::now", alias = "commit_timestamp")]
    pub occurred_at: DateTime<Utc>,
}

impl ChangeEvent {
    /// An event stamped with the current time.
    pub fn new(entity: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            entity: entity.into(),
            kind,
            occurred_at: Utc::now(),
        }
    }
}

/// Pub-sub hub for change events.
///
/// Clone freely; all clones share one channel.
#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publishes an event. Returns how many listeners will see it.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        // A send error only means nobody is listening
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ChangeFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFeed")
            .field("subscriber_count", &self.sender.receiver_count())
            .finish()
    }
}

/// Spawns a task that invalidates the cache for every received event.
///
/// If the receiver lags and events are lost, the whole namespace is cleared
/// since the affected entities are unknown. The task ends when every sender
/// is dropped; abort the handle to stop it earlier.
pub fn spawn_invalidation_listener(
    coordinator: Arc<InvalidationCoordinator>,
    mut events: broadcast::Receiver<ChangeEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting change notification listener");

        loop {
            match events.recv().await {
                Ok(event) => {
                    debug!("Received {:?} change for {}", event.kind, event.entity);
                    coordinator
                        .on_remote_change_notification(&event.entity)
                        .await;
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!("Missed {} change notifications, clearing cache", missed);
                    coordinator.on_session_end().await;
                }
                Err(RecvError::Closed) => {
                    info!("Change notification channel closed");
                    break;
                }
            }
        }
    })
}
