use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use super::{ChannelKey, ProgressPublisher};
use crate::models::ProgressEvent;

/// Events buffered per owner for a subscriber that has not read yet. Delivery
/// is best effort: a subscriber further behind than this skips the oldest
/// events and is told how many it missed (`RecvError::Lagged`). A job emits
/// at most eight events, so this covers a few dozen concurrent jobs per owner.
const CHANNEL_CAPACITY: usize = 256;

/// In-process registry of live subscribers, one broadcast channel per owner.
#[derive(Clone, Default)]
pub struct ProgressHub {
    channels: Arc<RwLock<HashMap<ChannelKey, broadcast::Sender<ProgressEvent>>>>,
}

impl ProgressHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in `key`. Dropping the receiver unsubscribes.
    pub async fn subscribe(&self, key: ChannelKey) -> broadcast::Receiver<ProgressEvent> {
        let mut guard = self.channels.write().await;
        guard
            .entry(key)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    #[cfg(test)]
    pub async fn subscriber_count(&self, key: ChannelKey) -> usize {
        let guard = self.channels.read().await;
        guard.get(&key).map(|tx| tx.receiver_count()).unwrap_or(0)
    }

    /// Deliver to current subscribers; returns how many received it.
    pub async fn deliver(&self, key: ChannelKey, event: ProgressEvent) -> usize {
        let delivered = {
            let guard = self.channels.read().await;
            match guard.get(&key) {
                Some(tx) => tx.send(event).unwrap_or(0),
                None => 0,
            }
        };

        if delivered == 0 {
            debug!(owner_id = %key.owner_id(), "No live subscriber, progress event dropped");
            self.prune(key).await;
        }
        delivered
    }

    async fn prune(&self, key: ChannelKey) {
        let mut guard = self.channels.write().await;
        if guard.get(&key).is_some_and(|tx| tx.receiver_count() == 0) {
            guard.remove(&key);
        }
    }
}

#[async_trait]
impl ProgressPublisher for ProgressHub {
    async fn publish(&self, key: ChannelKey, event: ProgressEvent) {
        self.deliver(key, event).await;
    }
}
