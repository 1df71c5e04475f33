//! Stage-progress pub/sub keyed by owning caller.
//!
//! The orchestrator depends only on [`ProgressPublisher::publish`]. Delivery
//! is best-effort: an event published while nobody is subscribed to the
//! owner's channel is dropped, with no replay on reconnect. Events for one
//! channel reach each subscriber in publish order.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::ProgressEvent;

pub mod hub;
pub mod redis;

pub use hub::ProgressHub;
pub use self::redis::{spawn_redis_bridge, RedisProgressPublisher};

/// Channel identity; one channel per owning caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelKey(Uuid);

impl ChannelKey {
    pub fn owner(owner_id: Uuid) -> Self {
        Self(owner_id)
    }

    pub fn owner_id(&self) -> Uuid {
        self.0
    }

    /// Redis channel name.
    pub fn topic(&self) -> String {
        format!("{}{}", redis::TOPIC_PREFIX, self.0)
    }
}

#[async_trait]
pub trait ProgressPublisher: Send + Sync {
    async fn publish(&self, key: ChannelKey, event: ProgressEvent);
}
