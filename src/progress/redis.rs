//! Cross-instance progress fan-out over Redis pub/sub.
//!
//! With fan-out enabled, the publisher only `PUBLISH`es; every instance runs
//! a bridge that pattern-subscribes to all progress topics and hands events to
//! its local [`ProgressHub`]. Events therefore reach a WebSocket client no
//! matter which instance ran the job, and are never delivered twice.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{ChannelKey, ProgressHub, ProgressPublisher};
use crate::models::ProgressEvent;

pub(crate) const TOPIC_PREFIX: &str = "progress:";
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

pub struct RedisProgressPublisher {
    conn: ConnectionManager,
    /// Used when Redis is unreachable so same-instance subscribers still hear about the job.
    fallback: ProgressHub,
}

impl RedisProgressPublisher {
    pub async fn connect(client: redis::Client, fallback: ProgressHub) -> redis::RedisResult<Self> {
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn, fallback })
    }
}

#[async_trait]
impl ProgressPublisher for RedisProgressPublisher {
    async fn publish(&self, key: ChannelKey, event: ProgressEvent) {
        let payload = match serde_json::to_string(&event) {
            Ok(p) => p,
            Err(e) => {
                error!(error = %e, "Failed to encode progress event");
                return;
            }
        };

        let mut conn = self.conn.clone();
        let result: redis::RedisResult<i64> = conn.publish(key.topic(), payload).await;
        match result {
            Ok(receivers) => debug!(topic = %key.topic(), receivers, "Published progress event"),
            Err(e) => {
                warn!(error = %e, "Redis publish failed, delivering locally");
                self.fallback.deliver(key, event).await;
            }
        }
    }
}

/// Forward every `progress:*` message into `hub` until the task is aborted.
pub fn spawn_redis_bridge(client: redis::Client, hub: ProgressHub) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Err(e) = run_bridge(&client, &hub).await {
                warn!(error = %e, "Progress bridge disconnected, reconnecting");
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    })
}

async fn run_bridge(client: &redis::Client, hub: &ProgressHub) -> redis::RedisResult<()> {
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.psubscribe(format!("{}*", TOPIC_PREFIX)).await?;
    info!("Progress bridge subscribed to Redis");

    let mut messages = pubsub.on_message();
    while let Some(msg) = messages.next().await {
        let payload: String = match msg.get_payload() {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "Skipping non-text progress payload");
                continue;
            }
        };
        match decode_event(msg.get_channel_name(), &payload) {
            Some((key, event)) => {
                hub.deliver(key, event).await;
            }
            None => warn!(channel = msg.get_channel_name(), "Skipping malformed progress message"),
        }
    }

    Ok(())
}

/// Parse a bridged message, rejecting payloads whose owner disagrees with the topic.
fn decode_event(channel: &str, payload: &str) -> Option<(ChannelKey, ProgressEvent)> {
    let owner = channel.strip_prefix(TOPIC_PREFIX)?.parse().ok()?;
    let event: ProgressEvent = serde_json::from_str(payload).ok()?;
    if event.owner_id != owner {
        return None;
    }
    Some((ChannelKey::owner(owner), event))
}
