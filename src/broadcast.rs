//! Fire-and-forget fan-out of named events on named channels.
//!
//! Delivery is at-least-once and receivers are expected to be idempotent.
//! Publish failures are logged and swallowed; the per-channel ordering of a
//! single worker instance is preserved because publishes are awaited in
//! sequence.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use serde::Serialize;
use tracing::warn;

/// Envelope carried on every broadcast channel.
#[derive(Debug, Clone, Serialize)]
pub struct BroadcastEvent {
    /// Event type name, e.g. `session-start`.
    pub event: String,
    /// Structured payload for the event.
    pub data: serde_json::Value,
}

/// Real-time push channel toward end-user clients.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Emit `event` with `payload` on `channel`. Never fails; errors are logged.
    async fn publish(&self, channel: &str, event: &str, payload: serde_json::Value);
}

/// Broadcaster publishing JSON envelopes over Redis pub/sub.
#[derive(Clone)]
pub struct RedisBroadcaster {
    conn: MultiplexedConnection,
}

impl RedisBroadcaster {
    /// Open a dedicated multiplexed connection for outbound events.
    pub async fn connect(url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl Broadcaster for RedisBroadcaster {
    async fn publish(&self, channel: &str, event: &str, payload: serde_json::Value) {
        let envelope = BroadcastEvent {
            event: event.to_owned(),
            data: payload,
        };
        let message = match serde_json::to_string(&envelope) {
            Ok(message) => message,
            Err(err) => {
                warn!(channel, event, error = %err, "failed to serialize broadcast payload");
                return;
            }
        };

        let mut conn = self.conn.clone();
        if let Err(err) = conn.publish::<_, _, ()>(channel, message).await {
            warn!(channel, event, error = %err, "failed to publish broadcast event");
        }
    }
}
