//! Error types for the Redis hot-store implementation.

use thiserror::Error;

use crate::dao::storage::StorageError;

/// Convenient result alias returning [`RedisDaoError`] failures.
pub type RedisResult<T> = Result<T, RedisDaoError>;

/// Failures that can occur while interacting with Redis.
#[derive(Debug, Error)]
pub enum RedisDaoError {
    /// The client could not be constructed or the connection refused.
    #[error("failed to connect to Redis")]
    Connect {
        #[source]
        source: redis::RedisError,
    },
    /// A keyed command failed.
    #[error("redis command `{operation}` failed")]
    Command {
        operation: &'static str,
        #[source]
        source: redis::RedisError,
    },
    /// A keyed command exceeded its deadline.
    #[error("redis command `{operation}` timed out")]
    Timeout { operation: &'static str },
    /// Subscribing to a pub/sub channel failed.
    #[error("failed to subscribe to channel `{channel}`")]
    Subscribe {
        channel: String,
        #[source]
        source: redis::RedisError,
    },
    /// The pub/sub stream ended before delivering a message.
    #[error("subscription to channel `{channel}` closed before a message arrived")]
    SubscriptionClosed { channel: String },
}

impl From<RedisDaoError> for StorageError {
    fn from(err: RedisDaoError) -> Self {
        match err {
            RedisDaoError::Timeout { operation } => StorageError::Timeout { operation },
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
