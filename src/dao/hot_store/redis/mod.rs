//! Redis-backed implementation of the hot store.

pub mod error;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use tokio::time::timeout;

use crate::dao::{hot_store::HotStore, storage::StorageResult};

use self::error::{RedisDaoError, RedisResult};

/// Per-command deadline for keyed operations.
const COMMAND_DEADLINE: Duration = Duration::from_secs(5);

/// Hot store speaking to Redis over a multiplexed connection, plus one
/// dedicated pub/sub connection per `wait_for_message` call.
#[derive(Clone)]
pub struct RedisHotStore {
    client: redis::Client,
    conn: MultiplexedConnection,
}

impl RedisHotStore {
    /// Open the client and establish the multiplexed connection.
    pub async fn connect(url: &str) -> RedisResult<Self> {
        let client =
            redis::Client::open(url).map_err(|source| RedisDaoError::Connect { source })?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|source| RedisDaoError::Connect { source })?;

        Ok(Self { client, conn })
    }

    async fn run<T, F>(&self, operation: &'static str, fut: F) -> RedisResult<T>
    where
        F: Future<Output = Result<T, redis::RedisError>>,
    {
        timeout(COMMAND_DEADLINE, fut)
            .await
            .map_err(|_| RedisDaoError::Timeout { operation })?
            .map_err(|source| RedisDaoError::Command { operation, source })
    }
}

#[async_trait]
impl HotStore for RedisHotStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(self.run("get", conn.get(key)).await?)
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut conn = self.conn.clone();
        Ok(self.run("set", conn.set(key, value)).await?)
    }

    async fn delete(&self, keys: &[String]) -> StorageResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        Ok(self.run("del", conn.del(keys)).await?)
    }

    async fn set_add(&self, key: &str, members: &[String]) -> StorageResult<()> {
        if members.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        Ok(self.run("sadd", conn.sadd(key, members)).await?)
    }

    async fn set_members(&self, key: &str) -> StorageResult<Vec<String>> {
        let mut conn = self.conn.clone();
        Ok(self.run("smembers", conn.smembers(key)).await?)
    }

    async fn list_push(&self, key: &str, values: &[String]) -> StorageResult<()> {
        if values.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        Ok(self.run("rpush", conn.rpush(key, values)).await?)
    }

    async fn list_range(&self, key: &str) -> StorageResult<Vec<String>> {
        let mut conn = self.conn.clone();
        Ok(self.run("lrange", conn.lrange(key, 0, -1)).await?)
    }

    async fn wait_for_message(&self, channel: &str) -> StorageResult<String> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|source| RedisDaoError::Connect { source })?;
        pubsub
            .subscribe(channel)
            .await
            .map_err(|source| RedisDaoError::Subscribe {
                channel: channel.to_owned(),
                source,
            })?;

        let message = {
            let mut stream = pubsub.on_message();
            match stream.next().await {
                Some(message) => message,
                None => {
                    return Err(RedisDaoError::SubscriptionClosed {
                        channel: channel.to_owned(),
                    }
                    .into());
                }
            }
        };

        let payload =
            message
                .get_payload::<String>()
                .map_err(|source| RedisDaoError::Command {
                    operation: "get_payload",
                    source,
                })?;

        Ok(payload)
    }
}
