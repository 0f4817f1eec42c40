pub mod redis;

use async_trait::async_trait;

use crate::dao::storage::StorageResult;

/// Abstraction over the ephemeral key/value + pub/sub service.
///
/// The worker is the sole writer of lobby blobs, per-player statuses, topic
/// caches, and elimination records; external producers own forum messages,
/// vote lists, and the `new-session` channel. Values are opaque strings
/// (JSON blobs by convention).
#[async_trait]
pub trait HotStore: Send + Sync {
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> StorageResult<()>;
    /// Delete every listed key. A no-op for an empty list.
    async fn delete(&self, keys: &[String]) -> StorageResult<()>;
    async fn set_add(&self, key: &str, members: &[String]) -> StorageResult<()>;
    async fn set_members(&self, key: &str) -> StorageResult<Vec<String>>;
    async fn list_push(&self, key: &str, values: &[String]) -> StorageResult<()>;
    async fn list_range(&self, key: &str) -> StorageResult<Vec<String>>;
    /// Block until one message arrives on `channel`, then unsubscribe.
    ///
    /// Unlike the keyed commands this call carries no deadline; the selector
    /// parks here while no session exists.
    async fn wait_for_message(&self, channel: &str) -> StorageResult<String>;
}
