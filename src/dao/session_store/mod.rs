pub mod postgres;

use async_trait::async_trait;

use crate::dao::{models::Session, storage::StorageResult};

/// Read-only view over the authoritative sessions, rounds, and player registrations.
///
/// All timestamps are UTC. Implementations never mutate session data; the
/// worker is a pure consumer of the canonical timeline.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Session whose window contains the current instant, earliest start first.
    async fn active_session(&self) -> StorageResult<Option<Session>>;
    /// Earliest session whose window has not yet opened.
    async fn next_session(&self) -> StorageResult<Option<Session>>;
    /// Full session including its rounds (by sequence) and players (by join time).
    async fn session_by_id(&self, session_id: i64) -> StorageResult<Option<Session>>;
}
