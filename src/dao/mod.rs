/// Ephemeral lobby, vote, and topic state plus the inbound event bus.
pub mod hot_store;
/// Database model definitions.
pub mod models;
/// Authoritative sessions, rounds, and player registrations.
pub mod session_store;
/// Storage abstraction layer shared by both stores.
pub mod storage;
