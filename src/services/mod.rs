/// Partitioning of registered players into lobbies.
pub mod distributor;
/// CRUD over hot-store lobby records and vote tally derivation.
pub mod lobby_manager;
/// One handler per phase boundary kind.
pub mod phases;
/// Selection of the session to drive next.
pub mod selector;
/// Materialized session timelines and next-event lookup.
pub mod timeline;
/// Top-level scheduling loop.
pub mod worker;
