//! Worker-facing error types layered above the per-backend DAO errors.

use thiserror::Error;

use crate::dao::storage::StorageError;

/// Failure raised by a phase handler.
///
/// The worker loop logs these and advances to the next timeline event; they
/// never terminate the process. Per-lobby oracle failures are absorbed inside
/// the handlers themselves and do not surface here.
#[derive(Debug, Error)]
pub enum PhaseError {
    #[error("store operation failed during phase")]
    Storage(#[from] StorageError),
    #[error("round {round_number} missing from session {session_id} timeline")]
    MissingRound { session_id: i64, round_number: i32 },
}
