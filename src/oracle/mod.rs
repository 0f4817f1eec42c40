//! The external decision oracle adjudicating eliminations and writing round topics.

pub mod error;
pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use self::error::OracleResult;

/// Parameters of one elimination adjudication call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EliminationRequest {
    pub agent_id: String,
    pub session_id: i64,
    pub lobby_id: i32,
    pub max_rounds: i32,
    pub current_round: i32,
}

/// One wallet the oracle chose to eliminate.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EliminatedParticipant {
    pub participant: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Outcome of an elimination adjudication.
#[derive(Debug, Clone)]
pub struct EliminationDecision {
    pub eliminated: Vec<EliminatedParticipant>,
    pub success: bool,
}

/// External service generating round topics and deciding eliminations.
///
/// Calls honor a per-call deadline and never retry internally; fallback
/// semantics belong to the phase handlers.
#[async_trait]
pub trait DecisionOracle: Send + Sync {
    /// Request the topic message for a round.
    async fn round_announcement(&self, agent_id: &str, round_number: i32) -> OracleResult<String>;
    /// Request the list of eliminated wallets for one lobby.
    async fn decide_eliminations(
        &self,
        request: &EliminationRequest,
    ) -> OracleResult<EliminationDecision>;
}
