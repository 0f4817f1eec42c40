//! Wire shapes for broadcast payloads and the inbound `new-session` message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Inbound pub/sub payload announcing a freshly created session.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSessionMessage {
    pub session_id: i64,
}

/// `sessions / session-start`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStartEvent {
    pub session_id: i64,
    pub start_time: DateTime<Utc>,
}

/// `sessions / session-end`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEndEvent {
    pub session_id: i64,
    pub end_time: DateTime<Utc>,
}

/// `sessions / round-end`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundEndEvent {
    pub session_id: i64,
    pub round_number: i32,
}

/// `sessions / new-session`, re-broadcast when the selector adopts a session.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSessionEvent {
    pub session_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub name: String,
}

/// `rounds / round-start`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundStartEvent {
    pub session_id: i64,
    pub round_number: i32,
    pub start_time: DateTime<Utc>,
}

/// `rounds / ai-message-start`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiMessageStartEvent {
    pub session_id: i64,
    pub round: i32,
    pub topic: String,
}

/// `rounds / ai-message-end`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiMessageEndEvent {
    pub session_id: i64,
    pub round_number: i32,
    pub message: String,
}

/// `rounds / voting-start`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingStartEvent {
    pub session_id: i64,
    pub round_number: i32,
    pub voting_start_time: DateTime<Utc>,
    pub voting_end_time: DateTime<Utc>,
}

/// `lobby-{L} / elimination-start`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EliminationStartEvent {
    pub eliminated_players: Vec<String>,
}

/// `lobby-{L} / elimination-end`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EliminationEndEvent {
    pub lobby_id: i32,
    pub message: String,
    pub remaining_participants: Vec<String>,
}

/// `lobby-{L} / voting-result`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingResultEvent {
    pub lobby_id: i32,
    pub result: String,
}

/// `lobby-{L} / game-end`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEndEvent {
    pub lobby_id: i32,
    pub message: String,
}
