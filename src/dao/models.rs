//! Domain records shared by the relational store, the hot store, and the phase handlers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A scheduled, time-bounded game instance with registered players and a fixed round count.
///
/// Owned by the relational store; the worker only ever reads it.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: i64,
    pub name: String,
    /// Entry fee in the smallest monetary unit.
    pub entry_fee: i64,
    pub max_total_players: i32,
    pub total_rounds: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Rounds ordered by sequence number.
    pub rounds: Vec<Round>,
    /// Registrations ordered by join time.
    pub players: Vec<Player>,
}

impl Session {
    /// Look up a round by its 1-based sequence number.
    pub fn round_by_number(&self, round_number: i32) -> Option<&Round> {
        self.rounds
            .iter()
            .find(|round| round.round_number == round_number)
    }
}

/// One iteration within a session, demarcated by eight phase instants.
#[derive(Debug, Clone)]
pub struct Round {
    pub id: i64,
    pub session_id: i64,
    /// 1-based sequence number within the session.
    pub round_number: i32,
    pub ai_message_start: DateTime<Utc>,
    pub ai_message_end: DateTime<Utc>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub elimination_start: DateTime<Utc>,
    pub elimination_end: DateTime<Utc>,
    pub voting_start_time: DateTime<Utc>,
    pub voting_end_time: DateTime<Utc>,
}

/// A wallet registration for a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: i64,
    pub session_id: i64,
    pub wallet_address: String,
    pub joined_at: DateTime<Utc>,
    pub status: PlayerStatus,
    pub total_rounds_played: i32,
}

/// Standing of a player, both session-wide and within a lobby snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    Active,
    Eliminated,
    Winner,
}

impl PlayerStatus {
    /// Parse the relational store's textual representation.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(PlayerStatus::Active),
            "eliminated" => Some(PlayerStatus::Eliminated),
            "winner" => Some(PlayerStatus::Winner),
            _ => None,
        }
    }
}

/// A partition of a session's players, alive only in the hot store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lobby {
    pub lobby_id: i32,
    pub session_id: i64,
    pub players: Vec<Player>,
    pub created_at: DateTime<Utc>,
    pub status: LobbyStatus,
}

impl Lobby {
    /// Players whose per-lobby status is not eliminated.
    pub fn remaining_players(&self) -> Vec<&Player> {
        self.players
            .iter()
            .filter(|player| player.status != PlayerStatus::Eliminated)
            .collect()
    }
}

/// Lifecycle of a lobby between session start and session end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LobbyStatus {
    Active,
    Inactive,
    Completed,
}

/// Hot-store blob caching the oracle topic for one (session, round, lobby).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicCache {
    pub topic_message: String,
}

/// Hot-store blob accumulating eliminated wallets for a lobby across rounds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EliminationRecord {
    pub eliminated_players: Vec<String>,
}
