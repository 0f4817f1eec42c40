//! Hot-store key schema and pub/sub channel names.
//!
//! Every key the worker reads or writes is minted here so the layout stays
//! greppable and external producers (forum ingestion, vote submission,
//! session creation) can rely on it.

/// Pub/sub channel carrying `{"sessionId": n}` payloads from the session-creation API.
pub const NEW_SESSION_CHANNEL: &str = "new-session";
/// Broadcast channel for session-scoped events.
pub const SESSIONS_CHANNEL: &str = "sessions";
/// Broadcast channel for round-scoped events.
pub const ROUNDS_CHANNEL: &str = "rounds";

/// Broadcast channel for events scoped to a single lobby.
pub fn lobby_channel(lobby_id: i32) -> String {
    format!("lobby-{lobby_id}")
}

/// JSON blob holding a [`crate::dao::models::Lobby`].
pub fn lobby_key(session_id: i64, lobby_id: i32) -> String {
    format!("lobby:session:{session_id}:lobby:{lobby_id}")
}

/// Set of lobby keys registered for a session.
pub fn lobby_index_key(session_id: i64) -> String {
    format!("lobby:session:{session_id}:lobbies")
}

/// Set of registered wallet addresses cached for a session.
pub fn session_players_key(session_id: i64) -> String {
    format!("session:{session_id}:players")
}

/// JSON `{"status": ...}` blob for one player's standing within a lobby.
pub fn player_status_key(lobby_id: i32, wallet: &str) -> String {
    format!("lobby:{lobby_id}:player:{wallet}")
}

/// List of JSON forum messages posted into a lobby by external producers.
pub fn forum_messages_key(lobby_id: i32) -> String {
    format!("forum:lobby:{lobby_id}:messages")
}

/// List of raw vote choice tokens for one (session, lobby, round).
pub fn votes_key(session_id: i64, lobby_id: i32, round_number: i32) -> String {
    format!("voting:session:{session_id}:lobby:{lobby_id}:round:{round_number}")
}

/// JSON `{"topicMessage": ...}` cache of the oracle round topic.
pub fn topic_key(session_id: i64, round_number: i32, lobby_id: i32) -> String {
    format!("topic:session:{session_id}:round:{round_number}:lobby:{lobby_id}")
}

/// JSON `{"eliminatedPlayers": [...]}` record accumulated across rounds.
pub fn elimination_key(lobby_id: i32) -> String {
    format!("elimination:lobby:{lobby_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_follow_the_documented_schema() {
        assert_eq!(lobby_key(7, 2), "lobby:session:7:lobby:2");
        assert_eq!(lobby_index_key(7), "lobby:session:7:lobbies");
        assert_eq!(session_players_key(7), "session:7:players");
        assert_eq!(player_status_key(2, "0xabc"), "lobby:2:player:0xabc");
        assert_eq!(forum_messages_key(2), "forum:lobby:2:messages");
        assert_eq!(votes_key(7, 2, 3), "voting:session:7:lobby:2:round:3");
        assert_eq!(topic_key(7, 3, 2), "topic:session:7:round:3:lobby:2");
        assert_eq!(elimination_key(2), "elimination:lobby:2");
        assert_eq!(lobby_channel(2), "lobby-2");
    }
}
