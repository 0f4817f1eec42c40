//! CRUD over hot-store lobby records plus vote tally derivation.

use std::collections::HashMap;

use chrono::Utc;
use tracing::{info, warn};

use crate::dao::models::{Lobby, LobbyStatus, Player};
use crate::dao::storage::{StorageError, StorageResult};
use crate::keys;
use crate::state::SharedState;

/// Create a lobby record and register it in the session index.
///
/// Idempotent: an existing record is left untouched so a replayed
/// SESSION_START cannot clobber in-flight lobby state.
pub async fn create_lobby(
    state: &SharedState,
    session_id: i64,
    lobby_id: i32,
    players: Vec<Player>,
) -> StorageResult<()> {
    let key = keys::lobby_key(session_id, lobby_id);
    if state.hot().get(&key).await?.is_some() {
        info!(session_id, lobby_id, "lobby already exists; leaving record untouched");
        return Ok(());
    }

    let lobby = Lobby {
        lobby_id,
        session_id,
        players,
        created_at: Utc::now(),
        status: LobbyStatus::Active,
    };

    state.hot().set(&key, &encode(&lobby)?).await?;
    state
        .hot()
        .set_add(&keys::lobby_index_key(session_id), &[key])
        .await?;

    Ok(())
}

/// Fetch one lobby; a corrupt blob is logged and treated as missing.
pub async fn get_lobby(
    state: &SharedState,
    session_id: i64,
    lobby_id: i32,
) -> StorageResult<Option<Lobby>> {
    let key = keys::lobby_key(session_id, lobby_id);
    let Some(blob) = state.hot().get(&key).await? else {
        return Ok(None);
    };

    match serde_json::from_str(&blob) {
        Ok(lobby) => Ok(Some(lobby)),
        Err(err) => {
            warn!(%key, error = %err, "corrupt lobby blob; treating as missing");
            Ok(None)
        }
    }
}

/// Fetch every lobby registered for the session, ordered by lobby id.
///
/// Index entries pointing at missing or corrupt blobs are skipped with a warning.
pub async fn get_all_lobbies(state: &SharedState, session_id: i64) -> StorageResult<Vec<Lobby>> {
    let index_key = keys::lobby_index_key(session_id);
    let mut lobbies = Vec::new();

    for key in state.hot().set_members(&index_key).await? {
        match state.hot().get(&key).await? {
            Some(blob) => match serde_json::from_str::<Lobby>(&blob) {
                Ok(lobby) => lobbies.push(lobby),
                Err(err) => warn!(%key, error = %err, "corrupt lobby blob skipped"),
            },
            None => warn!(%key, "indexed lobby record missing; skipped"),
        }
    }

    lobbies.sort_by_key(|lobby| lobby.lobby_id);
    Ok(lobbies)
}

/// Lobbies still participating in the session.
pub async fn get_active_lobbies(state: &SharedState, session_id: i64) -> StorageResult<Vec<Lobby>> {
    let lobbies = get_all_lobbies(state, session_id).await?;
    Ok(lobbies
        .into_iter()
        .filter(|lobby| lobby.status == LobbyStatus::Active)
        .collect())
}

/// Replace the stored lobby record wholesale.
pub async fn update_lobby(state: &SharedState, session_id: i64, lobby: &Lobby) -> StorageResult<()> {
    let key = keys::lobby_key(session_id, lobby.lobby_id);
    state.hot().set(&key, &encode(lobby)?).await
}

/// Read-modify-write of the lobby status field.
///
/// Returns `false` (with a warning) when the lobby record is missing.
pub async fn update_lobby_status(
    state: &SharedState,
    session_id: i64,
    lobby_id: i32,
    status: LobbyStatus,
) -> StorageResult<bool> {
    let Some(mut lobby) = get_lobby(state, session_id, lobby_id).await? else {
        warn!(session_id, lobby_id, "cannot update status of missing lobby");
        return Ok(false);
    };

    lobby.status = status;
    update_lobby(state, session_id, &lobby).await?;
    Ok(true)
}

/// Count the raw vote tokens recorded for one (session, lobby, round).
pub async fn get_voting_results(
    state: &SharedState,
    session_id: i64,
    lobby_id: i32,
    round_number: i32,
) -> StorageResult<HashMap<String, usize>> {
    let key = keys::votes_key(session_id, lobby_id, round_number);
    let mut counts = HashMap::new();
    for choice in state.hot().list_range(&key).await? {
        *counts.entry(choice).or_insert(0) += 1;
    }
    Ok(counts)
}

/// Players of the lobby whose status is not eliminated; empty unless the lobby is active.
pub async fn get_remaining_players(
    state: &SharedState,
    session_id: i64,
    lobby_id: i32,
) -> StorageResult<Vec<Player>> {
    let Some(lobby) = get_lobby(state, session_id, lobby_id).await? else {
        return Ok(Vec::new());
    };
    if lobby.status != LobbyStatus::Active {
        return Ok(Vec::new());
    }

    Ok(lobby.remaining_players().into_iter().cloned().collect())
}

fn encode(lobby: &Lobby) -> StorageResult<String> {
    serde_json::to_string(lobby)
        .map_err(|err| StorageError::unavailable("failed to encode lobby blob".into(), err))
}

#[cfg(test)]
mod tests {
    use crate::dao::models::PlayerStatus;
    use crate::testing::{harness, player_fixture};

    use super::*;

    #[tokio::test]
    async fn create_lobby_is_idempotent() {
        let h = harness();
        let players = vec![player_fixture(1, "0xa"), player_fixture(1, "0xb")];

        create_lobby(&h.state, 1, 1, players).await.expect("create");
        let first = h.state.hot().get(&keys::lobby_key(1, 1)).await.expect("get");

        // A second create with a different roster must not overwrite the blob.
        create_lobby(&h.state, 1, 1, vec![player_fixture(1, "0xz")])
            .await
            .expect("create again");
        let second = h.state.hot().get(&keys::lobby_key(1, 1)).await.expect("get");

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn corrupt_lobby_blob_is_treated_as_missing() {
        let h = harness();
        let key = keys::lobby_key(1, 1);
        h.state.hot().set(&key, "{not json").await.expect("seed");
        h.state
            .hot()
            .set_add(&keys::lobby_index_key(1), &[key])
            .await
            .expect("seed index");

        assert!(get_lobby(&h.state, 1, 1).await.expect("get").is_none());
        assert!(get_all_lobbies(&h.state, 1).await.expect("all").is_empty());
    }

    #[tokio::test]
    async fn voting_results_count_raw_choices() {
        let h = harness();
        let key = keys::votes_key(1, 1, 2);
        h.state
            .hot()
            .list_push(
                &key,
                &[
                    "continue".to_owned(),
                    "share".to_owned(),
                    "continue".to_owned(),
                ],
            )
            .await
            .expect("seed votes");

        let counts = get_voting_results(&h.state, 1, 1, 2).await.expect("counts");
        assert_eq!(counts.get("continue"), Some(&2));
        assert_eq!(counts.get("share"), Some(&1));
    }

    #[tokio::test]
    async fn remaining_players_requires_active_lobby() {
        let h = harness();
        let mut players = vec![player_fixture(1, "0xa"), player_fixture(1, "0xb")];
        players[1].status = PlayerStatus::Eliminated;
        create_lobby(&h.state, 1, 1, players).await.expect("create");

        let remaining = get_remaining_players(&h.state, 1, 1).await.expect("remaining");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].wallet_address, "0xa");

        update_lobby_status(&h.state, 1, 1, LobbyStatus::Completed)
            .await
            .expect("update");
        assert!(get_remaining_players(&h.state, 1, 1)
            .await
            .expect("remaining")
            .is_empty());
    }

    #[tokio::test]
    async fn update_status_of_missing_lobby_reports_false() {
        let h = harness();
        let updated = update_lobby_status(&h.state, 1, 9, LobbyStatus::Completed)
            .await
            .expect("update");
        assert!(!updated);
    }
}
