//! Shuffle and partition registered players into lobbies of bounded size.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::thread_rng;
use tracing::info;

use crate::dao::models::{Player, PlayerStatus};
use crate::dao::storage::StorageResult;
use crate::keys;
use crate::services::lobby_manager;
use crate::state::SharedState;

/// One lobby produced by a distribution pass.
#[derive(Debug, Clone)]
pub struct LobbyAssignment {
    pub lobby_id: i32,
    pub players: Vec<Player>,
}

/// Partition the session roster into lobbies and persist them.
///
/// Every registered player lands in exactly one lobby; lobby ids are 1-based.
pub async fn distribute(
    state: &SharedState,
    session_id: i64,
    roster: &[Player],
    max_players_per_lobby: usize,
) -> StorageResult<Vec<LobbyAssignment>> {
    let mut players = cached_roster(state, session_id, roster).await?;
    if players.is_empty() {
        return Ok(Vec::new());
    }

    players.shuffle(&mut thread_rng());

    let sizes = partition_sizes(players.len(), max_players_per_lobby);
    let mut assignments = Vec::with_capacity(sizes.len());
    let mut offset = 0;
    for (index, size) in sizes.iter().enumerate() {
        let lobby_id = (index + 1) as i32;
        let members: Vec<Player> = players[offset..offset + size]
            .iter()
            .cloned()
            .map(|mut player| {
                player.status = PlayerStatus::Active;
                player
            })
            .collect();
        offset += size;
        assignments.push(LobbyAssignment {
            lobby_id,
            players: members,
        });
    }

    for assignment in &assignments {
        lobby_manager::create_lobby(
            state,
            session_id,
            assignment.lobby_id,
            assignment.players.clone(),
        )
        .await?;

        let status_blob = serde_json::json!({ "status": PlayerStatus::Active }).to_string();
        for player in &assignment.players {
            let key = keys::player_status_key(assignment.lobby_id, &player.wallet_address);
            state.hot().set(&key, &status_blob).await?;
        }
    }

    info!(
        session_id,
        lobbies = assignments.len(),
        players = players.len(),
        "distributed players into lobbies"
    );

    Ok(assignments)
}

/// Resolve the roster to distribute, preferring the hot-store cache.
///
/// On a cache miss the registered wallets are written back so later phases
/// can read the set without touching the relational store.
async fn cached_roster(
    state: &SharedState,
    session_id: i64,
    roster: &[Player],
) -> StorageResult<Vec<Player>> {
    let key = keys::session_players_key(session_id);
    let cached = state.hot().set_members(&key).await?;

    if cached.is_empty() {
        let wallets: Vec<String> = roster
            .iter()
            .map(|player| player.wallet_address.clone())
            .collect();
        state.hot().set_add(&key, &wallets).await?;
        return Ok(roster.to_vec());
    }

    let wallets: HashSet<String> = cached.into_iter().collect();
    Ok(roster
        .iter()
        .filter(|player| wallets.contains(&player.wallet_address))
        .cloned()
        .collect())
}

/// Lobby sizes for `total` players bounded by `max` per lobby.
///
/// N = max(1, ⌊total/max⌋) lobbies; the first N−1 get ⌊total/N⌋ players and
/// the last absorbs the remainder.
fn partition_sizes(total: usize, max: usize) -> Vec<usize> {
    let lobby_count = (total / max.max(1)).max(1);
    let base = total / lobby_count;
    let mut sizes = vec![base; lobby_count];
    if let Some(last) = sizes.last_mut() {
        *last += total - base * lobby_count;
    }
    sizes
}
