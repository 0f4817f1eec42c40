//! One handler per phase boundary kind.
//!
//! Handlers perform the fan-out and state transitions for their boundary and
//! report failures upward only when a store operation fails; oracle failures
//! are absorbed per lobby so one bad adjudication never stalls the rest of
//! the session.

use futures::StreamExt;
use futures::stream;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::dao::models::{
    EliminationRecord, Lobby, LobbyStatus, PlayerStatus, Round, Session, TopicCache,
};
use crate::dao::storage::StorageResult;
use crate::dto::events::{
    AiMessageEndEvent, AiMessageStartEvent, EliminationEndEvent, EliminationStartEvent,
    GameEndEvent, RoundEndEvent, RoundStartEvent, SessionEndEvent, SessionStartEvent,
    VotingResultEvent, VotingStartEvent,
};
use crate::error::PhaseError;
use crate::keys;
use crate::oracle::EliminationRequest;
use crate::services::{
    distributor, lobby_manager,
    timeline::{PhaseKind, TimelineEvent},
};
use crate::state::SharedState;

const EVENT_SESSION_START: &str = "session-start";
const EVENT_SESSION_END: &str = "session-end";
const EVENT_ROUND_START: &str = "round-start";
const EVENT_ROUND_END: &str = "round-end";
const EVENT_AI_MESSAGE_START: &str = "ai-message-start";
const EVENT_AI_MESSAGE_END: &str = "ai-message-end";
const EVENT_ELIMINATION_START: &str = "elimination-start";
const EVENT_ELIMINATION_END: &str = "elimination-end";
const EVENT_VOTING_START: &str = "voting-start";
const EVENT_VOTING_RESULT: &str = "voting-result";
const EVENT_GAME_END: &str = "game-end";

/// Topic shown to players when the oracle cannot produce one.
pub const FALLBACK_TOPIC: &str = "Discuss your strategy!";

const VOTE_CONTINUE: &str = "continue";
const VOTE_SHARE: &str = "share";

const ELIMINATION_END_MESSAGE: &str = "Elimination phase complete.";
const GAME_END_MESSAGE: &str = "The game has ended for this lobby.";

/// Upper bound on concurrent per-lobby oracle calls within one phase.
const LOBBY_CONCURRENCY: usize = 8;

/// Route one timeline event to its phase handler.
pub async fn dispatch(
    state: &SharedState,
    session: &Session,
    event: &TimelineEvent,
) -> Result<(), PhaseError> {
    match event.kind {
        PhaseKind::SessionStart => return session_start(state, session).await,
        PhaseKind::SessionEnd => return session_end(state, session).await,
        _ => {}
    }

    let round_number = event.round_number.unwrap_or_default();
    let Some(round) = session.round_by_number(round_number) else {
        return Err(PhaseError::MissingRound {
            session_id: session.id,
            round_number,
        });
    };

    match event.kind {
        PhaseKind::AiMessageStart => ai_message_start(state, session, round).await,
        PhaseKind::AiMessageEnd => ai_message_end(state, session, round).await,
        PhaseKind::RoundStart => round_start(state, session, round).await,
        PhaseKind::RoundEnd => round_end(state, session, round).await,
        PhaseKind::EliminationStart => elimination_start(state, session, round).await,
        PhaseKind::EliminationEnd => elimination_end(state, session, round).await,
        PhaseKind::VotingStart => voting_start(state, session, round).await,
        PhaseKind::VotingEnd => voting_end(state, session, round).await,
        PhaseKind::SessionStart | PhaseKind::SessionEnd => unreachable!("handled above"),
    }
}

/// Purge stale hot state, distribute players into lobbies, announce the session.
pub async fn session_start(state: &SharedState, session: &Session) -> Result<(), PhaseError> {
    purge_session_state(state, session).await?;

    if session.players.is_empty() {
        warn!(
            session_id = session.id,
            "session has no registered players; skipping lobby creation"
        );
    } else {
        distributor::distribute(
            state,
            session.id,
            &session.players,
            state.settings().max_players_per_lobby,
        )
        .await?;
    }

    broadcast(
        state,
        keys::SESSIONS_CHANNEL,
        EVENT_SESSION_START,
        &SessionStartEvent {
            session_id: session.id,
            start_time: session.start_time,
        },
    )
    .await;

    Ok(())
}

/// Fetch the round topic from the oracle, cache it per lobby, announce it.
pub async fn ai_message_start(
    state: &SharedState,
    session: &Session,
    round: &Round,
) -> Result<(), PhaseError> {
    let agent_id = state.settings().agent_id.clone();
    let topic = match state
        .oracle()
        .round_announcement(&agent_id, round.round_number)
        .await
    {
        Ok(topic) => {
            cache_topic(state, session, round, &topic).await?;
            topic
        }
        Err(err) => {
            warn!(
                session_id = session.id,
                round = round.round_number,
                error = %err,
                "oracle announcement failed; falling back to default topic"
            );
            FALLBACK_TOPIC.to_owned()
        }
    };

    broadcast(
        state,
        keys::ROUNDS_CHANNEL,
        EVENT_AI_MESSAGE_START,
        &AiMessageStartEvent {
            session_id: session.id,
            round: round.round_number,
            topic,
        },
    )
    .await;

    Ok(())
}

/// Close the announcement window; re-broadcast the cached topic, no state mutation.
pub async fn ai_message_end(
    state: &SharedState,
    session: &Session,
    round: &Round,
) -> Result<(), PhaseError> {
    let message = cached_topic(state, session, round)
        .await?
        .unwrap_or_else(|| FALLBACK_TOPIC.to_owned());

    broadcast(
        state,
        keys::ROUNDS_CHANNEL,
        EVENT_AI_MESSAGE_END,
        &AiMessageEndEvent {
            session_id: session.id,
            round_number: round.round_number,
            message,
        },
    )
    .await;

    Ok(())
}

pub async fn round_start(
    state: &SharedState,
    session: &Session,
    round: &Round,
) -> Result<(), PhaseError> {
    broadcast(
        state,
        keys::ROUNDS_CHANNEL,
        EVENT_ROUND_START,
        &RoundStartEvent {
            session_id: session.id,
            round_number: round.round_number,
            start_time: round.start_time,
        },
    )
    .await;

    Ok(())
}

/// Close the discussion window. Eliminations are deferred to ELIMINATION_START.
pub async fn round_end(
    state: &SharedState,
    session: &Session,
    round: &Round,
) -> Result<(), PhaseError> {
    broadcast(
        state,
        keys::SESSIONS_CHANNEL,
        EVENT_ROUND_END,
        &RoundEndEvent {
            session_id: session.id,
            round_number: round.round_number,
        },
    )
    .await;

    Ok(())
}

/// Ask the oracle to adjudicate each active lobby and apply the eliminations.
pub async fn elimination_start(
    state: &SharedState,
    session: &Session,
    round: &Round,
) -> Result<(), PhaseError> {
    let lobbies = lobby_manager::get_active_lobbies(state, session.id).await?;

    stream::iter(lobbies)
        .for_each_concurrent(LOBBY_CONCURRENCY, |lobby| async move {
            let lobby_id = lobby.lobby_id;
            if let Err(err) = eliminate_lobby(state, session, round, lobby).await {
                error!(
                    session_id = session.id,
                    lobby_id,
                    error = %err,
                    "elimination failed for lobby; state left unchanged"
                );
            }
        })
        .await;

    Ok(())
}

async fn eliminate_lobby(
    state: &SharedState,
    session: &Session,
    round: &Round,
    mut lobby: Lobby,
) -> StorageResult<()> {
    let request = EliminationRequest {
        agent_id: state.settings().agent_id.clone(),
        session_id: session.id,
        lobby_id: lobby.lobby_id,
        max_rounds: session.total_rounds,
        current_round: round.round_number,
    };

    let decision = match state.oracle().decide_eliminations(&request).await {
        Ok(decision) if decision.success => decision,
        Ok(_) => {
            warn!(
                session_id = session.id,
                lobby_id = lobby.lobby_id,
                "oracle reported an unsuccessful adjudication; lobby unchanged"
            );
            return Ok(());
        }
        Err(err) => {
            warn!(
                session_id = session.id,
                lobby_id = lobby.lobby_id,
                error = %err,
                "oracle adjudication failed; lobby unchanged"
            );
            return Ok(());
        }
    };

    // Only wallets still active in this lobby may be announced; a wallet
    // eliminated in an earlier round never reappears in the event payload.
    let mut eliminated = Vec::new();
    for participant in &decision.eliminated {
        let Some(player) = lobby.players.iter_mut().find(|player| {
            player.wallet_address == participant.participant
                && player.status != PlayerStatus::Eliminated
        }) else {
            continue;
        };
        player.status = PlayerStatus::Eliminated;
        eliminated.push(player.wallet_address.clone());
    }

    let status_blob = serde_json::json!({ "status": PlayerStatus::Eliminated }).to_string();
    for wallet in &eliminated {
        let key = keys::player_status_key(lobby.lobby_id, wallet);
        state.hot().set(&key, &status_blob).await?;
    }

    lobby_manager::update_lobby(state, session.id, &lobby).await?;
    append_elimination_record(state, lobby.lobby_id, &eliminated).await?;

    info!(
        session_id = session.id,
        lobby_id = lobby.lobby_id,
        eliminated = eliminated.len(),
        "applied oracle eliminations"
    );

    broadcast(
        state,
        &keys::lobby_channel(lobby.lobby_id),
        EVENT_ELIMINATION_START,
        &EliminationStartEvent {
            eliminated_players: eliminated,
        },
    )
    .await;

    Ok(())
}

/// Announce survivors; complete lobbies reduced to at most one active player.
pub async fn elimination_end(
    state: &SharedState,
    session: &Session,
    _round: &Round,
) -> Result<(), PhaseError> {
    for lobby in lobby_manager::get_active_lobbies(state, session.id).await? {
        let remaining: Vec<String> =
            lobby_manager::get_remaining_players(state, session.id, lobby.lobby_id)
                .await?
                .into_iter()
                .map(|player| player.wallet_address)
                .collect();

        broadcast(
            state,
            &keys::lobby_channel(lobby.lobby_id),
            EVENT_ELIMINATION_END,
            &EliminationEndEvent {
                lobby_id: lobby.lobby_id,
                message: ELIMINATION_END_MESSAGE.to_owned(),
                remaining_participants: remaining.clone(),
            },
        )
        .await;

        if remaining.len() <= 1 {
            lobby_manager::update_lobby_status(
                state,
                session.id,
                lobby.lobby_id,
                LobbyStatus::Completed,
            )
            .await?;
            broadcast(
                state,
                &keys::lobby_channel(lobby.lobby_id),
                EVENT_GAME_END,
                &GameEndEvent {
                    lobby_id: lobby.lobby_id,
                    message: GAME_END_MESSAGE.to_owned(),
                },
            )
            .await;
        }
    }

    Ok(())
}

/// Clear stale tallies and open the voting window.
pub async fn voting_start(
    state: &SharedState,
    session: &Session,
    round: &Round,
) -> Result<(), PhaseError> {
    for lobby in lobby_manager::get_active_lobbies(state, session.id).await? {
        let key = keys::votes_key(session.id, lobby.lobby_id, round.round_number);
        state.hot().delete(&[key]).await?;
    }

    broadcast(
        state,
        keys::ROUNDS_CHANNEL,
        EVENT_VOTING_START,
        &VotingStartEvent {
            session_id: session.id,
            round_number: round.round_number,
            voting_start_time: round.voting_start_time,
            voting_end_time: round.voting_end_time,
        },
    )
    .await;

    Ok(())
}

/// Tally the votes per lobby; a tie keeps the lobby playing.
pub async fn voting_end(
    state: &SharedState,
    session: &Session,
    round: &Round,
) -> Result<(), PhaseError> {
    for lobby in lobby_manager::get_active_lobbies(state, session.id).await? {
        let counts = lobby_manager::get_voting_results(
            state,
            session.id,
            lobby.lobby_id,
            round.round_number,
        )
        .await?;

        let continues = counts.get(VOTE_CONTINUE).copied().unwrap_or(0);
        let shares = counts.get(VOTE_SHARE).copied().unwrap_or(0);
        let result = if continues >= shares {
            VOTE_CONTINUE
        } else {
            VOTE_SHARE
        };

        info!(
            session_id = session.id,
            lobby_id = lobby.lobby_id,
            round = round.round_number,
            continues,
            shares,
            result,
            "vote resolved"
        );

        broadcast(
            state,
            &keys::lobby_channel(lobby.lobby_id),
            EVENT_VOTING_RESULT,
            &VotingResultEvent {
                lobby_id: lobby.lobby_id,
                result: result.to_owned(),
            },
        )
        .await;

        if result == VOTE_SHARE {
            lobby_manager::update_lobby_status(
                state,
                session.id,
                lobby.lobby_id,
                LobbyStatus::Completed,
            )
            .await?;
        }

        let key = keys::votes_key(session.id, lobby.lobby_id, round.round_number);
        state.hot().delete(&[key]).await?;
    }

    Ok(())
}

/// Announce the end of the session and purge its hot state.
pub async fn session_end(state: &SharedState, session: &Session) -> Result<(), PhaseError> {
    broadcast(
        state,
        keys::SESSIONS_CHANNEL,
        EVENT_SESSION_END,
        &SessionEndEvent {
            session_id: session.id,
            end_time: session.end_time,
        },
    )
    .await;

    purge_session_state(state, session).await?;

    Ok(())
}

/// Scoped deletion of every hot-store key owned by the session.
///
/// The hot store may be shared with other tenants, so a global flush is off
/// the table; we enumerate the session's lobbies and derive their keys.
async fn purge_session_state(state: &SharedState, session: &Session) -> StorageResult<()> {
    let index_key = keys::lobby_index_key(session.id);

    let mut stale = vec![index_key.clone(), keys::session_players_key(session.id)];
    // Raw index members cover records whose blobs are missing or corrupt.
    stale.extend(state.hot().set_members(&index_key).await?);

    for lobby in lobby_manager::get_all_lobbies(state, session.id).await? {
        stale.push(keys::forum_messages_key(lobby.lobby_id));
        stale.push(keys::elimination_key(lobby.lobby_id));
        for player in &lobby.players {
            stale.push(keys::player_status_key(lobby.lobby_id, &player.wallet_address));
        }
        for round in &session.rounds {
            stale.push(keys::votes_key(session.id, lobby.lobby_id, round.round_number));
            stale.push(keys::topic_key(session.id, round.round_number, lobby.lobby_id));
        }
    }

    state.hot().delete(&stale).await
}

/// Write the topic cache entry for every active lobby of the round.
async fn cache_topic(
    state: &SharedState,
    session: &Session,
    round: &Round,
    topic: &str,
) -> StorageResult<()> {
    let cache = TopicCache {
        topic_message: topic.to_owned(),
    };
    let blob = serde_json::to_string(&cache).unwrap_or_default();

    for lobby in lobby_manager::get_active_lobbies(state, session.id).await? {
        let key = keys::topic_key(session.id, round.round_number, lobby.lobby_id);
        if let Err(err) = state.hot().set(&key, &blob).await {
            warn!(%key, error = %err, "failed to cache round topic");
        }
    }

    Ok(())
}

/// Read back the cached topic from the first active lobby, if any.
async fn cached_topic(
    state: &SharedState,
    session: &Session,
    round: &Round,
) -> StorageResult<Option<String>> {
    let lobbies = lobby_manager::get_active_lobbies(state, session.id).await?;
    let Some(lobby) = lobbies.first() else {
        return Ok(None);
    };

    let key = keys::topic_key(session.id, round.round_number, lobby.lobby_id);
    let Some(blob) = state.hot().get(&key).await? else {
        return Ok(None);
    };

    match serde_json::from_str::<TopicCache>(&blob) {
        Ok(cache) => Ok(Some(cache.topic_message)),
        Err(err) => {
            warn!(%key, error = %err, "corrupt topic cache; treating as missing");
            Ok(None)
        }
    }
}

async fn append_elimination_record(
    state: &SharedState,
    lobby_id: i32,
    eliminated: &[String],
) -> StorageResult<()> {
    if eliminated.is_empty() {
        return Ok(());
    }

    let key = keys::elimination_key(lobby_id);
    let mut record = match state.hot().get(&key).await? {
        Some(blob) => serde_json::from_str::<EliminationRecord>(&blob).unwrap_or_else(|err| {
            warn!(%key, error = %err, "corrupt elimination record; starting fresh");
            EliminationRecord::default()
        }),
        None => EliminationRecord::default(),
    };

    for wallet in eliminated {
        if !record.eliminated_players.contains(wallet) {
            record.eliminated_players.push(wallet.clone());
        }
    }

    let blob = serde_json::to_string(&record).unwrap_or_default();
    state.hot().set(&key, &blob).await
}

/// Serialize and publish one event, logging (not propagating) serialization failures.
async fn broadcast<T: Serialize>(state: &SharedState, channel: &str, event: &str, payload: &T) {
    match serde_json::to_value(payload) {
        Ok(value) => state.broadcaster().publish(channel, event, value).await,
        Err(err) => {
            warn!(channel, event, error = %err, "failed to serialize broadcast payload");
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use crate::dao::models::Player;
    use crate::services::lobby_manager::{create_lobby, get_lobby};
    use crate::testing::{TestHarness, harness, player_fixture, round_fixture, session_fixture};

    use super::*;

    fn session_with_players(wallets: &[&str]) -> Session {
        let start = Utc::now();
        let mut session = session_fixture(1, start, start + Duration::minutes(10));
        session.rounds = vec![round_fixture(1, 1, start, Duration::minutes(1))];
        session.players = wallets
            .iter()
            .map(|wallet| player_fixture(1, wallet))
            .collect();
        session
    }

    async fn seeded_lobby(h: &TestHarness, wallets: &[&str]) -> Vec<Player> {
        let players: Vec<Player> = wallets
            .iter()
            .map(|wallet| player_fixture(1, wallet))
            .collect();
        create_lobby(&h.state, 1, 1, players.clone())
            .await
            .expect("create lobby");
        players
    }

    #[tokio::test]
    async fn session_start_distributes_players_and_announces() {
        let h = harness();
        let session = session_with_players(&["0xa", "0xb", "0xc"]);

        session_start(&h.state, &session).await.expect("handler");

        let lobby = get_lobby(&h.state, 1, 1).await.expect("get").expect("lobby");
        assert_eq!(lobby.players.len(), 3);
        assert_eq!(lobby.status, LobbyStatus::Active);

        assert_eq!(h.broadcaster.event_names("sessions"), vec!["session-start"]);
    }

    #[tokio::test]
    async fn session_start_with_empty_roster_still_announces() {
        let h = harness();
        let session = session_with_players(&[]);

        session_start(&h.state, &session).await.expect("handler");

        assert!(get_lobby(&h.state, 1, 1).await.expect("get").is_none());
        assert_eq!(h.broadcaster.event_names("sessions"), vec!["session-start"]);
    }

    #[tokio::test]
    async fn session_start_purges_state_from_a_previous_run() {
        let h = harness();
        let session = session_with_players(&[]);

        // Leftovers of an earlier run of the same session.
        seeded_lobby(&h, &["0xold"]).await;
        h.state
            .hot()
            .set(&keys::player_status_key(1, "0xold"), r#"{"status":"active"}"#)
            .await
            .expect("seed");

        session_start(&h.state, &session).await.expect("handler");

        assert!(get_lobby(&h.state, 1, 1).await.expect("get").is_none());
        assert!(
            h.state
                .hot()
                .get(&keys::player_status_key(1, "0xold"))
                .await
                .expect("get")
                .is_none()
        );
    }

    #[tokio::test]
    async fn ai_message_start_caches_and_announces_the_topic() {
        let h = harness();
        let session = session_with_players(&["0xa", "0xb"]);
        seeded_lobby(&h, &["0xa", "0xb"]).await;
        h.oracle.set_topic(Some("Share secrets."));

        let round = session.rounds[0].clone();
        ai_message_start(&h.state, &session, &round).await.expect("handler");

        let cached = h
            .state
            .hot()
            .get(&keys::topic_key(1, 1, 1))
            .await
            .expect("get")
            .expect("topic cached");
        assert!(cached.contains("Share secrets."));

        let events = h.broadcaster.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "ai-message-start");
        assert_eq!(events[0].data["topic"], "Share secrets.");
    }

    #[tokio::test]
    async fn ai_message_start_falls_back_when_oracle_fails() {
        let h = harness();
        let session = session_with_players(&["0xa"]);
        seeded_lobby(&h, &["0xa"]).await;
        h.oracle.set_topic(None);

        let round = session.rounds[0].clone();
        ai_message_start(&h.state, &session, &round).await.expect("handler");

        assert!(
            h.state
                .hot()
                .get(&keys::topic_key(1, 1, 1))
                .await
                .expect("get")
                .is_none()
        );

        let events = h.broadcaster.events();
        assert_eq!(events[0].data["topic"], FALLBACK_TOPIC);
    }

    #[tokio::test]
    async fn ai_message_end_rebroadcasts_the_cached_topic() {
        let h = harness();
        let session = session_with_players(&["0xa"]);
        seeded_lobby(&h, &["0xa"]).await;
        h.oracle.set_topic(Some("Trust no one."));

        let round = session.rounds[0].clone();
        ai_message_start(&h.state, &session, &round).await.expect("start");
        ai_message_end(&h.state, &session, &round).await.expect("end");

        let events = h.broadcaster.events();
        assert_eq!(events[1].event, "ai-message-end");
        assert_eq!(events[1].data["message"], "Trust no one.");
    }

    #[tokio::test]
    async fn round_boundaries_announce_on_their_channels() {
        let h = harness();
        let session = session_with_players(&["0xa"]);
        let round = session.rounds[0].clone();

        round_start(&h.state, &session, &round).await.expect("start");
        round_end(&h.state, &session, &round).await.expect("end");

        assert_eq!(h.broadcaster.event_names("rounds"), vec!["round-start"]);
        assert_eq!(h.broadcaster.event_names("sessions"), vec!["round-end"]);
    }

    #[tokio::test]
    async fn elimination_start_applies_the_oracle_decision() {
        let h = harness();
        let session = session_with_players(&["0xa", "0xb", "0xc"]);
        seeded_lobby(&h, &["0xa", "0xb", "0xc"]).await;
        h.oracle.eliminate(1, &["0xb"]);

        let round = session.rounds[0].clone();
        elimination_start(&h.state, &session, &round).await.expect("handler");

        let lobby = get_lobby(&h.state, 1, 1).await.expect("get").expect("lobby");
        let eliminated: Vec<_> = lobby
            .players
            .iter()
            .filter(|p| p.status == PlayerStatus::Eliminated)
            .map(|p| p.wallet_address.clone())
            .collect();
        assert_eq!(eliminated, vec!["0xb"]);

        let status = h
            .state
            .hot()
            .get(&keys::player_status_key(1, "0xb"))
            .await
            .expect("get")
            .expect("status");
        assert!(status.contains("eliminated"));

        let record = h
            .state
            .hot()
            .get(&keys::elimination_key(1))
            .await
            .expect("get")
            .expect("record");
        assert!(record.contains("0xb"));

        let events = h.broadcaster.events();
        assert_eq!(events[0].channel, "lobby-1");
        assert_eq!(events[0].event, "elimination-start");
        assert_eq!(events[0].data["eliminatedPlayers"][0], "0xb");
    }

    #[tokio::test]
    async fn elimination_start_never_announces_a_wallet_twice() {
        let h = harness();
        let session = session_with_players(&["0xa", "0xb", "0xc"]);
        seeded_lobby(&h, &["0xa", "0xb", "0xc"]).await;
        let round = session.rounds[0].clone();

        h.oracle.eliminate(1, &["0xb"]);
        elimination_start(&h.state, &session, &round).await.expect("first");

        // The oracle repeats an old elimination alongside a fresh one.
        h.oracle.eliminate(1, &["0xb", "0xc"]);
        elimination_start(&h.state, &session, &round).await.expect("second");

        let events = h.broadcaster.events();
        assert_eq!(events[1].data["eliminatedPlayers"].as_array().unwrap().len(), 1);
        assert_eq!(events[1].data["eliminatedPlayers"][0], "0xc");

        let record = h
            .state
            .hot()
            .get(&keys::elimination_key(1))
            .await
            .expect("get")
            .expect("record");
        let parsed: EliminationRecord = serde_json::from_str(&record).expect("parse");
        assert_eq!(parsed.eliminated_players, vec!["0xb", "0xc"]);
    }

    #[tokio::test]
    async fn elimination_start_oracle_failure_leaves_the_lobby_unchanged() {
        let h = harness();
        let session = session_with_players(&["0xa", "0xb"]);
        seeded_lobby(&h, &["0xa", "0xb"]).await;
        h.oracle.fail_eliminations();

        let round = session.rounds[0].clone();
        elimination_start(&h.state, &session, &round).await.expect("handler");

        let lobby = get_lobby(&h.state, 1, 1).await.expect("get").expect("lobby");
        assert!(lobby.players.iter().all(|p| p.status == PlayerStatus::Active));
        assert!(h.broadcaster.events().is_empty());
    }

    #[tokio::test]
    async fn elimination_end_completes_a_sole_survivor_lobby() {
        let h = harness();
        let session = session_with_players(&["0xa", "0xb", "0xc"]);
        seeded_lobby(&h, &["0xa", "0xb", "0xc"]).await;
        h.oracle.eliminate(1, &["0xb", "0xc"]);

        let round = session.rounds[0].clone();
        elimination_start(&h.state, &session, &round).await.expect("start");
        elimination_end(&h.state, &session, &round).await.expect("end");

        let names = h.broadcaster.event_names("lobby-1");
        assert_eq!(names, vec!["elimination-start", "elimination-end", "game-end"]);

        let lobby = get_lobby(&h.state, 1, 1).await.expect("get").expect("lobby");
        assert_eq!(lobby.status, LobbyStatus::Completed);

        // The completed lobby drops out of the voting fan-out entirely.
        voting_end(&h.state, &session, &round).await.expect("voting end");
        assert_eq!(
            h.broadcaster.event_names("lobby-1"),
            vec!["elimination-start", "elimination-end", "game-end"]
        );
    }

    #[tokio::test]
    async fn elimination_end_keeps_a_two_player_lobby_running() {
        let h = harness();
        let session = session_with_players(&["0xa", "0xb", "0xc"]);
        seeded_lobby(&h, &["0xa", "0xb", "0xc"]).await;
        h.oracle.eliminate(1, &["0xb"]);

        let round = session.rounds[0].clone();
        elimination_start(&h.state, &session, &round).await.expect("start");
        elimination_end(&h.state, &session, &round).await.expect("end");

        let names = h.broadcaster.event_names("lobby-1");
        assert_eq!(names, vec!["elimination-start", "elimination-end"]);

        let events = h.broadcaster.events();
        let remaining = events[1].data["remainingParticipants"].as_array().unwrap();
        assert_eq!(remaining.len(), 2);
    }

    #[tokio::test]
    async fn voting_start_clears_stale_tallies_and_announces() {
        let h = harness();
        let session = session_with_players(&["0xa"]);
        seeded_lobby(&h, &["0xa"]).await;

        let votes = keys::votes_key(1, 1, 1);
        h.state
            .hot()
            .list_push(&votes, &["share".to_owned()])
            .await
            .expect("seed stale vote");

        let round = session.rounds[0].clone();
        voting_start(&h.state, &session, &round).await.expect("handler");

        assert!(h.state.hot().list_range(&votes).await.expect("range").is_empty());
        assert_eq!(h.broadcaster.event_names("rounds"), vec!["voting-start"]);
    }

    #[tokio::test]
    async fn voting_end_resolves_a_tie_to_continue() {
        let h = harness();
        let session = session_with_players(&["0xa", "0xb", "0xc", "0xd"]);
        seeded_lobby(&h, &["0xa", "0xb", "0xc", "0xd"]).await;

        let votes = keys::votes_key(1, 1, 1);
        h.state
            .hot()
            .list_push(
                &votes,
                &[
                    "continue".to_owned(),
                    "share".to_owned(),
                    "continue".to_owned(),
                    "share".to_owned(),
                ],
            )
            .await
            .expect("seed votes");

        let round = session.rounds[0].clone();
        voting_end(&h.state, &session, &round).await.expect("handler");

        let events = h.broadcaster.events();
        assert_eq!(events[0].data["result"], "continue");

        let lobby = get_lobby(&h.state, 1, 1).await.expect("get").expect("lobby");
        assert_eq!(lobby.status, LobbyStatus::Active);
    }

    #[tokio::test]
    async fn voting_end_share_majority_completes_the_lobby() {
        let h = harness();
        let session = session_with_players(&["0xa", "0xb", "0xc"]);
        seeded_lobby(&h, &["0xa", "0xb", "0xc"]).await;

        let votes = keys::votes_key(1, 1, 1);
        h.state
            .hot()
            .list_push(
                &votes,
                &[
                    "share".to_owned(),
                    "share".to_owned(),
                    "continue".to_owned(),
                ],
            )
            .await
            .expect("seed votes");

        let round = session.rounds[0].clone();
        voting_end(&h.state, &session, &round).await.expect("handler");

        let events = h.broadcaster.events();
        assert_eq!(events[0].data["result"], "share");

        let lobby = get_lobby(&h.state, 1, 1).await.expect("get").expect("lobby");
        assert_eq!(lobby.status, LobbyStatus::Completed);

        // Tally is cleared either way.
        assert!(h.state.hot().list_range(&votes).await.expect("range").is_empty());
    }

    #[tokio::test]
    async fn session_end_announces_then_purges_everything() {
        let h = harness();
        let session = session_with_players(&["0xa", "0xb", "0xc"]);

        session_start(&h.state, &session).await.expect("session start");
        let round = session.rounds[0].clone();
        ai_message_start(&h.state, &session, &round).await.expect("announce");
        h.oracle.eliminate(1, &["0xb"]);
        elimination_start(&h.state, &session, &round).await.expect("eliminate");

        session_end(&h.state, &session).await.expect("session end");

        assert_eq!(
            h.broadcaster.event_names("sessions"),
            vec!["session-start", "session-end"]
        );
        assert!(h.hot.all_keys().is_empty(), "keys left: {:?}", h.hot.all_keys());
    }

    #[tokio::test]
    async fn dispatch_routes_round_events_and_rejects_unknown_rounds() {
        let h = harness();
        let session = session_with_players(&["0xa"]);

        let event = TimelineEvent {
            time: Utc::now(),
            kind: PhaseKind::RoundStart,
            round_number: Some(9),
        };
        let err = dispatch(&h.state, &session, &event).await.unwrap_err();
        match err {
            PhaseError::MissingRound { round_number, .. } => assert_eq!(round_number, 9),
            other => panic!("unexpected error: {other:?}"),
        }

        let event = TimelineEvent {
            time: Utc::now(),
            kind: PhaseKind::RoundStart,
            round_number: Some(1),
        };
        dispatch(&h.state, &session, &event).await.expect("dispatch");
        assert_eq!(h.broadcaster.event_names("rounds"), vec!["round-start"]);
    }
}
