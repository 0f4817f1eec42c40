//! Selection of the session the worker drives next.
//!
//! Prefers the currently active session, then the next scheduled one; when
//! neither exists the selector parks on the `new-session` pub/sub channel
//! until an external API announces a freshly created session. Double
//! delivery on that channel is harmless because the worker's completed-set
//! guard filters repeats.

use std::collections::HashSet;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::clock::{self, SleepOutcome};
use crate::dao::models::Session;
use crate::dao::storage::StorageResult;
use crate::dto::events::{NewSessionEvent, NewSessionMessage};
use crate::keys;
use crate::state::SharedState;

const EVENT_NEW_SESSION: &str = "new-session";

/// Backoff applied after a transient store failure.
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Pick the session to drive next; `None` means shutdown was requested.
pub async fn pick(
    state: &SharedState,
    completed: &HashSet<i64>,
    shutdown: &mut watch::Receiver<bool>,
) -> Option<Session> {
    loop {
        if *shutdown.borrow() {
            return None;
        }

        match scheduled_session(state).await {
            Ok(Some(session)) if !completed.contains(&session.id) => return Some(session),
            Ok(Some(session)) => {
                info!(
                    session_id = session.id,
                    "scheduled session already driven; waiting for a new one"
                );
            }
            Ok(None) => {}
            Err(err) => {
                error!(error = %err, "failed to query scheduled sessions; retrying");
                if clock::sleep_for(RETRY_DELAY, shutdown).await == SleepOutcome::Cancelled {
                    return None;
                }
                continue;
            }
        }

        match wait_for_new_session(state, completed, shutdown).await {
            Some(session) => return Some(session),
            None if *shutdown.borrow() => return None,
            None => {}
        }
    }
}

/// Active session first, then the next scheduled one.
async fn scheduled_session(state: &SharedState) -> StorageResult<Option<Session>> {
    if let Some(session) = state.sessions().active_session().await? {
        return Ok(Some(session));
    }
    state.sessions().next_session().await
}

/// Park on the `new-session` channel until a usable session arrives.
///
/// Returns `None` on shutdown or when the delivered message could not be
/// turned into a session (the caller re-enters the store-backed path).
async fn wait_for_new_session(
    state: &SharedState,
    completed: &HashSet<i64>,
    shutdown: &mut watch::Receiver<bool>,
) -> Option<Session> {
    info!("no session scheduled; waiting on the new-session channel");

    let waited = tokio::select! {
        result = state.hot().wait_for_message(keys::NEW_SESSION_CHANNEL) => Some(result),
        _ = shutdown.changed() => None,
    };
    let payload = match waited {
        Some(Ok(payload)) => payload,
        Some(Err(err)) => {
            error!(error = %err, "new-session subscription failed; retrying");
            clock::sleep_for(RETRY_DELAY, shutdown).await;
            return None;
        }
        None => return None,
    };

    let message: NewSessionMessage = match serde_json::from_str(&payload) {
        Ok(message) => message,
        Err(err) => {
            warn!(%payload, error = %err, "unparseable new-session payload; ignored");
            return None;
        }
    };

    if completed.contains(&message.session_id) {
        info!(
            session_id = message.session_id,
            "announced session already driven; ignored"
        );
        return None;
    }

    match state.sessions().session_by_id(message.session_id).await {
        Ok(Some(session)) => {
            broadcast_new_session(state, &session).await;
            Some(session)
        }
        Ok(None) => {
            warn!(
                session_id = message.session_id,
                "announced session not found in relational store; ignored"
            );
            None
        }
        Err(err) => {
            error!(
                session_id = message.session_id,
                error = %err,
                "failed to load announced session; retrying"
            );
            clock::sleep_for(RETRY_DELAY, shutdown).await;
            None
        }
    }
}

/// Relay the adopted session to end-user clients.
async fn broadcast_new_session(state: &SharedState, session: &Session) {
    let payload = NewSessionEvent {
        session_id: session.id,
        start_time: session.start_time,
        end_time: session.end_time,
        name: session.name.clone(),
    };
    match serde_json::to_value(&payload) {
        Ok(value) => {
            state
                .broadcaster()
                .publish(keys::SESSIONS_CHANNEL, EVENT_NEW_SESSION, value)
                .await;
        }
        Err(err) => {
            warn!(error = %err, "failed to serialize new-session broadcast");
        }
    }
}
