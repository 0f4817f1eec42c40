//! Top-level scheduling loop tying selector, timeline, clock, and phase handlers together.

use std::collections::HashSet;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::clock::{self, SleepOutcome};
use crate::dao::models::Session;
use crate::services::{phases, selector, timeline};
use crate::state::SharedState;

/// How driving one session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MonitorOutcome {
    /// The timeline was exhausted or SESSION_END dispatched.
    Finished,
    /// The shutdown signal fired mid-session.
    Cancelled,
}

/// Drive sessions one at a time until shutdown.
///
/// The completed-set guard is the only cross-session state; it keeps a
/// session from being driven twice when the selector (or a duplicated
/// pub/sub delivery) hands it back after SESSION_END.
pub async fn run(state: SharedState, mut shutdown: watch::Receiver<bool>) {
    let mut completed: HashSet<i64> = HashSet::new();
    info!("worker loop started");

    loop {
        let Some(session) = selector::pick(&state, &completed, &mut shutdown).await else {
            break;
        };
        if completed.contains(&session.id) {
            continue;
        }

        info!(
            session_id = session.id,
            name = %session.name,
            rounds = session.rounds.len(),
            players = session.players.len(),
            "driving session"
        );

        match monitor(&state, &session, &mut shutdown).await {
            MonitorOutcome::Finished => {
                completed.insert(session.id);
                info!(session_id = session.id, "session complete");
            }
            MonitorOutcome::Cancelled => break,
        }
    }

    info!("worker loop stopped");
}

/// Walk one session's timeline, sleeping to each boundary and dispatching it.
///
/// Restart-safe by construction: `next_event` only ever returns boundaries
/// that are still in the future, so a worker resuming mid-session picks up
/// at the first unreached one.
async fn monitor(
    state: &SharedState,
    session: &Session,
    shutdown: &mut watch::Receiver<bool>,
) -> MonitorOutcome {
    loop {
        let Some(event) = timeline::next_event(session, Utc::now()) else {
            info!(session_id = session.id, "timeline exhausted");
            return MonitorOutcome::Finished;
        };

        match clock::sleep_until(event.time, shutdown).await {
            SleepOutcome::Cancelled => return MonitorOutcome::Cancelled,
            SleepOutcome::Reached | SleepOutcome::PastDeadline => {}
        }

        debug!(
            session_id = session.id,
            kind = ?event.kind,
            round = ?event.round_number,
            "dispatching phase boundary"
        );

        if let Err(err) = phases::dispatch(state, session, &event).await {
            error!(
                session_id = session.id,
                kind = ?event.kind,
                error = %err,
                "phase handler failed; advancing to next boundary"
            );
        }

        if event.kind == timeline::PhaseKind::SessionEnd {
            return MonitorOutcome::Finished;
        }
    }
}
