//! Session timelines as pure data.
//!
//! The timeline is materialized once per session and traversed by the worker
//! loop. `next_event` depends only on the session record and the current
//! instant, which is what makes mid-session restarts resume correctly:
//! boundaries already in the past are simply never returned again.

use chrono::{DateTime, Utc};

use crate::dao::models::{Round, Session};

/// The phase boundary kinds, declared in canonical tie-break order.
///
/// When two boundaries share a timestamp the earlier variant wins, so a
/// round whose `ai_message_start` coincides with its `start_time` still
/// announces before it opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PhaseKind {
    SessionStart,
    AiMessageStart,
    AiMessageEnd,
    RoundStart,
    RoundEnd,
    EliminationStart,
    EliminationEnd,
    VotingStart,
    VotingEnd,
    SessionEnd,
}

/// One wall-clock boundary in a session's life.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEvent {
    pub time: DateTime<Utc>,
    pub kind: PhaseKind,
    /// Sequence number of the owning round; `None` for session boundaries.
    pub round_number: Option<i32>,
}

/// Materialize the ordered list of boundaries for a session.
pub fn build(session: &Session) -> Vec<TimelineEvent> {
    let mut events = Vec::with_capacity(session.rounds.len() * 8 + 2);

    events.push(TimelineEvent {
        time: session.start_time,
        kind: PhaseKind::SessionStart,
        round_number: None,
    });
    for round in &session.rounds {
        for (time, kind) in round_boundaries(round) {
            events.push(TimelineEvent {
                time,
                kind,
                round_number: Some(round.round_number),
            });
        }
    }
    events.push(TimelineEvent {
        time: session.end_time,
        kind: PhaseKind::SessionEnd,
        round_number: None,
    });

    events.sort_by(|a, b| {
        a.time
            .cmp(&b.time)
            .then(a.kind.cmp(&b.kind))
            .then(a.round_number.cmp(&b.round_number))
    });
    events
}

/// The earliest boundary strictly after `now`, or `None` once the session window closed.
pub fn next_event(session: &Session, now: DateTime<Utc>) -> Option<TimelineEvent> {
    if now >= session.end_time {
        return None;
    }
    build(session).into_iter().find(|event| event.time > now)
}

fn round_boundaries(round: &Round) -> [(DateTime<Utc>, PhaseKind); 8] {
    [
        (round.ai_message_start, PhaseKind::AiMessageStart),
        (round.ai_message_end, PhaseKind::AiMessageEnd),
        (round.start_time, PhaseKind::RoundStart),
        (round.end_time, PhaseKind::RoundEnd),
        (round.elimination_start, PhaseKind::EliminationStart),
        (round.elimination_end, PhaseKind::EliminationEnd),
        (round.voting_start_time, PhaseKind::VotingStart),
        (round.voting_end_time, PhaseKind::VotingEnd),
    ]
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use crate::testing::{round_fixture, session_fixture};

    use super::*;

    #[test]
    fn timeline_is_ordered_with_session_boundaries() {
        let start = Utc::now();
        let mut session = session_fixture(1, start, start + Duration::minutes(20));
        session.rounds = vec![
            round_fixture(1, 1, start, Duration::seconds(30)),
            round_fixture(1, 2, start + Duration::minutes(5), Duration::seconds(30)),
        ];

        let events = build(&session);
        assert_eq!(events.len(), 18);
        assert_eq!(events.first().map(|e| e.kind), Some(PhaseKind::SessionStart));
        assert_eq!(events.last().map(|e| e.kind), Some(PhaseKind::SessionEnd));
        assert!(events.windows(2).all(|pair| pair[0].time <= pair[1].time));

        let round_one: Vec<PhaseKind> = events
            .iter()
            .filter(|e| e.round_number == Some(1))
            .map(|e| e.kind)
            .collect();
        assert_eq!(
            round_one,
            vec![
                PhaseKind::AiMessageStart,
                PhaseKind::AiMessageEnd,
                PhaseKind::RoundStart,
                PhaseKind::RoundEnd,
                PhaseKind::EliminationStart,
                PhaseKind::EliminationEnd,
                PhaseKind::VotingStart,
                PhaseKind::VotingEnd,
            ]
        );
    }

    #[test]
    fn coinciding_timestamps_break_ties_by_phase_order() {
        let start = Utc::now();
        let mut session = session_fixture(1, start, start + Duration::minutes(10));
        // All eight boundaries collapse onto the same instant.
        session.rounds = vec![round_fixture(1, 1, start + Duration::minutes(1), Duration::zero())];

        let events = build(&session);
        let kinds: Vec<PhaseKind> = events
            .iter()
            .filter(|e| e.round_number == Some(1))
            .map(|e| e.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                PhaseKind::AiMessageStart,
                PhaseKind::AiMessageEnd,
                PhaseKind::RoundStart,
                PhaseKind::RoundEnd,
                PhaseKind::EliminationStart,
                PhaseKind::EliminationEnd,
                PhaseKind::VotingStart,
                PhaseKind::VotingEnd,
            ]
        );
    }

    #[test]
    fn next_event_skips_boundaries_already_past() {
        let start = Utc::now() - Duration::minutes(5);
        let mut session = session_fixture(1, start, start + Duration::minutes(10));
        session.rounds = vec![round_fixture(1, 1, start, Duration::minutes(1))];

        // Between round end (start+3m) and elimination start (start+4m).
        let now = start + Duration::minutes(3) + Duration::seconds(30);
        let event = next_event(&session, now).expect("event expected");
        assert_eq!(event.kind, PhaseKind::EliminationStart);
        assert_eq!(event.round_number, Some(1));
    }

    #[test]
    fn next_event_is_none_after_session_end() {
        let start = Utc::now() - Duration::minutes(20);
        let session = session_fixture(1, start, start + Duration::minutes(10));
        assert!(next_event(&session, Utc::now()).is_none());
    }

    #[test]
    fn next_event_before_start_is_session_start() {
        let start = Utc::now() + Duration::minutes(5);
        let mut session = session_fixture(1, start, start + Duration::minutes(20));
        session.rounds = vec![round_fixture(1, 1, start, Duration::minutes(1))];

        let event = next_event(&session, Utc::now()).expect("event expected");
        assert_eq!(event.kind, PhaseKind::SessionStart);
    }

    #[test]
    fn session_end_is_the_final_returned_event() {
        let start = Utc::now() - Duration::minutes(9);
        let session = session_fixture(1, start, start + Duration::minutes(10));

        let event = next_event(&session, Utc::now()).expect("event expected");
        assert_eq!(event.kind, PhaseKind::SessionEnd);
    }
}
