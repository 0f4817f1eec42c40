//! In-memory collaborators and fixtures shared by the service tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::StatusCode;

use crate::broadcast::Broadcaster;
use crate::config::WorkerSettings;
use crate::dao::hot_store::HotStore;
use crate::dao::models::{Player, PlayerStatus, Round, Session};
use crate::dao::session_store::SessionStore;
use crate::dao::storage::StorageResult;
use crate::oracle::error::{OracleError, OracleResult};
use crate::oracle::{
    DecisionOracle, EliminatedParticipant, EliminationDecision, EliminationRequest,
};
use crate::state::{SharedState, WorkerState};

/// Everything a service test needs, with the fakes kept reachable.
pub struct TestHarness {
    pub state: SharedState,
    pub hot: Arc<MemoryHotStore>,
    pub sessions: Arc<MemorySessionStore>,
    pub oracle: Arc<ScriptedOracle>,
    pub broadcaster: Arc<RecordingBroadcaster>,
}

/// Build a harness around fresh in-memory collaborators.
pub fn harness() -> TestHarness {
    let hot = Arc::new(MemoryHotStore::new());
    let sessions = Arc::new(MemorySessionStore::new());
    let oracle = Arc::new(ScriptedOracle::new());
    let broadcaster = Arc::new(RecordingBroadcaster::new());

    let state = WorkerState::new(
        sessions.clone(),
        hot.clone(),
        oracle.clone(),
        broadcaster.clone(),
        WorkerSettings {
            agent_id: "game-master".to_owned(),
            max_players_per_lobby: 10,
        },
    );

    TestHarness {
        state,
        hot,
        sessions,
        oracle,
        broadcaster,
    }
}

/// Session with an empty roster and timeline between `start` and `end`.
pub fn session_fixture(id: i64, start: DateTime<Utc>, end: DateTime<Utc>) -> Session {
    Session {
        id,
        name: format!("session-{id}"),
        entry_fee: 100,
        max_total_players: 10,
        total_rounds: 1,
        start_time: start,
        end_time: end,
        created_at: start - Duration::hours(1),
        rounds: Vec::new(),
        players: Vec::new(),
    }
}

/// Round whose eight boundaries sit at `base + i * spacing` in canonical order.
pub fn round_fixture(
    session_id: i64,
    round_number: i32,
    base: DateTime<Utc>,
    spacing: Duration,
) -> Round {
    let at = |i: i32| base + spacing * i;
    Round {
        id: round_number as i64,
        session_id,
        round_number,
        ai_message_start: at(0),
        ai_message_end: at(1),
        start_time: at(2),
        end_time: at(3),
        elimination_start: at(4),
        elimination_end: at(5),
        voting_start_time: at(6),
        voting_end_time: at(7),
    }
}

/// Active registration for `wallet`.
pub fn player_fixture(session_id: i64, wallet: &str) -> Player {
    Player {
        id: 0,
        session_id,
        wallet_address: wallet.to_owned(),
        joined_at: Utc::now(),
        status: PlayerStatus::Active,
        total_rounds_played: 0,
    }
}

#[derive(Default)]
struct MemoryMaps {
    strings: HashMap<String, String>,
    sets: HashMap<String, Vec<String>>,
    lists: HashMap<String, Vec<String>>,
}

/// Hot store backed by plain maps plus a scripted pub/sub queue.
#[derive(Default)]
pub struct MemoryHotStore {
    maps: Mutex<MemoryMaps>,
    messages: Mutex<HashMap<String, VecDeque<String>>>,
}

impl MemoryHotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a payload for the next `wait_for_message` on `channel`.
    pub fn script_message(&self, channel: &str, payload: &str) {
        self.messages
            .lock()
            .expect("messages lock")
            .entry(channel.to_owned())
            .or_default()
            .push_back(payload.to_owned());
    }

    /// Every live key across strings, sets, and lists.
    pub fn all_keys(&self) -> Vec<String> {
        let maps = self.maps.lock().expect("maps lock");
        maps.strings
            .keys()
            .chain(maps.sets.keys())
            .chain(maps.lists.keys())
            .cloned()
            .collect()
    }
}

#[async_trait]
impl HotStore for MemoryHotStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let maps = self.maps.lock().expect("maps lock");
        Ok(maps.strings.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut maps = self.maps.lock().expect("maps lock");
        maps.strings.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> StorageResult<()> {
        let mut maps = self.maps.lock().expect("maps lock");
        for key in keys {
            maps.strings.remove(key);
            maps.sets.remove(key);
            maps.lists.remove(key);
        }
        Ok(())
    }

    async fn set_add(&self, key: &str, members: &[String]) -> StorageResult<()> {
        let mut maps = self.maps.lock().expect("maps lock");
        let set = maps.sets.entry(key.to_owned()).or_default();
        for member in members {
            if !set.contains(member) {
                set.push(member.clone());
            }
        }
        Ok(())
    }

    async fn set_members(&self, key: &str) -> StorageResult<Vec<String>> {
        let maps = self.maps.lock().expect("maps lock");
        Ok(maps.sets.get(key).cloned().unwrap_or_default())
    }

    async fn list_push(&self, key: &str, values: &[String]) -> StorageResult<()> {
        let mut maps = self.maps.lock().expect("maps lock");
        maps.lists
            .entry(key.to_owned())
            .or_default()
            .extend(values.iter().cloned());
        Ok(())
    }

    async fn list_range(&self, key: &str) -> StorageResult<Vec<String>> {
        let maps = self.maps.lock().expect("maps lock");
        Ok(maps.lists.get(key).cloned().unwrap_or_default())
    }

    async fn wait_for_message(&self, channel: &str) -> StorageResult<String> {
        let scripted = {
            let mut messages = self.messages.lock().expect("messages lock");
            messages.get_mut(channel).and_then(VecDeque::pop_front)
        };
        match scripted {
            Some(payload) => Ok(payload),
            // Nothing scripted: park forever, as a quiet channel would.
            None => futures::future::pending().await,
        }
    }
}

/// Session store over a vector of sessions, with scheduling visibility control.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<Vec<Session>>,
    hidden: Mutex<HashSet<i64>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Session) {
        self.sessions.lock().expect("sessions lock").push(session);
    }

    /// Exclude a session from `active_session` / `next_session` while keeping
    /// it reachable by id, mimicking a row created after the scheduled query.
    pub fn hide_from_schedule(&self, session_id: i64) {
        self.hidden.lock().expect("hidden lock").insert(session_id);
    }

    fn visible(&self) -> Vec<Session> {
        let hidden = self.hidden.lock().expect("hidden lock").clone();
        self.sessions
            .lock()
            .expect("sessions lock")
            .iter()
            .filter(|session| !hidden.contains(&session.id))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn active_session(&self) -> StorageResult<Option<Session>> {
        let now = Utc::now();
        let mut candidates: Vec<Session> = self
            .visible()
            .into_iter()
            .filter(|session| session.start_time <= now && session.end_time >= now)
            .collect();
        candidates.sort_by_key(|session| session.start_time);
        Ok(candidates.into_iter().next())
    }

    async fn next_session(&self) -> StorageResult<Option<Session>> {
        let now = Utc::now();
        let mut candidates: Vec<Session> = self
            .visible()
            .into_iter()
            .filter(|session| session.start_time > now)
            .collect();
        candidates.sort_by_key(|session| session.start_time);
        Ok(candidates.into_iter().next())
    }

    async fn session_by_id(&self, session_id: i64) -> StorageResult<Option<Session>> {
        Ok(self
            .sessions
            .lock()
            .expect("sessions lock")
            .iter()
            .find(|session| session.id == session_id)
            .cloned())
    }
}

/// Oracle whose answers are scripted per test.
pub struct ScriptedOracle {
    topic: Mutex<Option<String>>,
    eliminations: Mutex<HashMap<i32, Vec<String>>>,
    fail_eliminations: AtomicBool,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self {
            topic: Mutex::new(Some("Share secrets.".to_owned())),
            eliminations: Mutex::new(HashMap::new()),
            fail_eliminations: AtomicBool::new(false),
        }
    }

    /// Set the announcement topic; `None` makes the call fail.
    pub fn set_topic(&self, topic: Option<&str>) {
        *self.topic.lock().expect("topic lock") = topic.map(str::to_owned);
    }

    /// Script the wallets eliminated for a lobby.
    pub fn eliminate(&self, lobby_id: i32, wallets: &[&str]) {
        self.eliminations
            .lock()
            .expect("eliminations lock")
            .insert(lobby_id, wallets.iter().map(|w| (*w).to_owned()).collect());
    }

    /// Make every elimination call fail with a server error.
    pub fn fail_eliminations(&self) {
        self.fail_eliminations.store(true, Ordering::SeqCst);
    }
}

impl Default for ScriptedOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DecisionOracle for ScriptedOracle {
    async fn round_announcement(&self, agent_id: &str, round_number: i32) -> OracleResult<String> {
        match self.topic.lock().expect("topic lock").clone() {
            Some(topic) => Ok(topic),
            None => Err(OracleError::RequestStatus {
                path: format!("{agent_id}/roundAnnouncement/{round_number}"),
                status: StatusCode::SERVICE_UNAVAILABLE,
            }),
        }
    }

    async fn decide_eliminations(
        &self,
        request: &EliminationRequest,
    ) -> OracleResult<EliminationDecision> {
        if self.fail_eliminations.load(Ordering::SeqCst) {
            return Err(OracleError::RequestStatus {
                path: "decideEliminations".to_owned(),
                status: StatusCode::INTERNAL_SERVER_ERROR,
            });
        }

        let wallets = self
            .eliminations
            .lock()
            .expect("eliminations lock")
            .get(&request.lobby_id)
            .cloned()
            .unwrap_or_default();

        Ok(EliminationDecision {
            eliminated: wallets
                .into_iter()
                .map(|participant| EliminatedParticipant {
                    participant,
                    reason: None,
                })
                .collect(),
            success: true,
        })
    }
}

/// One captured broadcast.
#[derive(Debug, Clone)]
pub struct RecordedEvent {
    pub channel: String,
    pub event: String,
    pub data: serde_json::Value,
}

/// Broadcaster that records instead of publishing.
#[derive(Default)]
pub struct RecordingBroadcaster {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().expect("events lock").clone()
    }

    /// Event names captured on one channel, in publish order.
    pub fn event_names(&self, channel: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|event| event.channel == channel)
            .map(|event| event.event)
            .collect()
    }
}

#[async_trait]
impl Broadcaster for RecordingBroadcaster {
    async fn publish(&self, channel: &str, event: &str, payload: serde_json::Value) {
        self.events.lock().expect("events lock").push(RecordedEvent {
            channel: channel.to_owned(),
            event: event.to_owned(),
            data: payload,
        });
    }
}
