//! Central worker state holding the open connections and runtime knobs.

use std::sync::Arc;

use crate::broadcast::Broadcaster;
use crate::config::WorkerSettings;
use crate::dao::{hot_store::HotStore, session_store::SessionStore};
use crate::oracle::DecisionOracle;

pub type SharedState = Arc<WorkerState>;

/// Handles created at startup and torn down on shutdown; the only
/// process-wide state besides the worker loop's completed-session guard.
pub struct WorkerState {
    sessions: Arc<dyn SessionStore>,
    hot: Arc<dyn HotStore>,
    oracle: Arc<dyn DecisionOracle>,
    broadcaster: Arc<dyn Broadcaster>,
    settings: WorkerSettings,
}

impl WorkerState {
    /// Bundle the connected collaborators into a [`SharedState`].
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        hot: Arc<dyn HotStore>,
        oracle: Arc<dyn DecisionOracle>,
        broadcaster: Arc<dyn Broadcaster>,
        settings: WorkerSettings,
    ) -> SharedState {
        Arc::new(Self {
            sessions,
            hot,
            oracle,
            broadcaster,
            settings,
        })
    }

    /// Authoritative store of sessions, rounds, and registrations.
    pub fn sessions(&self) -> &dyn SessionStore {
        self.sessions.as_ref()
    }

    /// Ephemeral lobby / vote / topic state and the inbound event bus.
    pub fn hot(&self) -> &dyn HotStore {
        self.hot.as_ref()
    }

    /// External decision oracle.
    pub fn oracle(&self) -> &dyn DecisionOracle {
        self.oracle.as_ref()
    }

    /// Real-time push channel toward end users.
    pub fn broadcaster(&self) -> &dyn Broadcaster {
        self.broadcaster.as_ref()
    }

    /// Runtime knobs consumed by the phase handlers.
    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }
}
