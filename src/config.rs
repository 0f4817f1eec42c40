//! Environment-driven configuration for the worker process.

use std::env;

use thiserror::Error;
use tracing::info;

/// Default hot-store URL used when `REDIS_URL` is absent.
const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";
/// Default oracle agent identifier used when `AI_AGENT_ID` is absent.
const DEFAULT_AGENT_ID: &str = "game-master";
/// Default upper bound on players per lobby used when `MAX_PLAYERS_PER_LOBBY` is absent.
const DEFAULT_MAX_PLAYERS_PER_LOBBY: usize = 10;
/// Default relational store port.
const DEFAULT_PG_PORT: u16 = 5432;

/// Failures raised while reading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// Environment variable holds a value that cannot be parsed.
    #[error("invalid value `{value}` for environment variable `{var}`")]
    InvalidVar { var: &'static str, value: String },
    /// The process timezone must be UTC because session timelines are wall-clock driven.
    #[error("TZ must be `UTC`, found `{value}`")]
    InvalidTimezone { value: String },
}

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub pg: PgConfig,
    pub redis_url: String,
    pub oracle: OracleConfig,
    pub worker: WorkerSettings,
}

/// Connection parameters for the relational store.
#[derive(Debug, Clone)]
pub struct PgConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub database: String,
}

/// Connection parameters for the decision oracle.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub base_url: String,
}

/// Knobs consumed directly by the worker loop and phase handlers.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Oracle agent identifier passed on every announcement and elimination call.
    pub agent_id: String,
    /// Upper bound on lobby size handed to the player distributor.
    pub max_players_per_lobby: usize,
}

impl AppConfig {
    /// Load the full worker configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        ensure_utc()?;

        let pg = PgConfig::from_env()?;
        let redis_url =
            env::var("REDIS_URL").unwrap_or_else(|_| DEFAULT_REDIS_URL.to_owned());
        let oracle = OracleConfig::from_env()?;
        let worker = WorkerSettings::from_env()?;

        info!(
            pg_host = %pg.host,
            pg_database = %pg.database,
            oracle_base_url = %oracle.base_url,
            max_players_per_lobby = worker.max_players_per_lobby,
            "configuration loaded"
        );

        Ok(Self {
            pg,
            redis_url,
            oracle,
            worker,
        })
    }
}

impl PgConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let host = require("PG_HOST")?;
        let user = require("PG_USER")?;
        let database = require("PG_DATABASE")?;
        let password = env::var("PG_PASSWORD").ok().filter(|v| !v.is_empty());
        let port = match env::var("PG_PORT") {
            Ok(raw) => raw.parse::<u16>().map_err(|_| ConfigError::InvalidVar {
                var: "PG_PORT",
                value: raw,
            })?,
            Err(_) => DEFAULT_PG_PORT,
        };

        Ok(Self {
            host,
            port,
            user,
            password,
            database,
        })
    }
}

impl OracleConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base_url = require("AI_API_BASE_URL")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }
}

impl WorkerSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let agent_id =
            env::var("AI_AGENT_ID").unwrap_or_else(|_| DEFAULT_AGENT_ID.to_owned());
        let max_players_per_lobby = match env::var("MAX_PLAYERS_PER_LOBBY") {
            Ok(raw) => match raw.parse::<usize>() {
                Ok(value) if value >= 1 => value,
                _ => {
                    return Err(ConfigError::InvalidVar {
                        var: "MAX_PLAYERS_PER_LOBBY",
                        value: raw,
                    });
                }
            },
            Err(_) => DEFAULT_MAX_PLAYERS_PER_LOBBY,
        };

        Ok(Self {
            agent_id,
            max_players_per_lobby,
        })
    }
}

fn require(var: &'static str) -> Result<String, ConfigError> {
    env::var(var)
        .ok()
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::MissingEnvVar { var })
}

/// Timelines are stored and compared in UTC; a different process timezone is a startup error.
fn ensure_utc() -> Result<(), ConfigError> {
    match env::var("TZ") {
        Ok(value) if value != "UTC" => Err(ConfigError::InvalidTimezone { value }),
        _ => Ok(()),
    }
}

