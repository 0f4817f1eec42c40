//! PostgreSQL-backed implementation of the session store.

pub mod error;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::time::timeout;
use tokio_postgres::{Client, NoTls, Row};
use tracing::error;

use crate::config::PgConfig;
use crate::dao::{
    models::{Player, PlayerStatus, Round, Session},
    session_store::SessionStore,
    storage::StorageResult,
};

use self::error::{PgDaoError, PgResult};

/// Per-query deadline for the relational store.
const QUERY_DEADLINE: Duration = Duration::from_secs(5);

const ACTIVE_SESSION_SQL: &str = "SELECT id \
     FROM sessions \
     WHERE start_time <= NOW() AND end_time >= NOW() \
     ORDER BY start_time ASC \
     LIMIT 1";

const NEXT_SESSION_SQL: &str = "SELECT id \
     FROM sessions \
     WHERE start_time > NOW() \
     ORDER BY start_time ASC \
     LIMIT 1";

const SESSION_SQL: &str = "SELECT id, name, entry_fee, max_total_players, total_rounds, \
            start_time, end_time, created_at \
     FROM sessions \
     WHERE id = $1";

const ROUNDS_SQL: &str = "SELECT id, session_id, round_number, ai_message_start, ai_message_end, \
            start_time, end_time, elimination_start, elimination_end, \
            voting_start_time, voting_end_time \
     FROM rounds \
     WHERE session_id = $1 \
     ORDER BY round_number ASC";

const PLAYERS_SQL: &str = "SELECT id, session_id, wallet_address, joined_at, status, \
            total_rounds_played \
     FROM players \
     WHERE session_id = $1 \
     ORDER BY joined_at ASC";

/// Session store reading from PostgreSQL over a spawned connection task.
pub struct PgSessionStore {
    client: Client,
}

impl PgSessionStore {
    /// Connect to PostgreSQL and spawn the background connection driver.
    pub async fn connect(config: PgConfig) -> PgResult<Self> {
        let mut pg = tokio_postgres::Config::new();
        pg.host(&config.host)
            .port(config.port)
            .user(&config.user)
            .dbname(&config.database);
        if let Some(password) = &config.password {
            pg.password(password);
        }

        let (client, connection) = pg.connect(NoTls).await.map_err(|source| {
            PgDaoError::Connect {
                host: config.host.clone(),
                source,
            }
        })?;

        tokio::spawn(async move {
            if let Err(err) = connection.await {
                error!(error = %err, "postgres connection task ended");
            }
        });

        Ok(Self { client })
    }

    async fn query(
        &self,
        sql: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
        operation: &'static str,
    ) -> PgResult<Vec<Row>> {
        timeout(QUERY_DEADLINE, self.client.query(sql, params))
            .await
            .map_err(|_| PgDaoError::Timeout { operation })?
            .map_err(|source| PgDaoError::Query { operation, source })
    }

    /// Resolve a single session id from a parameterless selector query.
    async fn select_session_id(
        &self,
        sql: &'static str,
        operation: &'static str,
    ) -> PgResult<Option<i64>> {
        let rows = self.query(sql, &[], operation).await?;
        match rows.first() {
            Some(row) => Ok(Some(get(row, "id", operation)?)),
            None => Ok(None),
        }
    }

    async fn load_session(&self, session_id: i64) -> PgResult<Option<Session>> {
        let rows = self.query(SESSION_SQL, &[&session_id], "session_by_id").await?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };

        let mut session = decode_session(row)?;
        session.rounds = self
            .query(ROUNDS_SQL, &[&session_id], "session_rounds")
            .await?
            .iter()
            .map(decode_round)
            .collect::<PgResult<Vec<_>>>()?;
        session.players = self
            .query(PLAYERS_SQL, &[&session_id], "session_players")
            .await?
            .iter()
            .map(decode_player)
            .collect::<PgResult<Vec<_>>>()?;

        Ok(Some(session))
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn active_session(&self) -> StorageResult<Option<Session>> {
        match self
            .select_session_id(ACTIVE_SESSION_SQL, "active_session")
            .await?
        {
            Some(id) => Ok(self.load_session(id).await?),
            None => Ok(None),
        }
    }

    async fn next_session(&self) -> StorageResult<Option<Session>> {
        match self
            .select_session_id(NEXT_SESSION_SQL, "next_session")
            .await?
        {
            Some(id) => Ok(self.load_session(id).await?),
            None => Ok(None),
        }
    }

    async fn session_by_id(&self, session_id: i64) -> StorageResult<Option<Session>> {
        Ok(self.load_session(session_id).await?)
    }
}

fn decode_session(row: &Row) -> PgResult<Session> {
    const OP: &str = "session_by_id";
    Ok(Session {
        id: get(row, "id", OP)?,
        name: get(row, "name", OP)?,
        entry_fee: get(row, "entry_fee", OP)?,
        max_total_players: get(row, "max_total_players", OP)?,
        total_rounds: get(row, "total_rounds", OP)?,
        start_time: get::<DateTime<Utc>>(row, "start_time", OP)?,
        end_time: get::<DateTime<Utc>>(row, "end_time", OP)?,
        created_at: get::<DateTime<Utc>>(row, "created_at", OP)?,
        rounds: Vec::new(),
        players: Vec::new(),
    })
}

fn decode_round(row: &Row) -> PgResult<Round> {
    const OP: &str = "session_rounds";
    Ok(Round {
        id: get(row, "id", OP)?,
        session_id: get(row, "session_id", OP)?,
        round_number: get(row, "round_number", OP)?,
        ai_message_start: get(row, "ai_message_start", OP)?,
        ai_message_end: get(row, "ai_message_end", OP)?,
        start_time: get(row, "start_time", OP)?,
        end_time: get(row, "end_time", OP)?,
        elimination_start: get(row, "elimination_start", OP)?,
        elimination_end: get(row, "elimination_end", OP)?,
        voting_start_time: get(row, "voting_start_time", OP)?,
        voting_end_time: get(row, "voting_end_time", OP)?,
    })
}

fn decode_player(row: &Row) -> PgResult<Player> {
    const OP: &str = "session_players";
    let raw_status: String = get(row, "status", OP)?;
    let status = PlayerStatus::parse(&raw_status).ok_or_else(|| PgDaoError::Decode {
        operation: OP,
        detail: format!("unknown player status `{raw_status}`"),
    })?;

    Ok(Player {
        id: get(row, "id", OP)?,
        session_id: get(row, "session_id", OP)?,
        wallet_address: get(row, "wallet_address", OP)?,
        joined_at: get(row, "joined_at", OP)?,
        status,
        total_rounds_played: get(row, "total_rounds_played", OP)?,
    })
}

fn get<'a, T>(row: &'a Row, column: &str, operation: &'static str) -> PgResult<T>
where
    T: tokio_postgres::types::FromSql<'a>,
{
    row.try_get(column).map_err(|source| PgDaoError::Decode {
        operation,
        detail: format!("column `{column}`: {source}"),
    })
}
