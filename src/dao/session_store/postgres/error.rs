//! Error types for the PostgreSQL session store.

use thiserror::Error;

use crate::dao::storage::StorageError;

/// Convenient result alias returning [`PgDaoError`] failures.
pub type PgResult<T> = Result<T, PgDaoError>;

/// Failures that can occur while talking to PostgreSQL.
#[derive(Debug, Error)]
pub enum PgDaoError {
    /// Initial connection could not be established.
    #[error("failed to connect to PostgreSQL at `{host}`")]
    Connect {
        host: String,
        #[source]
        source: tokio_postgres::Error,
    },
    /// A query failed to execute.
    #[error("query `{operation}` failed")]
    Query {
        operation: &'static str,
        #[source]
        source: tokio_postgres::Error,
    },
    /// A row could not be decoded into the domain model.
    #[error("failed to decode row for `{operation}`: {detail}")]
    Decode {
        operation: &'static str,
        detail: String,
    },
    /// A query exceeded its deadline.
    #[error("query `{operation}` timed out")]
    Timeout { operation: &'static str },
}

impl From<PgDaoError> for StorageError {
    fn from(err: PgDaoError) -> Self {
        match err {
            PgDaoError::Timeout { operation } => StorageError::Timeout { operation },
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
