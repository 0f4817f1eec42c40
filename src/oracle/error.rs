//! Error types for the decision oracle client.

use reqwest::StatusCode;
use thiserror::Error;

/// Convenient result alias returning [`OracleError`] failures.
pub type OracleResult<T> = Result<T, OracleError>;

/// Failures that can occur while calling the decision oracle.
#[derive(Debug, Error)]
pub enum OracleError {
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build oracle client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// A request could not be sent or timed out in flight.
    #[error("failed to send oracle request to `{path}`")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// The oracle returned a non-success status code.
    #[error("unexpected oracle response status {status} for `{path}`")]
    RequestStatus { path: String, status: StatusCode },
    /// Response payload could not be parsed into the expected shape.
    #[error("failed to decode oracle response for `{path}`")]
    DecodeResponse {
        path: String,
        #[source]
        source: reqwest::Error,
    },
}
