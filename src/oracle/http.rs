//! HTTP implementation of the decision oracle client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::config::OracleConfig;

use super::error::{OracleError, OracleResult};
use super::{DecisionOracle, EliminatedParticipant, EliminationDecision, EliminationRequest};

/// Per-call deadline for oracle requests; the model's latency is unreliable.
const REQUEST_DEADLINE: Duration = Duration::from_secs(30);

/// Body of a `roundAnnouncement` response.
#[derive(Debug, Deserialize)]
struct AnnouncementResponse {
    data: String,
}

/// Body of a `decideEliminations` response.
#[derive(Debug, Deserialize)]
struct EliminationsResponse {
    #[serde(default)]
    response: Vec<EliminatedParticipant>,
    success: bool,
}

/// Decision oracle speaking HTTP to the external AI service.
#[derive(Clone)]
pub struct HttpDecisionOracle {
    client: Client,
    base_url: String,
}

impl HttpDecisionOracle {
    /// Build the HTTP client with the oracle deadline baked in.
    pub fn new(config: OracleConfig) -> OracleResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_DEADLINE)
            .build()
            .map_err(|source| OracleError::ClientBuilder { source })?;

        Ok(Self {
            client,
            base_url: config.base_url,
        })
    }
}

#[async_trait]
impl DecisionOracle for HttpDecisionOracle {
    async fn round_announcement(&self, agent_id: &str, round_number: i32) -> OracleResult<String> {
        let path = format!("{agent_id}/roundAnnouncement/{round_number}");
        let url = format!("{}/{path}", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| OracleError::RequestSend {
                path: path.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::RequestStatus { path, status });
        }

        let body: AnnouncementResponse =
            response
                .json()
                .await
                .map_err(|source| OracleError::DecodeResponse { path, source })?;

        Ok(body.data)
    }

    async fn decide_eliminations(
        &self,
        request: &EliminationRequest,
    ) -> OracleResult<EliminationDecision> {
        let path = "decideEliminations".to_owned();
        let url = format!("{}/{path}", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|source| OracleError::RequestSend {
                path: path.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::RequestStatus { path, status });
        }

        let body: EliminationsResponse =
            response
                .json()
                .await
                .map_err(|source| OracleError::DecodeResponse { path, source })?;

        Ok(EliminationDecision {
            eliminated: body.response,
            success: body.success,
        })
    }
}
