use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::{EscrowReceipt, RiskAssessment, UserId, Vendor, VendorId},
    error::{ApiError, BackendErrorBody, ErrorCode},
    protocol::{
        AgentRunResponse, AgentRunResult, EscrowExecuteRequest, EscrowExecuteResponse,
        FindVendorsRequest, LoanRequest, RiskAssessmentRequest, ESCROW_EXECUTE_PATH,
        FIND_VENDORS_PATH, RISK_ASSESSMENT_PATH, RUN_AGENTS_PATH,
    },
};
use thiserror::Error;
use tracing::{debug, error, warn};

pub mod agents;
pub mod config;
pub mod controller;
pub mod graph;
pub mod marketplace;
pub mod shell;

pub use agents::{AgentSwarm, AgentTranscript, RunOutcome};
pub use config::Settings;
pub use controller::{ControllerError, DemoIdentity, StageController, WorkflowSnapshot};
pub use graph::{project, GraphState};
pub use shell::{sidebar, ShellAction, SidebarPanel};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("transport failure calling {endpoint}: {reason}")]
    Transport {
        endpoint: &'static str,
        reason: String,
    },
    #[error("{endpoint} returned HTTP {status}: {detail}")]
    Status {
        endpoint: &'static str,
        status: u16,
        detail: String,
    },
    #[error("malformed payload from {endpoint}: {reason}")]
    Decode {
        endpoint: &'static str,
        reason: String,
    },
    #[error("{endpoint} rejected the request: {message}")]
    Rejected {
        endpoint: &'static str,
        message: String,
    },
}

impl GatewayError {
    pub fn code(&self) -> ErrorCode {
        match self {
            GatewayError::Transport { .. } => ErrorCode::Transport,
            GatewayError::Status { .. } => ErrorCode::Status,
            GatewayError::Decode { .. } => ErrorCode::Decode,
            GatewayError::Rejected { .. } => ErrorCode::Rejected,
        }
    }

    pub fn endpoint(&self) -> &'static str {
        match self {
            GatewayError::Transport { endpoint, .. }
            | GatewayError::Status { endpoint, .. }
            | GatewayError::Decode { endpoint, .. }
            | GatewayError::Rejected { endpoint, .. } => endpoint,
        }
    }

    fn transport(endpoint: &'static str, err: reqwest::Error) -> Self {
        let reason = if err.is_timeout() {
            format!("timed out: {err}")
        } else if err.is_connect() {
            format!("connection failed: {err}")
        } else {
            err.to_string()
        };
        GatewayError::Transport { endpoint, reason }
    }
}

impl From<&GatewayError> for ApiError {
    fn from(value: &GatewayError) -> Self {
        ApiError::new(value.code(), value.to_string())
    }
}

/// Outbound calls the workflow makes against the lending backend.
///
/// Implementations report failures as typed errors; deciding what the user
/// sees instead is left to the caller.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn assess_risk(
        &self,
        user_id: &UserId,
        credit_score: u32,
    ) -> Result<RiskAssessment, GatewayError>;
    async fn find_vendors(&self, category: &str) -> Result<Vec<Vendor>, GatewayError>;
    async fn execute_escrow(
        &self,
        vendor_id: &VendorId,
        amount: f64,
    ) -> Result<EscrowReceipt, GatewayError>;
    async fn run_agents(&self, request: &LoanRequest) -> Result<AgentRunResult, GatewayError>;
}

#[async_trait]
impl<G: Gateway + ?Sized> Gateway for std::sync::Arc<G> {
    async fn assess_risk(
        &self,
        user_id: &UserId,
        credit_score: u32,
    ) -> Result<RiskAssessment, GatewayError> {
        (**self).assess_risk(user_id, credit_score).await
    }

    async fn find_vendors(&self, category: &str) -> Result<Vec<Vendor>, GatewayError> {
        (**self).find_vendors(category).await
    }

    async fn execute_escrow(
        &self,
        vendor_id: &VendorId,
        amount: f64,
    ) -> Result<EscrowReceipt, GatewayError> {
        (**self).execute_escrow(vendor_id, amount).await
    }

    async fn run_agents(&self, request: &LoanRequest) -> Result<AgentRunResult, GatewayError> {
        (**self).run_agents(request).await
    }
}

pub struct HttpGateway {
    http: Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = settings.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder
            .build()
            .context("failed to build HTTP client for lending backend")?;
        Ok(Self::with_client(http, settings.api_base.clone()))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_json<B, T>(&self, endpoint: &'static str, body: &B) -> Result<T, GatewayError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = format!("{}{endpoint}", self.base_url);
        debug!(%url, "posting to lending backend");

        let res = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|err| GatewayError::transport(endpoint, err))
            .inspect_err(|err| error!(endpoint, error = %err, "backend request failed"))?;

        let status = res.status();
        if !status.is_success() {
            let detail = match res.json::<BackendErrorBody>().await {
                Ok(body) => body.summary(),
                Err(_) => status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            };
            warn!(endpoint, status = status.as_u16(), %detail, "backend returned error status");
            return Err(GatewayError::Status {
                endpoint,
                status: status.as_u16(),
                detail,
            });
        }

        let bytes = res
            .bytes()
            .await
            .map_err(|err| GatewayError::transport(endpoint, err))?;
        serde_json::from_slice(&bytes).map_err(|err| {
            warn!(endpoint, error = %err, "backend payload did not decode");
            GatewayError::Decode {
                endpoint,
                reason: err.to_string(),
            }
        })
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn assess_risk(
        &self,
        user_id: &UserId,
        credit_score: u32,
    ) -> Result<RiskAssessment, GatewayError> {
        self.post_json(
            RISK_ASSESSMENT_PATH,
            &RiskAssessmentRequest {
                user_id: user_id.clone(),
                credit_score,
            },
        )
        .await
    }

    async fn find_vendors(&self, category: &str) -> Result<Vec<Vendor>, GatewayError> {
        self.post_json(
            FIND_VENDORS_PATH,
            &FindVendorsRequest {
                category: category.to_string(),
            },
        )
        .await
    }

    async fn execute_escrow(
        &self,
        vendor_id: &VendorId,
        amount: f64,
    ) -> Result<EscrowReceipt, GatewayError> {
        let res: EscrowExecuteResponse = self
            .post_json(
                ESCROW_EXECUTE_PATH,
                &EscrowExecuteRequest {
                    vendor_id: vendor_id.clone(),
                    amount,
                },
            )
            .await?;
        Ok(res.into())
    }

    async fn run_agents(&self, request: &LoanRequest) -> Result<AgentRunResult, GatewayError> {
        let res: AgentRunResponse = self.post_json(RUN_AGENTS_PATH, request).await?;
        if !res.is_success() {
            let message = res
                .message
                .unwrap_or_else(|| format!("agent run ended with status '{}'", res.status));
            warn!(%message, "agent swarm reported failure");
            return Err(GatewayError::Rejected {
                endpoint: RUN_AGENTS_PATH,
                message,
            });
        }
        Ok(AgentRunResult {
            result: res.result.unwrap_or_default(),
            logs: res.logs,
        })
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
