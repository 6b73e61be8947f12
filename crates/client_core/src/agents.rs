//! Agent swarm run: posts a loan request to the agent backend and records
//! the broker, escrow and recovery narrative as a timestamped transcript.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use serde::Serialize;
use shared::{
    domain::AgentRole,
    protocol::{AgentLogEntry, LoanRequest},
};
use thiserror::Error;
use tracing::{info, warn};

use crate::{Gateway, GatewayError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgentRunError {
    #[error("an agent run is already in progress")]
    Busy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed { result: String },
    Failed { message: String },
    Unreachable { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentTranscript {
    pub entries: Vec<AgentLogEntry>,
    pub outcome: RunOutcome,
}

impl AgentTranscript {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RunOutcome::Completed { .. })
    }
}

struct Transcript(Vec<AgentLogEntry>);

impl Transcript {
    fn log(&mut self, source: AgentRole, message: impl Into<String>) {
        self.0.push(AgentLogEntry {
            timestamp: Utc::now(),
            source,
            message: message.into(),
        });
    }
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct AgentSwarm<G> {
    gateway: G,
    running: AtomicBool,
}

impl<G: Gateway> AgentSwarm<G> {
    pub fn new(gateway: G) -> Self {
        Self {
            gateway,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub async fn run(&self, request: &LoanRequest) -> Result<AgentTranscript, AgentRunError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(AgentRunError::Busy);
        }
        let _guard = RunningGuard(&self.running);

        let mut transcript = Transcript(Vec::new());
        transcript.log(AgentRole::System, "Initializing PurposePay Swarm...");
        transcript.log(
            AgentRole::Broker,
            format!(
                "Verifying market price for {} bags of {}...",
                request.quantity, request.item
            ),
        );
        transcript.log(
            AgentRole::Broker,
            format!("Contacting Vendor {}...", request.vendor_id),
        );

        let outcome = match self.gateway.run_agents(request).await {
            Ok(run) => {
                info!(item = %request.item, farmer = %request.farmer_id, "agent swarm completed");
                transcript.log(AgentRole::Broker, "Price Verified. Purchase Order Generated.");
                transcript.log(AgentRole::Escrow, "Purchase Order Received. Locking Funds...");
                transcript.log(
                    AgentRole::Escrow,
                    format!("Transferring funds to {} (UPI)...", request.vendor_id),
                );
                transcript.log(
                    AgentRole::Recovery,
                    "Signal Received. Loan linked to Harvest ID.",
                );
                transcript.log(
                    AgentRole::System,
                    "Transaction Request Completed Successfully.",
                );
                RunOutcome::Completed { result: run.result }
            }
            Err(GatewayError::Rejected { message, .. }) => {
                warn!(%message, "agent swarm rejected loan request");
                transcript.log(AgentRole::Error, format!("Simulation Failed: {message}"));
                RunOutcome::Failed { message }
            }
            Err(err) => {
                warn!(error = %err, "agent backend unreachable");
                let message = format!("Connection Error: {err}. Is the backend running?");
                transcript.log(AgentRole::Error, message.clone());
                RunOutcome::Unreachable { message }
            }
        };

        Ok(AgentTranscript {
            entries: transcript.0,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use shared::{
        domain::{EscrowReceipt, RiskAssessment, UserId, Vendor, VendorId},
        protocol::{AgentRunResult, RUN_AGENTS_PATH},
    };
    use tokio::sync::Notify;

    use super::*;

    struct AgentOnlyGateway {
        outcome: Result<AgentRunResult, GatewayError>,
        gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl Gateway for AgentOnlyGateway {
        async fn assess_risk(&self, _: &UserId, _: u32) -> Result<RiskAssessment, GatewayError> {
            unreachable!("not used by agent runs")
        }

        async fn find_vendors(&self, _: &str) -> Result<Vec<Vendor>, GatewayError> {
            unreachable!("not used by agent runs")
        }

        async fn execute_escrow(&self, _: &VendorId, _: f64) -> Result<EscrowReceipt, GatewayError> {
            unreachable!("not used by agent runs")
        }

        async fn run_agents(&self, _: &LoanRequest) -> Result<AgentRunResult, GatewayError> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.outcome.clone()
        }
    }

    fn swarm(outcome: Result<AgentRunResult, GatewayError>) -> AgentSwarm<AgentOnlyGateway> {
        AgentSwarm::new(AgentOnlyGateway {
            outcome,
            gate: None,
        })
    }

    fn sources(transcript: &AgentTranscript) -> Vec<AgentRole> {
        transcript.entries.iter().map(|e| e.source).collect()
    }

    #[tokio::test]
    async fn successful_run_logs_full_agent_sequence() {
        let swarm = swarm(Ok(AgentRunResult {
            result: "Loan cycle closed".into(),
            logs: vec!["Broker Verified Price".into()],
        }));
        let transcript = swarm.run(&LoanRequest::default()).await.expect("run");

        assert_eq!(
            sources(&transcript),
            [
                AgentRole::System,
                AgentRole::Broker,
                AgentRole::Broker,
                AgentRole::Broker,
                AgentRole::Escrow,
                AgentRole::Escrow,
                AgentRole::Recovery,
                AgentRole::System,
            ]
        );
        assert_eq!(
            transcript.entries[1].message,
            "Verifying market price for 50 bags of Urea Fertilizer..."
        );
        assert_eq!(
            transcript.outcome,
            RunOutcome::Completed {
                result: "Loan cycle closed".into()
            }
        );
        assert!(!swarm.is_running());
    }

    #[tokio::test]
    async fn rejected_run_reports_backend_message() {
        let swarm = swarm(Err(GatewayError::Rejected {
            endpoint: RUN_AGENTS_PATH,
            message: "invalid api key".into(),
        }));
        let transcript = swarm.run(&LoanRequest::default()).await.expect("run");

        let last = transcript.entries.last().expect("entry");
        assert_eq!(last.source, AgentRole::Error);
        assert_eq!(last.message, "Simulation Failed: invalid api key");
        assert!(!transcript.is_success());
    }

    #[tokio::test]
    async fn unreachable_backend_asks_whether_it_is_running() {
        let swarm = swarm(Err(GatewayError::Transport {
            endpoint: RUN_AGENTS_PATH,
            reason: "connection refused".into(),
        }));
        let transcript = swarm.run(&LoanRequest::default()).await.expect("run");

        match transcript.outcome {
            RunOutcome::Unreachable { message } => {
                assert!(message.ends_with("Is the backend running?"), "{message}")
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn second_submission_while_running_is_refused() {
        let gate = Arc::new(Notify::new());
        let swarm = Arc::new(AgentSwarm::new(AgentOnlyGateway {
            outcome: Ok(AgentRunResult {
                result: "done".into(),
                logs: Vec::new(),
            }),
            gate: Some(gate.clone()),
        }));

        let first = tokio::spawn({
            let swarm = swarm.clone();
            async move { swarm.run(&LoanRequest::default()).await }
        });
        while !swarm.is_running() {
            tokio::task::yield_now().await;
        }

        assert_eq!(
            swarm.run(&LoanRequest::default()).await,
            Err(AgentRunError::Busy)
        );

        gate.notify_one();
        assert!(first.await.expect("join").expect("first run").is_success());
        assert!(!swarm.is_running());
    }
}
