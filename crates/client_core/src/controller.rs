//! Workflow state and the operations that move it between stages.
//!
//! All state sits behind one mutex that is never held across a gateway
//! call. Each call is tagged with the generation current when it was
//! issued; [`StageController::reset`] bumps the generation so that a
//! response landing afterwards is dropped instead of applied.

use std::sync::{Mutex, MutexGuard};

use serde::Serialize;
use shared::{
    domain::{EscrowReceipt, RiskAssessment, RiskStatus, UserId, Vendor, VendorId, WorkflowStage},
    error::ApiError,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    graph::{self, GraphState},
    Gateway, GatewayError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoIdentity {
    pub user_id: UserId,
    pub credit_score: u32,
}

impl Default for DemoIdentity {
    fn default() -> Self {
        Self {
            user_id: UserId::new("u123"),
            credit_score: 650,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    AssessRisk,
    FindVendors,
    ExecuteEscrow,
}

/// A gateway failure the user was shown fallback content for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FallbackRecord {
    pub operation: Operation,
    /// `None` when the call succeeded but returned nothing usable.
    pub error: Option<ApiError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("another operation is still waiting on the backend")]
    Busy,
    #[error("risk assessment has already been performed")]
    AlreadyStarted,
    #[error("risk assessment has not completed yet")]
    NotStarted,
    #[error("operation requires stage {expected}, workflow is at {actual}")]
    WrongStage {
        expected: WorkflowStage,
        actual: WorkflowStage,
    },
    #[error("risk assessment did not trigger the agent flow")]
    AgentNotTriggered,
    #[error("no vendor is selected")]
    NoVendorSelected,
    #[error("workflow was reset while the request was in flight")]
    Superseded,
}

pub fn fallback_risk_assessment() -> RiskAssessment {
    RiskAssessment {
        status: RiskStatus::Rejected,
        reason: "Network Error (Using Fallback)".into(),
        agent_triggered: true,
        message: "API failed. Using simulated response.".into(),
    }
}

pub fn fallback_vendor() -> Vendor {
    Vendor {
        id: VendorId::new("v1"),
        name: "Simulated Vendor".into(),
        price: 10000.0,
        trust_score: 95,
        location: None,
    }
}

pub fn fallback_receipt() -> EscrowReceipt {
    EscrowReceipt {
        voucher_code: "SIM-001".into(),
        tx_hash: "0xSIMULATED".into(),
    }
}

#[derive(Debug, Default)]
struct WorkflowState {
    stage: WorkflowStage,
    risk: Option<RiskAssessment>,
    vendors: Vec<Vendor>,
    /// Index into `vendors`, which keeps the selection a member of the list.
    selected: Option<usize>,
    escrow_receipt: Option<EscrowReceipt>,
    loading: bool,
    generation: u64,
    last_fallback: Option<FallbackRecord>,
}

impl WorkflowState {
    fn selected_vendor(&self) -> Option<&Vendor> {
        self.selected.and_then(|index| self.vendors.get(index))
    }

    fn require_stage(&self, expected: WorkflowStage) -> Result<(), ControllerError> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(ControllerError::WrongStage {
                expected,
                actual: self.stage,
            })
        }
    }
}

/// Read-only copy of the workflow state handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowSnapshot {
    pub stage: WorkflowStage,
    pub risk: Option<RiskAssessment>,
    pub vendors: Vec<Vendor>,
    pub selected_vendor: Option<Vendor>,
    pub escrow_receipt: Option<EscrowReceipt>,
    pub loading: bool,
    pub generation: u64,
    pub last_fallback: Option<FallbackRecord>,
}

impl WorkflowSnapshot {
    pub fn graph(&self) -> GraphState {
        graph::project(self.stage, &self.vendors, self.selected_vendor.as_ref())
    }
}

pub struct StageController<G> {
    gateway: G,
    identity: DemoIdentity,
    state: Mutex<WorkflowState>,
}

impl<G: Gateway> StageController<G> {
    pub fn new(gateway: G) -> Self {
        Self::with_identity(gateway, DemoIdentity::default())
    }

    pub fn with_identity(gateway: G, identity: DemoIdentity) -> Self {
        Self {
            gateway,
            identity,
            state: Mutex::new(WorkflowState::default()),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    fn lock(&self) -> MutexGuard<'_, WorkflowState> {
        lock_state(&self.state)
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        let state = self.lock();
        WorkflowSnapshot {
            stage: state.stage,
            risk: state.risk.clone(),
            vendors: state.vendors.clone(),
            selected_vendor: state.selected_vendor().cloned(),
            escrow_receipt: state.escrow_receipt.clone(),
            loading: state.loading,
            generation: state.generation,
            last_fallback: state.last_fallback.clone(),
        }
    }

    pub fn stage(&self) -> WorkflowStage {
        self.lock().stage
    }

    pub fn graph(&self) -> GraphState {
        let state = self.lock();
        graph::project(state.stage, &state.vendors, state.selected_vendor())
    }

    /// Checks the guard and marks the controller loading. The returned
    /// ticket clears `loading` again if it is dropped before
    /// [`InFlight::finish`] runs.
    fn begin<T>(
        &self,
        guard: impl FnOnce(&WorkflowState) -> Result<T, ControllerError>,
    ) -> Result<(InFlight<'_>, T), ControllerError> {
        let mut state = self.lock();
        if state.loading {
            return Err(ControllerError::Busy);
        }
        let value = guard(&state)?;
        state.loading = true;
        let ticket = InFlight {
            state: &self.state,
            generation: state.generation,
            settled: false,
        };
        Ok((ticket, value))
    }

    /// Runs the one-time risk assessment. The workflow always lands on
    /// Rejection afterwards, whatever the backend decided.
    pub async fn start(&self) -> Result<WorkflowStage, ControllerError> {
        let (ticket, ()) = self.begin(|state| {
            if state.risk.is_some() {
                Err(ControllerError::AlreadyStarted)
            } else {
                Ok(())
            }
        })?;

        let outcome = self
            .gateway
            .assess_risk(&self.identity.user_id, self.identity.credit_score)
            .await;

        let (risk, fallback) = match outcome {
            Ok(risk) => {
                info!(status = ?risk.status, agent_triggered = risk.agent_triggered, "risk assessment received");
                (risk, None)
            }
            Err(err) => {
                warn!(error = %err, "risk assessment failed; using fallback assessment");
                (
                    fallback_risk_assessment(),
                    Some(record(Operation::AssessRisk, Some(&err))),
                )
            }
        };

        ticket.finish(|state| {
            state.risk = Some(risk);
            state.stage = WorkflowStage::Rejection;
            state.last_fallback = fallback;
        })
    }

    pub fn explore(&self) -> Result<WorkflowStage, ControllerError> {
        let mut state = self.lock();
        if state.loading {
            return Err(ControllerError::Busy);
        }
        state.require_stage(WorkflowStage::Rejection)?;
        let risk = state.risk.as_ref().ok_or(ControllerError::NotStarted)?;
        if !risk.agent_triggered {
            return Err(ControllerError::AgentNotTriggered);
        }
        state.stage = WorkflowStage::Discovery;
        info!(stage = %state.stage, "agent flow engaged");
        Ok(state.stage)
    }

    /// Asks the broker for vendors and selects the first one returned.
    pub async fn select_category(&self, category: &str) -> Result<WorkflowStage, ControllerError> {
        let (ticket, ()) =
            self.begin(|state| state.require_stage(WorkflowStage::Discovery))?;

        let (vendors, fallback) = match self.gateway.find_vendors(category).await {
            Ok(vendors) if !vendors.is_empty() => {
                info!(category, count = vendors.len(), "broker returned vendors");
                (vendors, None)
            }
            Ok(_) => {
                warn!(category, "broker returned no vendors; using fallback vendor");
                (
                    vec![fallback_vendor()],
                    Some(record(Operation::FindVendors, None)),
                )
            }
            Err(err) => {
                warn!(category, error = %err, "vendor discovery failed; using fallback vendor");
                (
                    vec![fallback_vendor()],
                    Some(record(Operation::FindVendors, Some(&err))),
                )
            }
        };

        ticket.finish(|state| {
            state.vendors = vendors;
            state.selected = Some(0);
            state.stage = WorkflowStage::Verification;
            state.last_fallback = fallback;
        })
    }

    pub async fn approve_purchase(&self) -> Result<WorkflowStage, ControllerError> {
        let (ticket, vendor) = self.begin(|state| {
            state.require_stage(WorkflowStage::Verification)?;
            state
                .selected_vendor()
                .cloned()
                .ok_or(ControllerError::NoVendorSelected)
        })?;

        let (receipt, fallback) = match self.gateway.execute_escrow(&vendor.id, vendor.price).await
        {
            Ok(receipt) => {
                info!(vendor = %vendor.id, voucher = %receipt.voucher_code, "escrow executed");
                (receipt, None)
            }
            Err(err) => {
                warn!(vendor = %vendor.id, error = %err, "escrow execution failed; using fallback receipt");
                (
                    fallback_receipt(),
                    Some(record(Operation::ExecuteEscrow, Some(&err))),
                )
            }
        };

        ticket.finish(|state| {
            state.escrow_receipt = Some(receipt);
            state.stage = WorkflowStage::Escrow;
            state.last_fallback = fallback;
        })
    }

    /// Returns to Rejection and invalidates any request still in flight.
    /// The risk assessment from [`start`](Self::start) is kept.
    pub fn reset(&self) -> WorkflowStage {
        let mut state = self.lock();
        state.generation += 1;
        state.loading = false;
        state.vendors.clear();
        state.selected = None;
        state.escrow_receipt = None;
        state.last_fallback = None;
        state.stage = WorkflowStage::Rejection;
        info!(generation = state.generation, "workflow reset");
        state.stage
    }
}

fn lock_state(state: &Mutex<WorkflowState>) -> MutexGuard<'_, WorkflowState> {
    // State is only mutated in short, non-panicking sections.
    state
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Marks one pending gateway call. Issued with the generation current at
/// the time of the call.
struct InFlight<'a> {
    state: &'a Mutex<WorkflowState>,
    generation: u64,
    settled: bool,
}

impl InFlight<'_> {
    fn finish(
        mut self,
        apply: impl FnOnce(&mut WorkflowState),
    ) -> Result<WorkflowStage, ControllerError> {
        self.settled = true;
        let mut state = lock_state(self.state);
        if state.generation != self.generation {
            debug!(
                issued = self.generation,
                current = state.generation,
                "discarding stale backend response"
            );
            return Err(ControllerError::Superseded);
        }
        state.loading = false;
        apply(&mut state);
        Ok(state.stage)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut state = lock_state(self.state);
        // A reset already cleared `loading` and may have started new work.
        if state.generation == self.generation {
            state.loading = false;
            debug!(
                generation = self.generation,
                "operation abandoned before the backend answered"
            );
        }
    }
}

fn record(operation: Operation, err: Option<&GatewayError>) -> FallbackRecord {
    FallbackRecord {
        operation,
        error: err.map(ApiError::from),
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
