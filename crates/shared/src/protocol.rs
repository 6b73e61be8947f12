use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{AgentRole, EscrowReceipt, FarmerId, UserId, VendorId};

pub const RISK_ASSESSMENT_PATH: &str = "/api/risk-assessment";
pub const FIND_VENDORS_PATH: &str = "/api/broker/find-vendors";
pub const ESCROW_EXECUTE_PATH: &str = "/api/escrow/execute";
pub const RUN_AGENTS_PATH: &str = "/run-agents";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessmentRequest {
    pub user_id: UserId,
    pub credit_score: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindVendorsRequest {
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowExecuteRequest {
    pub vendor_id: VendorId,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowExecuteResponse {
    pub tx_hash: String,
    pub voucher_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<EscrowExecuteResponse> for EscrowReceipt {
    fn from(value: EscrowExecuteResponse) -> Self {
        Self {
            voucher_code: value.voucher_code,
            tx_hash: value.tx_hash,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanRequest {
    pub item: String,
    pub quantity: u32,
    pub vendor_id: VendorId,
    pub farmer_id: FarmerId,
}

impl Default for LoanRequest {
    fn default() -> Self {
        Self {
            item: "Urea Fertilizer".into(),
            quantity: 50,
            vendor_id: VendorId::new("V-9988"),
            farmer_id: FarmerId::new("F-1024"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRunResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<String>,
}

impl AgentRunResponse {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// Successful outcome of an agent swarm run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRunResult {
    pub result: String,
    pub logs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentLogEntry {
    pub timestamp: DateTime<Utc>,
    pub source: AgentRole,
    pub message: String,
}
