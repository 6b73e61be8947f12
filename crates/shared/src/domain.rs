use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(VendorId);
id_newtype!(FarmerId);

/// Phase of the supply-chain-finance workflow. Declaration order is the
/// happy-path order, so `Ord` can be used for "at or past" checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    #[default]
    Rejection,
    Discovery,
    Verification,
    Escrow,
}

impl WorkflowStage {
    pub const ALL: [WorkflowStage; 4] = [
        WorkflowStage::Rejection,
        WorkflowStage::Discovery,
        WorkflowStage::Verification,
        WorkflowStage::Escrow,
    ];

    /// The stage the happy path moves to next, if any.
    pub fn next(self) -> Option<WorkflowStage> {
        match self {
            WorkflowStage::Rejection => Some(WorkflowStage::Discovery),
            WorkflowStage::Discovery => Some(WorkflowStage::Verification),
            WorkflowStage::Verification => Some(WorkflowStage::Escrow),
            WorkflowStage::Escrow => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowStage::Rejection => "rejection",
            WorkflowStage::Discovery => "discovery",
            WorkflowStage::Verification => "verification",
            WorkflowStage::Escrow => "escrow",
        }
    }
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkflowStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rejection" => Ok(WorkflowStage::Rejection),
            "discovery" => Ok(WorkflowStage::Discovery),
            "verification" => Ok(WorkflowStage::Verification),
            "escrow" => Ok(WorkflowStage::Escrow),
            other => Err(format!("unknown workflow stage '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskStatus {
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub status: RiskStatus,
    pub reason: String,
    pub agent_triggered: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vendor {
    pub id: VendorId,
    pub name: String,
    pub price: f64,
    /// 0..=100
    pub trust_score: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowReceipt {
    pub voucher_code: String,
    pub tx_hash: String,
}

/// Purchase categories the broker agent can source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Fertilizer,
    Seeds,
    Equipment,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Fertilizer, Category::Seeds, Category::Equipment];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Fertilizer => "Fertilizer",
            Category::Seeds => "Seeds",
            Category::Equipment => "Equipment",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentRole {
    System,
    Broker,
    Escrow,
    Recovery,
    Error,
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AgentRole::System => "SYSTEM",
            AgentRole::Broker => "BROKER",
            AgentRole::Escrow => "ESCROW",
            AgentRole::Recovery => "RECOVERY",
            AgentRole::Error => "ERROR",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u32,
    pub name: String,
    pub price: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_order_follows_happy_path() {
        assert!(WorkflowStage::Rejection < WorkflowStage::Discovery);
        assert!(WorkflowStage::Discovery < WorkflowStage::Verification);
        assert!(WorkflowStage::Verification < WorkflowStage::Escrow);
        assert_eq!(WorkflowStage::Escrow.next(), None);
    }

    #[test]
    fn stage_parses_case_insensitively() {
        assert_eq!("Escrow".parse::<WorkflowStage>(), Ok(WorkflowStage::Escrow));
        assert!("settled".parse::<WorkflowStage>().is_err());
    }

    #[test]
    fn vendor_accepts_backend_payload_with_location() {
        let vendor: Vendor = serde_json::from_str(
            r#"{"id":"v2","name":"GreenFields Supply","price":12500,"trust_score":95,"location":"Dist 4"}"#,
        )
        .expect("vendor");
        assert_eq!(vendor.id, VendorId::new("v2"));
        assert_eq!(vendor.price, 12500.0);
        assert_eq!(vendor.location.as_deref(), Some("Dist 4"));
    }
}
