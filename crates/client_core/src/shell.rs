//! Sidebar content selection and the typed actions it can dispatch.

use serde::Serialize;
use shared::domain::{Category, EscrowReceipt, RiskStatus, Vendor, WorkflowStage};

use crate::{
    controller::{ControllerError, StageController, WorkflowSnapshot},
    Gateway,
};

pub const LOADING_CAPTION: &str = "Agent Swarm Processing...";
pub const BROKER_PROMPT: &str =
    "I cannot give you cash, but I can finance your supplies directly. What do you need today?";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryOption {
    pub category: Category,
    /// Only fertilizer is stocked in the demo catalogue.
    pub featured: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "panel", rename_all = "snake_case")]
pub enum SidebarPanel {
    Loading {
        caption: &'static str,
    },
    Rejection {
        status_label: &'static str,
        reason: String,
        agent_message: Option<String>,
        can_explore: bool,
    },
    Discovery {
        prompt: &'static str,
        categories: Vec<CategoryOption>,
    },
    Verification {
        vendor: Option<Vendor>,
        can_approve: bool,
    },
    Escrow {
        headline: &'static str,
        receipt: Option<EscrowReceipt>,
    },
}

pub fn sidebar(snapshot: &WorkflowSnapshot) -> SidebarPanel {
    if snapshot.loading {
        return SidebarPanel::Loading {
            caption: LOADING_CAPTION,
        };
    }

    match snapshot.stage {
        WorkflowStage::Rejection => {
            let risk = snapshot.risk.as_ref();
            let agent_triggered = risk.is_some_and(|r| r.agent_triggered);
            SidebarPanel::Rejection {
                status_label: match risk.map(|r| r.status) {
                    Some(RiskStatus::Rejected) => "Rejected",
                    _ => "Pending",
                },
                reason: risk
                    .map(|r| r.reason.clone())
                    .unwrap_or_else(|| "Checking credit...".to_string()),
                agent_message: risk
                    .filter(|r| r.agent_triggered)
                    .map(|r| r.message.clone()),
                can_explore: agent_triggered,
            }
        }
        WorkflowStage::Discovery => SidebarPanel::Discovery {
            prompt: BROKER_PROMPT,
            categories: Category::ALL
                .into_iter()
                .map(|category| CategoryOption {
                    category,
                    featured: category == Category::Fertilizer,
                })
                .collect(),
        },
        WorkflowStage::Verification => SidebarPanel::Verification {
            can_approve: snapshot.selected_vendor.is_some(),
            vendor: snapshot.selected_vendor.clone(),
        },
        WorkflowStage::Escrow => SidebarPanel::Escrow {
            headline: "Loan Approved",
            receipt: snapshot.escrow_receipt.clone(),
        },
    }
}

pub fn header_status(stage: WorkflowStage) -> &'static str {
    if stage == WorkflowStage::Rejection {
        "Protocol Inactive"
    } else {
        "Protocol Active"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellAction {
    Explore,
    SelectCategory(String),
    ApprovePurchase,
    Reset,
}

impl<G: Gateway> StageController<G> {
    pub async fn dispatch(&self, action: ShellAction) -> Result<WorkflowStage, ControllerError> {
        match action {
            ShellAction::Explore => self.explore(),
            ShellAction::SelectCategory(category) => self.select_category(&category).await,
            ShellAction::ApprovePurchase => self.approve_purchase().await,
            ShellAction::Reset => Ok(self.reset()),
        }
    }
}
