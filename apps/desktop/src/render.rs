//! Plain-text rendering of the sidebar, topology graph and agent transcript.

use std::fmt::Write as _;

use client_core::{
    agents::{AgentTranscript, RunOutcome},
    graph::GraphState,
    marketplace::Order,
    shell::{header_status, SidebarPanel},
};
use shared::domain::WorkflowStage;

pub fn header(stage: WorkflowStage) -> String {
    format!("== Agent Action Center [{}] ==", header_status(stage))
}

pub fn panel(panel: &SidebarPanel) -> String {
    let mut out = String::new();
    match panel {
        SidebarPanel::Loading { caption } => {
            let _ = writeln!(out, "{caption}");
        }
        SidebarPanel::Rejection {
            status_label,
            reason,
            agent_message,
            can_explore,
        } => {
            let _ = writeln!(out, "Loan Status: {status_label}");
            let _ = writeln!(out, "  {reason}");
            if let Some(message) = agent_message {
                let _ = writeln!(out, "System Agent: {message}");
            }
            if *can_explore {
                let _ = writeln!(out, "-> Explore Agent Options");
            }
        }
        SidebarPanel::Discovery { prompt, categories } => {
            let _ = writeln!(out, "Broker Agent: {prompt}");
            for option in categories {
                let marker = if option.featured { "*" } else { " " };
                let _ = writeln!(out, " {marker} {}", option.category);
            }
        }
        SidebarPanel::Verification {
            vendor,
            can_approve,
        } => {
            let _ = writeln!(out, "Verification Complete");
            if let Some(vendor) = vendor {
                let _ = writeln!(out, "Vendor Verified: {}", vendor.name);
                if let Some(location) = &vendor.location {
                    let _ = writeln!(out, "  Location     {location}");
                }
                let _ = writeln!(out, "  Price Locked {}", vendor.price);
                let _ = writeln!(out, "  Trust Score  {}%", vendor.trust_score);
            }
            if *can_approve {
                let _ = writeln!(out, "-> Approve Purchase");
            }
        }
        SidebarPanel::Escrow { headline, receipt } => {
            let _ = writeln!(out, "{headline}: funds transferred directly to vendor.");
            if let Some(receipt) = receipt {
                let _ = writeln!(out, "  Voucher {}", receipt.voucher_code);
                let _ = writeln!(out, "  Tx Hash {}", receipt.tx_hash);
                let _ = writeln!(out, "  Status  EXECUTED");
            }
            let _ = writeln!(out, "-> Reset Simulation");
        }
    }
    out
}

pub fn graph(graph: &GraphState) -> String {
    let mut out = String::from("Market Topology View\n");
    for node in &graph.nodes {
        let _ = writeln!(
            out,
            "  ({:>5.0},{:>5.0}) {:<12} {}",
            node.position.x, node.position.y, node.id, node.label
        );
    }
    for edge in &graph.edges {
        let line = if edge.style.dashed { "- - >" } else { "---->" };
        let emphasis = if edge.style.is_emphasized() {
            " [selected]"
        } else if edge.style.opacity < 1.0 {
            " [dimmed]"
        } else {
            ""
        };
        let _ = writeln!(out, "  {} {line} {}{emphasis}", edge.source, edge.target);
    }
    out
}

pub fn transcript(transcript: &AgentTranscript) -> String {
    let mut out = String::new();
    for entry in &transcript.entries {
        let _ = writeln!(
            out,
            "[{}] {:<8} {}",
            entry.timestamp.format("%H:%M:%S"),
            entry.source.to_string(),
            entry.message
        );
    }
    if let RunOutcome::Completed { result } = &transcript.outcome {
        let _ = writeln!(out, "\nFinal Audit Trail:\n{result}");
    }
    out
}

pub fn order(order: &Order) -> String {
    let mut out = format!(
        "{} | {} | {} | total {}\n",
        order.id, order.date, order.status, order.total
    );
    for item in &order.items {
        let _ = writeln!(out, "  - {} ({})", item.name, item.price);
    }
    out
}
