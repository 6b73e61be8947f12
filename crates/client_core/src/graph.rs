//! Derives the market topology view from workflow state.
//!
//! [`project`] is pure: the same inputs always produce the same graph, and
//! nothing is retained between calls. Callers recompute on every change
//! rather than patching a previous graph. Vendor ids are treated as unique
//! within one list.

use std::collections::HashSet;

use serde::Serialize;
use shared::domain::{Vendor, WorkflowStage};

const WHITE: &str = "#FFFFFF";
const RED: &str = "#EF4444";
const CYAN: &str = "#06B6D4";
const EMERALD: &str = "#10B981";
const AMBER: &str = "#F59E0B";
const SLATE: &str = "#334155";

const VENDOR_COLUMN_X: f64 = 550.0;
const VENDOR_TOP_Y: f64 = 150.0;
const VENDOR_SPACING_Y: f64 = 150.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    User,
    Bank,
    Broker,
    Vendor,
    Escrow,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub label: String,
    pub position: Position,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeStyle {
    pub stroke: &'static str,
    pub width: f64,
    pub dashed: bool,
    pub animated: bool,
    pub opacity: f64,
    pub arrow: bool,
}

impl EdgeStyle {
    fn rejected() -> Self {
        Self {
            stroke: RED,
            width: 2.0,
            dashed: true,
            animated: true,
            opacity: 1.0,
            arrow: true,
        }
    }

    fn link() -> Self {
        Self {
            stroke: CYAN,
            width: 1.5,
            dashed: false,
            animated: true,
            opacity: 1.0,
            arrow: false,
        }
    }

    fn emphasized() -> Self {
        Self {
            stroke: CYAN,
            width: 3.0,
            dashed: false,
            animated: true,
            opacity: 1.0,
            arrow: false,
        }
    }

    fn dimmed() -> Self {
        Self {
            stroke: SLATE,
            width: 1.0,
            dashed: false,
            animated: false,
            opacity: 0.3,
            arrow: false,
        }
    }

    fn escrow(arrow: bool) -> Self {
        Self {
            stroke: AMBER,
            width: 2.0,
            dashed: false,
            animated: true,
            opacity: 1.0,
            arrow,
        }
    }

    pub fn is_emphasized(&self) -> bool {
        *self == Self::emphasized()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub style: EdgeStyle,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphState {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl GraphState {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|edge| edge.id == id)
    }
}

pub fn vendor_node_id(vendor: &Vendor) -> String {
    format!("vendor-{}", vendor.id)
}

fn node(id: &str, kind: NodeKind, label: &str, x: f64, y: f64, color: &'static str) -> Node {
    Node {
        id: id.to_string(),
        kind,
        label: label.to_string(),
        position: Position { x, y },
        color,
    }
}

fn edge(id: impl Into<String>, source: &str, target: impl Into<String>, style: EdgeStyle) -> Edge {
    Edge {
        id: id.into(),
        source: source.to_string(),
        target: target.into(),
        style,
    }
}

pub fn project(stage: WorkflowStage, vendors: &[Vendor], selected: Option<&Vendor>) -> GraphState {
    let user = node("user", NodeKind::User, "User (Borrower)", 100.0, 300.0, WHITE);

    if stage == WorkflowStage::Rejection {
        return GraphState {
            nodes: vec![
                user,
                node("bank", NodeKind::Bank, "Traditional Bank", 400.0, 300.0, RED),
            ],
            edges: vec![edge("e-user-bank", "user", "bank", EdgeStyle::rejected())],
        };
    }

    let mut nodes = Vec::with_capacity(vendors.len() + 3);
    let mut edges = Vec::with_capacity(vendors.len() + 3);
    nodes.push(user);
    nodes.push(node("broker", NodeKind::Broker, "Broker Agent", 300.0, 300.0, CYAN));
    edges.push(edge("e-user-broker", "user", "broker", EdgeStyle::link()));

    let verifying = stage >= WorkflowStage::Verification;
    let mut seen = HashSet::with_capacity(vendors.len());
    // Node ids derive from vendor ids; a repeated id keeps its first entry.
    let distinct = vendors.iter().filter(|vendor| seen.insert(&vendor.id));
    for (index, vendor) in distinct.enumerate() {
        let vendor_id = vendor_node_id(vendor);
        nodes.push(Node {
            id: vendor_id.clone(),
            kind: NodeKind::Vendor,
            label: vendor.name.clone(),
            position: Position {
                x: VENDOR_COLUMN_X,
                y: VENDOR_TOP_Y + index as f64 * VENDOR_SPACING_Y,
            },
            color: EMERALD,
        });

        let is_selected = selected.is_some_and(|active| active.id == vendor.id);
        let style = if is_selected && verifying {
            EdgeStyle::emphasized()
        } else {
            EdgeStyle::dimmed()
        };
        edges.push(edge(format!("e-broker-{}", vendor.id), "broker", vendor_id, style));
    }

    if stage == WorkflowStage::Escrow {
        if let Some(active) = selected {
            nodes.push(node("escrow", NodeKind::Escrow, "Escrow Agent", 425.0, 225.0, AMBER));
            edges.push(edge(
                "e-escrow-vendor",
                "escrow",
                vendor_node_id(active),
                EdgeStyle::escrow(true),
            ));
            edges.push(edge("e-user-escrow", "user", "escrow", EdgeStyle::escrow(false)));
        }
    }

    GraphState { nodes, edges }
}

#[cfg(test)]
mod tests {
    use shared::domain::VendorId;

    use super::*;

    fn vendor(id: &str, name: &str) -> Vendor {
        Vendor {
            id: VendorId::new(id),
            name: name.to_string(),
            price: 12000.0,
            trust_score: 90,
            location: None,
        }
    }

    fn ids(graph: &GraphState) -> Vec<&str> {
        graph.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    #[test]
    fn rejection_shows_user_and_bank_with_rejected_edge() {
        let graph = project(WorkflowStage::Rejection, &[], None);
        assert_eq!(ids(&graph), ["user", "bank"]);
        assert_eq!(graph.edges.len(), 1);
        let style = &graph.edges[0].style;
        assert!(style.dashed);
        assert_eq!(style.stroke, RED);
    }

    #[test]
    fn rejection_ignores_stray_vendors() {
        let vendors = [vendor("v1", "Kisan Agro Mart")];
        let graph = project(WorkflowStage::Rejection, &vendors, Some(&vendors[0]));
        assert_eq!(ids(&graph), ["user", "bank"]);
    }

    #[test]
    fn discovery_replaces_bank_with_broker() {
        let graph = project(WorkflowStage::Discovery, &[], None);
        assert_eq!(ids(&graph), ["user", "broker"]);
        assert_eq!(graph.edges[0].id, "e-user-broker");
        assert!(graph.node("bank").is_none());
    }

    #[test]
    fn vendors_stack_in_input_order_and_only_selected_is_emphasized() {
        let vendors = [
            vendor("v1", "Kisan Agro Mart"),
            vendor("v2", "GreenFields Supply"),
            vendor("v3", "Eco-Grow Traders"),
        ];
        let graph = project(WorkflowStage::Verification, &vendors, Some(&vendors[0]));

        assert_eq!(ids(&graph), ["user", "broker", "vendor-v1", "vendor-v2", "vendor-v3"]);
        let ys: Vec<f64> = graph.nodes[2..].iter().map(|n| n.position.y).collect();
        assert_eq!(ys, [150.0, 300.0, 450.0]);

        assert!(graph.edge("e-broker-v1").expect("v1 edge").style.is_emphasized());
        assert!(!graph.edge("e-broker-v2").expect("v2 edge").style.is_emphasized());
        assert!(!graph.edge("e-broker-v3").expect("v3 edge").style.is_emphasized());
    }

    #[test]
    fn selection_is_not_emphasized_before_verification() {
        let vendors = [vendor("v1", "Kisan Agro Mart")];
        let graph = project(WorkflowStage::Discovery, &vendors, Some(&vendors[0]));
        assert!(!graph.edge("e-broker-v1").expect("edge").style.is_emphasized());
    }

    #[test]
    fn escrow_adds_escrow_node_and_edges_for_selected_vendor() {
        let vendors = [vendor("v1", "Kisan Agro Mart"), vendor("v2", "GreenFields Supply")];
        let graph = project(WorkflowStage::Escrow, &vendors, Some(&vendors[1]));

        assert_eq!(graph.nodes.last().map(|n| n.kind), Some(NodeKind::Escrow));
        let to_vendor = graph.edge("e-escrow-vendor").expect("escrow->vendor");
        assert_eq!(to_vendor.target, "vendor-v2");
        assert!(to_vendor.style.arrow);
        assert_eq!(graph.edge("e-user-escrow").expect("user->escrow").source, "user");
    }

    #[test]
    fn escrow_without_selection_has_no_escrow_node() {
        let vendors = [vendor("v1", "Kisan Agro Mart")];
        let graph = project(WorkflowStage::Escrow, &vendors, None);
        assert!(graph.node("escrow").is_none());
        assert!(graph.edge("e-user-escrow").is_none());
    }

    #[test]
    fn repeated_vendor_id_yields_one_node_and_one_emphasized_edge() {
        let vendors = [
            vendor("v1", "Kisan Agro Mart"),
            vendor("v1", "Kisan Agro Mart (duplicate)"),
            vendor("v2", "GreenFields Supply"),
        ];
        let graph = project(WorkflowStage::Verification, &vendors, Some(&vendors[0]));

        assert_eq!(ids(&graph), ["user", "broker", "vendor-v1", "vendor-v2"]);
        assert_eq!(graph.node("vendor-v1").expect("v1").label, "Kisan Agro Mart");
        assert_eq!(graph.node("vendor-v2").expect("v2").position.y, 300.0);
        let emphasized = graph.edges.iter().filter(|e| e.style.is_emphasized()).count();
        assert_eq!(emphasized, 1);
    }

    #[test]
    fn projection_is_deterministic() {
        let vendors = [vendor("v1", "Kisan Agro Mart"), vendor("v2", "GreenFields Supply")];
        for stage in WorkflowStage::ALL {
            let first = project(stage, &vendors, Some(&vendors[0]));
            let second = project(stage, &vendors, Some(&vendors[0]));
            assert_eq!(first, second, "stage {stage}");
        }
    }
}
