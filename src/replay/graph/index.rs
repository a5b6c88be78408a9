// SPDX-License-Identifier: MIT

//! Read-only lookups over a process graph

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::types::ProcessDefinition;

/// Edge type that needs no branch highlighting
pub const DEFAULT_EDGE_TYPE: &str = "default";

/// Node types that mark where a process begins
const START_TYPES: [&str; 4] = ["start", "trigger", "start_event", "begin"];

/// Kind of a process node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeType {
    Start,
    Task,
    Decision,
    Approval,
    Notification,
    End,
    Other(String),
}

impl NodeType {
    pub fn parse(raw: &str) -> Self {
        let lower = raw.trim().to_ascii_lowercase();
        if START_TYPES.contains(&lower.as_str()) {
            return NodeType::Start;
        }
        match lower.as_str() {
            "" | "task" => NodeType::Task,
            "decision" | "condition" | "gateway" => NodeType::Decision,
            "approval" => NodeType::Approval,
            "notification" => NodeType::Notification,
            "end" => NodeType::End,
            _ => NodeType::Other(lower),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            NodeType::Start => "start",
            NodeType::Task => "task",
            NodeType::Decision => "decision",
            NodeType::Approval => "approval",
            NodeType::Notification => "notification",
            NodeType::End => "end",
            NodeType::Other(s) => s,
        }
    }
}

impl From<String> for NodeType {
    fn from(raw: String) -> Self {
        NodeType::parse(&raw)
    }
}

impl From<NodeType> for String {
    fn from(node_type: NodeType) -> Self {
        node_type.as_str().to_string()
    }
}

/// A node as seen by the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub name: String,
    pub node_type: NodeType,
}

/// A normalized edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub edge_type: String,
}

/// Key of the edge-type lookup for a (from, to) pair
pub fn pair_key(from: &str, to: &str) -> String {
    format!("{}=>{}", from, to)
}

/// Node-by-id and edge-type-by-pair lookups, built once per definition load
#[derive(Debug, Clone, Default)]
pub struct GraphIndex {
    nodes: HashMap<String, GraphNode>,
    /// Node ids in definition order
    node_order: Vec<String>,
    edges: Vec<GraphEdge>,
    edge_types: HashMap<String, String>,
}

impl GraphIndex {
    /// Build the index. Edges without both endpoints are dropped; when a pair
    /// is defined twice the later definition wins.
    pub fn build(def: &ProcessDefinition) -> Self {
        let mut index = GraphIndex::default();

        for node in &def.nodes {
            let id = node.id.trim();
            if id.is_empty() {
                log::debug!("Dropping node without id: {:?}", node);
                continue;
            }
            let name = node
                .name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .unwrap_or(id)
                .to_string();
            let node_type = node
                .node_type
                .as_deref()
                .map(NodeType::parse)
                .unwrap_or(NodeType::Task);

            if !index.nodes.contains_key(id) {
                index.node_order.push(id.to_string());
            }
            index.nodes.insert(
                id.to_string(),
                GraphNode {
                    id: id.to_string(),
                    name,
                    node_type,
                },
            );
        }

        for edge in def.all_edges() {
            let (Some(from), Some(to)) = (edge.from_id(), edge.to_id()) else {
                log::debug!("Dropping edge with a missing endpoint: {:?}", edge);
                continue;
            };
            let edge_type = edge.type_name().unwrap_or(DEFAULT_EDGE_TYPE).to_string();

            if let Some(previous) = index
                .edge_types
                .insert(pair_key(from, to), edge_type.clone())
            {
                if previous != edge_type {
                    log::debug!(
                        "Edge {} => {} defined twice, '{}' replaces '{}'",
                        from,
                        to,
                        edge_type,
                        previous
                    );
                }
            }
            index.edges.push(GraphEdge {
                from: from.to_string(),
                to: to.to_string(),
                edge_type,
            });
        }

        index
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    /// Display name, falling back to the raw id
    pub fn node_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.nodes.get(id).map(|n| n.name.as_str()).unwrap_or(id)
    }

    pub fn node_type(&self, id: &str) -> Option<&NodeType> {
        self.nodes.get(id).map(|n| &n.node_type)
    }

    /// Recorded type of the edge from `from` to `to`
    pub fn edge_type(&self, from: &str, to: &str) -> Option<&str> {
        self.edge_types.get(&pair_key(from, to)).map(String::as_str)
    }

    /// Edge type worth highlighting when moving from `previous` to `next`.
    /// `None` for the first step, a repeated node, an unknown pair or a default edge.
    pub fn branch_type(&self, previous: Option<&str>, next: &str) -> Option<String> {
        let previous = previous?;
        if previous == next {
            return None;
        }
        self.edge_type(previous, next)
            .filter(|t| !t.is_empty() && *t != DEFAULT_EDGE_TYPE)
            .map(str::to_string)
    }

    /// First node, in definition order, whose type is start-equivalent
    pub fn start_node(&self) -> Option<&GraphNode> {
        self.node_order
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .find(|n| n.node_type == NodeType::Start)
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}
