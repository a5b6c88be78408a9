// SPDX-License-Identifier: MIT

//! Process graph definition types
//!
//! Raw shapes as they arrive from the process designer. Edges may be listed
//! under `edges`, `connections` or `links`, and use `from`/`source`,
//! `to`/`target` and `type`/`edge_type` interchangeably.

use serde::{Deserialize, Serialize};

/// A process graph definition
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct ProcessDefinition {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edges: Vec<EdgeDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connections: Vec<EdgeDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<EdgeDefinition>,
}

impl ProcessDefinition {
    /// All edges in definition order, whichever list they were declared in
    pub fn all_edges(&self) -> impl Iterator<Item = &EdgeDefinition> {
        self.edges
            .iter()
            .chain(self.connections.iter())
            .chain(self.links.iter())
    }
}

/// A node in the process graph
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct NodeDefinition {
    #[serde(default)]
    pub id: String,
    #[serde(default, alias = "label", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        rename = "type",
        alias = "node_type",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub node_type: Option<String>,
}

/// An edge between two nodes
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct EdgeDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_type: Option<String>,
}

impl EdgeDefinition {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: Some(from.into()),
            to: Some(to.into()),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, edge_type: impl Into<String>) -> Self {
        self.kind = Some(edge_type.into());
        self
    }

    /// Source node id, from `from` or `source`
    pub fn from_id(&self) -> Option<&str> {
        first_present(&[&self.from, &self.source])
    }

    /// Target node id, from `to` or `target`
    pub fn to_id(&self) -> Option<&str> {
        first_present(&[&self.to, &self.target])
    }

    /// Edge type, from `type` or `edge_type`
    pub fn type_name(&self) -> Option<&str> {
        first_present(&[&self.kind, &self.edge_type])
    }
}

fn first_present<'a>(candidates: &[&'a Option<String>]) -> Option<&'a str> {
    candidates
        .iter()
        .filter_map(|c| c.as_deref())
        .map(str::trim)
        .find(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_synonyms() {
        let yaml = r#"
            nodes:
              - { id: a, name: Intake, type: start }
              - { id: b, label: Review }
            connections:
              - { source: a, target: b, edge_type: approve }
            links:
              - { from: b, to: a }
        "#;
        let def: ProcessDefinition = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(def.nodes[1].name.as_deref(), Some("Review"));
        let edges: Vec<_> = def.all_edges().collect();
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].from_id(), Some("a"));
        assert_eq!(edges[0].to_id(), Some("b"));
        assert_eq!(edges[0].type_name(), Some("approve"));
        assert_eq!(edges[1].type_name(), None);
    }

    #[test]
    fn test_blank_endpoint_is_missing() {
        let edge = EdgeDefinition {
            from: Some("  ".to_string()),
            source: Some("x".to_string()),
            ..Default::default()
        };
        assert_eq!(edge.from_id(), Some("x"));
        assert_eq!(edge.to_id(), None);
    }

    #[test]
    fn test_json_definition() {
        let json = r#"{
            "nodes": [{"id": "s", "type": "start"}],
            "edges": [{"from": "s", "to": "t", "type": "default"}]
        }"#;
        let def: ProcessDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(def.nodes[0].node_type.as_deref(), Some("start"));
        assert_eq!(def.all_edges().count(), 1);
    }
}
