// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::replay::execution::ExecutionStatus;

/// One replayed step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub node_id: String,
    /// Branch taken to reach this node; `None` when there is nothing to highlight
    pub edge_type: Option<String>,
    #[serde(rename = "type")]
    pub node_type: String,
    pub title: String,
    pub status_key: String,
    /// The run stopped here without completing
    pub terminal: bool,
    /// Sanitized failure message, only on a terminal failed entry
    pub error: Option<String>,
}

/// Ordered replay path with no repeated node ids
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Trace(Vec<TraceEntry>);

impl Trace {
    /// Build a trace, keeping the first entry for each node id
    pub fn from_entries(entries: impl IntoIterator<Item = TraceEntry>) -> Self {
        let mut seen = HashSet::new();
        Trace(
            entries
                .into_iter()
                .filter(|e| seen.insert(e.node_id.clone()))
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TraceEntry> {
        self.0.iter()
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.0
    }

    pub fn node_ids(&self) -> Vec<&str> {
        self.0.iter().map(|e| e.node_id.as_str()).collect()
    }

    /// Entry where the run stopped, if it stopped early
    pub fn terminal_entry(&self) -> Option<&TraceEntry> {
        self.0.iter().rev().find(|e| e.terminal)
    }

    /// Error carried by the terminal entry
    pub fn error(&self) -> Option<&str> {
        self.terminal_entry().and_then(|e| e.error.as_deref())
    }

    pub fn steps_completed(&self) -> usize {
        self.0
            .iter()
            .filter(|e| e.status_key == ExecutionStatus::Completed.as_str())
            .count()
    }

    /// Caption shown alongside the replay, e.g. `Awaiting approval at Manager review`
    pub fn subtitle(&self, status: ExecutionStatus) -> String {
        if let Some(entry) = self.terminal_entry() {
            return format!("{} at {}", status.label(), entry.title);
        }
        match (status, self.0.len()) {
            (_, 0) => status.label().to_string(),
            (ExecutionStatus::Completed, 1) => "Completed after 1 step".to_string(),
            (ExecutionStatus::Completed, n) => format!("Completed after {} steps", n),
            (_, _) => match self.0.last() {
                Some(last) => format!("{} at {}", status.label(), last.title),
                None => status.label().to_string(),
            },
        }
    }
}

impl<'a> IntoIterator for &'a Trace {
    type Item = &'a TraceEntry;
    type IntoIter = std::slice::Iter<'a, TraceEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, title: &str, status_key: &str, terminal: bool) -> TraceEntry {
        TraceEntry {
            node_id: id.to_string(),
            edge_type: None,
            node_type: "task".to_string(),
            title: title.to_string(),
            status_key: status_key.to_string(),
            terminal,
            error: None,
        }
    }

    #[test]
    fn test_from_entries_keeps_first_occurrence() {
        let trace = Trace::from_entries(vec![
            entry("a", "A", "completed", false),
            entry("b", "B", "completed", false),
            entry("a", "A again", "failed", true),
        ]);
        assert_eq!(trace.node_ids(), vec!["a", "b"]);
        assert_eq!(trace.entries()[0].title, "A");
    }

    #[test]
    fn test_subtitles() {
        let waiting = Trace::from_entries(vec![
            entry("a", "Submit", "completed", false),
            entry("b", "Manager review", "waiting", true),
        ]);
        assert_eq!(
            waiting.subtitle(ExecutionStatus::Waiting),
            "Awaiting approval at Manager review"
        );

        let done = Trace::from_entries(vec![
            entry("a", "Submit", "completed", false),
            entry("b", "Notify", "completed", false),
        ]);
        assert_eq!(done.subtitle(ExecutionStatus::Completed), "Completed after 2 steps");
        assert_eq!(done.steps_completed(), 2);

        assert_eq!(Trace::default().subtitle(ExecutionStatus::Failed), "Failed");
    }

    #[test]
    fn test_serializes_as_list() {
        let trace = Trace::from_entries(vec![entry("a", "A", "completed", false)]);
        let json = serde_json::to_value(&trace).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["type"], "task");
        assert_eq!(json[0]["edge_type"], serde_json::Value::Null);
    }
}
