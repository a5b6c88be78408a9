// SPDX-License-Identifier: MIT

//! Reconstructs the path an execution took through its process graph

use std::collections::{HashMap, HashSet};

use super::sanitize::ErrorSanitizer;
use super::types::{Trace, TraceEntry};
use crate::replay::execution::{ExecutionSnapshot, ExecutionStatus, ExecutionStep};
use crate::replay::graph::GraphIndex;

/// Title of a node missing from the graph
pub const UNKNOWN_STEP_TITLE: &str = "Unknown step";

/// Type of a node missing from the graph
pub const FALLBACK_NODE_TYPE: &str = "task";

/// Builds traces against one graph index
pub struct TraceSynthesizer<'a> {
    graph: &'a GraphIndex,
    sanitizer: &'a ErrorSanitizer,
}

impl<'a> TraceSynthesizer<'a> {
    pub fn new(graph: &'a GraphIndex, sanitizer: &'a ErrorSanitizer) -> Self {
        Self { graph, sanitizer }
    }

    /// Prefer the step log when there is one, otherwise fall back to the snapshot
    pub fn synthesize(
        &self,
        snapshot: &ExecutionSnapshot,
        steps: Option<&[ExecutionStep]>,
    ) -> Trace {
        match steps {
            Some(steps) if !steps.is_empty() => self.from_steps(steps),
            _ => self.from_snapshot(snapshot),
        }
    }

    /// Trace from a fine-grained step log.
    ///
    /// Steps are replayed in `order`; the branch into a node is looked up from
    /// the node of the step just before it, even when that node was already
    /// replayed earlier.
    pub fn from_steps(&self, steps: &[ExecutionStep]) -> Trace {
        let mut sorted: Vec<&ExecutionStep> = steps.iter().collect();
        sorted.sort_by_key(|s| s.order);

        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(sorted.len());
        let mut previous: Option<&str> = None;

        for step in sorted {
            let node_id = step.node_id.as_str();
            if seen.insert(node_id) {
                let status_key = step
                    .status
                    .clone()
                    .unwrap_or_else(|| ExecutionStatus::Completed.as_str().to_string());
                let status = ExecutionStatus::parse(&status_key);
                let error = (status == ExecutionStatus::Failed)
                    .then(|| self.sanitizer.sanitize(step.error.as_deref()));

                entries.push(self.entry(
                    node_id,
                    previous,
                    status_key,
                    status.is_interrupted(),
                    error,
                ));
            }
            previous = Some(node_id);
        }

        Trace::from_entries(entries)
    }

    /// Trace from a coarse snapshot: start node, completed steps, then the current step
    pub fn from_snapshot(&self, snapshot: &ExecutionSnapshot) -> Trace {
        let current = snapshot.current_step_id.as_deref();
        if snapshot.completed_step_ids.is_empty() && current.is_none() {
            return Trace::default();
        }

        let start = self.graph.start_node().map(|n| n.id.as_str());

        let mut seen = HashSet::new();
        let mut sequence: Vec<&str> = start
            .into_iter()
            .chain(snapshot.completed_step_ids.iter().map(String::as_str))
            .chain(current)
            .filter(|id| seen.insert(*id))
            .collect();

        let interrupted = snapshot.status.is_interrupted();
        if let Some(current) = current.filter(|_| interrupted) {
            if let Some(pos) = sequence.iter().position(|id| *id == current) {
                sequence.truncate(pos + 1);
            }
        }

        let mut statuses: HashMap<&str, &str> = snapshot
            .completed_step_ids
            .iter()
            .map(|id| (id.as_str(), ExecutionStatus::Completed.as_str()))
            .collect();
        if let Some(current) = current {
            statuses.insert(current, snapshot.status.as_str());
        }

        let mut entries = Vec::with_capacity(sequence.len());
        let mut previous: Option<&str> = None;
        for node_id in sequence {
            let status_key = statuses
                .get(node_id)
                .copied()
                .unwrap_or(ExecutionStatus::Completed.as_str());
            let terminal = interrupted && current == Some(node_id);
            let error = (terminal && snapshot.status == ExecutionStatus::Failed)
                .then(|| self.sanitizer.sanitize(snapshot.error.as_deref()));

            entries.push(self.entry(node_id, previous, status_key.to_string(), terminal, error));
            previous = Some(node_id);
        }

        Trace::from_entries(entries)
    }

    fn entry(
        &self,
        node_id: &str,
        previous: Option<&str>,
        status_key: String,
        terminal: bool,
        error: Option<String>,
    ) -> TraceEntry {
        let node = self.graph.node(node_id);
        TraceEntry {
            node_id: node_id.to_string(),
            edge_type: self.graph.branch_type(previous, node_id),
            node_type: node
                .map(|n| n.node_type.as_str().to_string())
                .unwrap_or_else(|| FALLBACK_NODE_TYPE.to_string()),
            title: node
                .map(|n| n.name.clone())
                .unwrap_or_else(|| UNKNOWN_STEP_TITLE.to_string()),
            status_key,
            terminal,
            error,
        }
    }
}
