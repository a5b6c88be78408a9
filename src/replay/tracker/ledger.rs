// SPDX-License-Identifier: MIT

use std::collections::{HashMap, HashSet};

use crate::replay::execution::ExecutionStatus;

/// Milestones already dispatched, per execution
#[derive(Debug, Clone, Default)]
pub struct MilestoneLedger {
    recorded: HashMap<String, HashSet<ExecutionStatus>>,
}

impl MilestoneLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a milestone. Returns `false` when it was already recorded.
    pub fn record(&mut self, execution_id: &str, milestone: ExecutionStatus) -> bool {
        self.recorded
            .entry(execution_id.to_string())
            .or_default()
            .insert(milestone)
    }

    pub fn has(&self, execution_id: &str, milestone: ExecutionStatus) -> bool {
        self.recorded
            .get(execution_id)
            .is_some_and(|set| set.contains(&milestone))
    }

    /// Start a fresh, empty entry for an execution
    pub fn reset(&mut self, execution_id: &str) {
        self.recorded
            .insert(execution_id.to_string(), HashSet::new());
    }

    pub fn clear(&mut self) {
        self.recorded.clear();
    }

    pub fn len(&self, execution_id: &str) -> usize {
        self.recorded.get(execution_id).map_or(0, HashSet::len)
    }
}
