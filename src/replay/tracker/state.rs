// SPDX-License-Identifier: MIT

//! Synchronous run status state machine

use serde::{Deserialize, Serialize};

use super::ledger::MilestoneLedger;
use crate::replay::execution::{ExecutionSnapshot, ExecutionStatus};

/// Where the tracked execution is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// Execution assigned, nothing observed yet
    Idle,
    Running,
    Waiting,
    Paused,
    Completed,
    Failed,
    Cancelled,
    TimedOut,
}

impl From<ExecutionStatus> for RunPhase {
    fn from(status: ExecutionStatus) -> Self {
        match status {
            ExecutionStatus::Running => RunPhase::Running,
            ExecutionStatus::Waiting => RunPhase::Waiting,
            ExecutionStatus::Paused => RunPhase::Paused,
            ExecutionStatus::Completed => RunPhase::Completed,
            ExecutionStatus::Failed => RunPhase::Failed,
            ExecutionStatus::Cancelled => RunPhase::Cancelled,
            ExecutionStatus::TimedOut => RunPhase::TimedOut,
        }
    }
}

/// Result of feeding one snapshot to the tracker
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub status: ExecutionStatus,
    pub label: &'static str,
    pub label_changed: bool,
    /// Set when this settled status is seen for the first time
    pub milestone: Option<ExecutionStatus>,
    pub keep_polling: bool,
}

/// Tracks one execution at a time.
///
/// Opening a new execution fully resets the tracker; it never merges state
/// from a previous execution.
#[derive(Debug, Default)]
pub struct RunStatusTracker {
    execution_id: Option<String>,
    phase: Option<RunPhase>,
    label: Option<&'static str>,
    ledger: MilestoneLedger,
}

impl RunStatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_execution(&mut self, execution_id: &str) {
        if let Some(previous) = self.execution_id.as_deref() {
            if previous != execution_id {
                log::debug!("Switching tracker from {} to {}", previous, execution_id);
            }
        }
        self.ledger.clear();
        self.ledger.reset(execution_id);
        self.execution_id = Some(execution_id.to_string());
        self.phase = Some(RunPhase::Idle);
        self.label = None;
    }

    /// Stop tracking; later observations are ignored
    pub fn close(&mut self) {
        self.execution_id = None;
        self.phase = None;
        self.label = None;
        self.ledger.clear();
    }

    pub fn execution_id(&self) -> Option<&str> {
        self.execution_id.as_deref()
    }

    pub fn phase(&self) -> Option<RunPhase> {
        self.phase
    }

    pub fn label(&self) -> Option<&'static str> {
        self.label
    }

    pub fn ledger(&self) -> &MilestoneLedger {
        &self.ledger
    }

    /// Feed a poll result. `None` when no execution is open.
    pub fn observe(&mut self, snapshot: &ExecutionSnapshot) -> Option<Observation> {
        let execution_id = self.execution_id.as_deref()?;
        let status = snapshot.status;

        let milestone = (status.is_settled() && self.ledger.record(execution_id, status))
            .then_some(status);

        let label = status.label();
        let label_changed = self.label != Some(label);
        self.label = Some(label);
        self.phase = Some(RunPhase::from(status));

        Some(Observation {
            status,
            label,
            label_changed,
            milestone,
            keep_polling: !status.stops_polling(),
        })
    }
}
