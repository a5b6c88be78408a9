// SPDX-License-Identifier: MIT

//! Collaborators the tracker reads from

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::SourceError;
use crate::replay::execution::{ExecutionSnapshot, ExecutionStep};

/// Supplies execution snapshots for a single execution id.
///
/// Transport and authentication live behind this trait; the tracker only
/// distinguishes a skipped tick from an expired session via [`SourceError`].
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Fetch the coarse status snapshot of an execution
    async fn fetch_snapshot(&self, execution_id: &str) -> Result<ExecutionSnapshot, SourceError>;

    /// Fetch the fine-grained step log, when the source has one
    async fn fetch_steps(
        &self,
        _execution_id: &str,
    ) -> Result<Option<Vec<ExecutionStep>>, SourceError> {
        Ok(None)
    }
}

/// A pending approval attached to a waiting execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub id: String,
    pub execution_id: String,
    /// Node the run is waiting on
    pub node_id: Option<String>,
    #[serde(default)]
    pub details: Value,
}

/// Looks up and presents approval requests for waiting executions
#[async_trait]
pub trait ApprovalDesk: Send + Sync {
    /// Look up the pending approval; `Ok(None)` means "not visible yet"
    async fn find_pending(&self, execution_id: &str)
        -> Result<Option<ApprovalRecord>, SourceError>;

    /// Show the approval to the operator
    async fn present(&self, approval: ApprovalRecord);
}
