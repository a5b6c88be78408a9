// SPDX-License-Identifier: MIT

//! Collaborators the tracker writes to

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::SurfaceError;
use crate::replay::execution::ExecutionStatus;
use crate::replay::trace::Trace;

/// A trace handed to a Replay Surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayRequest {
    /// Unique per accepted trace, for correlating start/done in logs
    pub replay_id: Uuid,
    pub execution_id: String,
    pub trace: Trace,
    pub subtitle: String,
}

impl ReplayRequest {
    pub fn new(execution_id: impl Into<String>, trace: Trace, subtitle: impl Into<String>) -> Self {
        Self {
            replay_id: Uuid::new_v4(),
            execution_id: execution_id.into(),
            trace,
            subtitle: subtitle.into(),
        }
    }
}

/// Animates a trace.
///
/// `play` resolves when the animation is done, which is the single `done`
/// signal for that trace. Dropping the future cancels the replay. Callers
/// never hand a second trace to a surface before the first one resolved.
#[async_trait]
pub trait ReplaySurface: Send + Sync {
    async fn play(&self, request: &ReplayRequest) -> Result<(), SurfaceError>;
}

/// Summary shown when an execution completes or fails
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub execution_id: String,
    pub status: ExecutionStatus,
    pub trace: Trace,
    /// Sanitized error message, only for failed runs
    pub error: Option<String>,
    pub steps_completed: usize,
}

/// Receives completion/failure reports
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn present_report(&self, report: RunReport);
}
