// SPDX-License-Identifier: MIT

//! Execution status snapshots and step logs as returned by a Status Source
//!
//! The wire shapes are lenient: several field spellings are accepted, unknown
//! fields are ignored and an unknown status reads as `running`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Overall status of one workflow execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExecutionStatus {
    Running,
    /// Paused for an approval decision
    Waiting,
    Paused,
    Completed,
    Failed,
    Cancelled,
    TimedOut,
}

impl ExecutionStatus {
    /// Parse a status string, tolerating common spellings
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "waiting" | "waiting_approval" | "waiting_for_approval" | "awaiting_approval" => {
                ExecutionStatus::Waiting
            }
            "paused" => ExecutionStatus::Paused,
            "completed" | "complete" | "succeeded" | "success" | "done" => {
                ExecutionStatus::Completed
            }
            "failed" | "failure" | "error" => ExecutionStatus::Failed,
            "cancelled" | "canceled" => ExecutionStatus::Cancelled,
            "timed_out" | "timedout" | "timeout" => ExecutionStatus::TimedOut,
            "running" | "pending" | "queued" | "started" | "in_progress" => {
                ExecutionStatus::Running
            }
            other => {
                log::debug!("Unknown execution status '{}', treating as running", other);
                ExecutionStatus::Running
            }
        }
    }

    /// Canonical status key
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Waiting => "waiting",
            ExecutionStatus::Paused => "paused",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Cancelled => "cancelled",
            ExecutionStatus::TimedOut => "timed_out",
        }
    }

    /// Human status label for display
    pub fn label(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "Running",
            ExecutionStatus::Waiting => "Awaiting approval",
            ExecutionStatus::Paused => "Paused",
            ExecutionStatus::Completed => "Completed",
            ExecutionStatus::Failed => "Failed",
            ExecutionStatus::Cancelled => "Cancelled",
            ExecutionStatus::TimedOut => "Timed out",
        }
    }

    /// Polling stops for good on these
    pub fn stops_polling(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }

    /// The run is stuck but may resume; polling continues
    pub fn is_stalled(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Waiting | ExecutionStatus::Paused | ExecutionStatus::TimedOut
        )
    }

    /// Stopped somewhere other than a successful end
    pub fn is_interrupted(&self) -> bool {
        !matches!(self, ExecutionStatus::Running | ExecutionStatus::Completed)
    }

    /// Anything but `running`
    pub fn is_settled(&self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }
}

impl From<String> for ExecutionStatus {
    fn from(raw: String) -> Self {
        ExecutionStatus::parse(&raw)
    }
}

impl From<ExecutionStatus> for String {
    fn from(status: ExecutionStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One poll result for an execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawSnapshot")]
pub struct ExecutionSnapshot {
    pub status: ExecutionStatus,
    pub current_step_id: Option<String>,
    pub completed_step_ids: Vec<String>,
    pub error: Option<String>,
}

impl ExecutionSnapshot {
    pub fn new(status: ExecutionStatus) -> Self {
        Self {
            status,
            current_step_id: None,
            completed_step_ids: Vec::new(),
            error: None,
        }
    }

    pub fn with_current(mut self, node_id: impl Into<String>) -> Self {
        self.current_step_id = Some(node_id.into());
        self
    }

    pub fn with_completed<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.completed_step_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }
}

/// Wire shape of a snapshot before normalization
#[derive(Debug, Default, Deserialize)]
struct RawSnapshot {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    current_step: Option<String>,
    #[serde(default)]
    current_node_id: Option<String>,
    #[serde(default, alias = "currentStepId")]
    current_step_id: Option<String>,
    #[serde(default)]
    completed_steps: Option<Vec<Value>>,
    #[serde(default, alias = "completedStepIds")]
    completed_step_ids: Option<Vec<Value>>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default, alias = "errorMessage")]
    error_message: Option<String>,
}

impl From<RawSnapshot> for ExecutionSnapshot {
    fn from(raw: RawSnapshot) -> Self {
        let status = raw
            .status
            .as_deref()
            .map(ExecutionStatus::parse)
            .unwrap_or(ExecutionStatus::Running);

        let current_step_id = [raw.current_step, raw.current_node_id, raw.current_step_id]
            .into_iter()
            .flatten()
            .find(|id| !id.trim().is_empty());

        let completed_step_ids = raw
            .completed_steps
            .or(raw.completed_step_ids)
            .unwrap_or_default()
            .iter()
            .filter_map(step_id_from_value)
            .collect();

        let error = raw
            .error
            .as_ref()
            .and_then(error_message_from_value)
            .or_else(|| raw.error_message.filter(|m| !m.trim().is_empty()));

        Self {
            status,
            current_step_id,
            completed_step_ids,
            error,
        }
    }
}

/// A single executed step from the fine-grained step log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawStep")]
pub struct ExecutionStep {
    pub node_id: String,
    pub order: i64,
    /// Step status as reported by the source (`completed`, `failed`, ...)
    pub status: Option<String>,
    pub input: Option<Value>,
    pub output: Option<Value>,
    pub error: Option<String>,
}

impl ExecutionStep {
    pub fn new(node_id: impl Into<String>, order: i64) -> Self {
        Self {
            node_id: node_id.into(),
            order,
            status: None,
            input: None,
            output: None,
            error: None,
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }
}

#[derive(Debug, Deserialize)]
struct RawStep {
    #[serde(alias = "nodeId", alias = "step_id")]
    node_id: String,
    #[serde(default, alias = "step_order", alias = "sequence")]
    order: i64,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    input: Option<Value>,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

impl From<RawStep> for ExecutionStep {
    fn from(raw: RawStep) -> Self {
        Self {
            node_id: raw.node_id,
            order: raw.order,
            status: raw
                .status
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty()),
            input: raw.input,
            output: raw.output,
            error: raw.error.as_ref().and_then(error_message_from_value),
        }
    }
}

/// Extract a step id from either a bare string or an object carrying one
fn step_id_from_value(value: &Value) -> Option<String> {
    let id = match value {
        Value::String(s) => Some(s.as_str()),
        Value::Object(obj) => obj
            .get("node_id")
            .or_else(|| obj.get("id"))
            .and_then(Value::as_str),
        _ => None,
    }?;
    let id = id.trim();
    (!id.is_empty()).then(|| id.to_string())
}

/// `"boom"` and `{"message": "boom"}` both read as `boom`
fn error_message_from_value(value: &Value) -> Option<String> {
    let message = match value {
        Value::String(s) => s.clone(),
        Value::Object(obj) => obj.get("message").and_then(Value::as_str)?.to_string(),
        _ => return None,
    };
    (!message.trim().is_empty()).then_some(message)
}
