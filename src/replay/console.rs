// SPDX-License-Identifier: MIT

//! Terminal and file-backed collaborators used by the CLI

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

use super::execution::{ExecutionSnapshot, ExecutionStep};
use super::loader::DocumentLoader;
use super::trace::TraceEntry;
use crate::runtime::{
    ApprovalDesk, ApprovalRecord, ReplayError, ReplayRequest, ReplaySurface, ReportSink,
    RunReport, SourceError, StatusSource, SurfaceError,
};

/// Reads the snapshot (and optional step log) from disk on every poll
pub struct FileStatusSource {
    snapshot_path: PathBuf,
    steps_path: Option<PathBuf>,
    loader: DocumentLoader,
}

impl FileStatusSource {
    pub fn new(snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            snapshot_path: snapshot_path.into(),
            steps_path: None,
            loader: DocumentLoader::new(),
        }
    }

    pub fn with_steps(mut self, steps_path: impl Into<PathBuf>) -> Self {
        self.steps_path = Some(steps_path.into());
        self
    }
}

/// A missing file is a skipped tick; anything else unreadable is malformed
fn source_error(path: &std::path::Path, err: ReplayError) -> SourceError {
    match err {
        ReplayError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => {
            SourceError::Unavailable(format!("{} not found", path.display()))
        }
        ReplayError::Io(e) => SourceError::Unavailable(e.to_string()),
        other => SourceError::Malformed(format!("{}: {}", path.display(), other)),
    }
}

#[async_trait]
impl StatusSource for FileStatusSource {
    async fn fetch_snapshot(&self, _execution_id: &str) -> Result<ExecutionSnapshot, SourceError> {
        self.loader
            .load_snapshot(&self.snapshot_path)
            .map_err(|e| source_error(&self.snapshot_path, e))
    }

    async fn fetch_steps(
        &self,
        _execution_id: &str,
    ) -> Result<Option<Vec<ExecutionStep>>, SourceError> {
        let Some(path) = &self.steps_path else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        self.loader
            .load_steps(path)
            .map(Some)
            .map_err(|e| source_error(path, e))
    }
}

/// One line of the terminal replay
pub fn render_entry(entry: &TraceEntry, index: usize, total: usize) -> String {
    let mut line = format!("[{}/{}] {} ({})", index + 1, total, entry.title, entry.node_type);
    if let Some(edge) = &entry.edge_type {
        line.push_str(&format!(" via {}", edge));
    }
    line.push_str(&format!(" - {}", entry.status_key));
    if let Some(error) = &entry.error {
        line.push_str(&format!(": {}", error));
    }
    line
}

/// Prints a trace one step at a time
pub struct ConsoleSurface {
    step_delay: Duration,
}

impl ConsoleSurface {
    pub fn new(step_delay: Duration) -> Self {
        Self { step_delay }
    }
}

#[async_trait]
impl ReplaySurface for ConsoleSurface {
    async fn play(&self, request: &ReplayRequest) -> Result<(), SurfaceError> {
        println!("== {} ==", request.subtitle);
        let total = request.trace.len();
        for (i, entry) in request.trace.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.step_delay).await;
            }
            println!("{}", render_entry(entry, i, total));
        }
        Ok(())
    }
}

/// Approvals read from a JSON/YAML list of records
pub struct ConsoleApprovalDesk {
    approvals_path: Option<PathBuf>,
    loader: DocumentLoader,
}

impl ConsoleApprovalDesk {
    pub fn new(approvals_path: Option<PathBuf>) -> Self {
        Self {
            approvals_path,
            loader: DocumentLoader::new(),
        }
    }
}

#[async_trait]
impl ApprovalDesk for ConsoleApprovalDesk {
    async fn find_pending(
        &self,
        execution_id: &str,
    ) -> Result<Option<ApprovalRecord>, SourceError> {
        let Some(path) = &self.approvals_path else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        let records: Vec<ApprovalRecord> = self
            .loader
            .load(path)
            .map_err(|e| source_error(path, e))?;
        Ok(records.into_iter().find(|r| r.execution_id == execution_id))
    }

    async fn present(&self, approval: ApprovalRecord) {
        match &approval.node_id {
            Some(node) => println!("Approval {} pending at {}", approval.id, node),
            None => println!("Approval {} pending", approval.id),
        }
        if !approval.details.is_null() {
            println!("{}", approval.details);
        }
    }
}

/// Prints the final run report
pub struct ConsoleReportSink;

#[async_trait]
impl ReportSink for ConsoleReportSink {
    async fn present_report(&self, report: RunReport) {
        println!(
            "Execution {} {} after {} completed step(s)",
            report.execution_id,
            report.status.label().to_lowercase(),
            report.steps_completed
        );
        if let Some(error) = &report.error {
            println!("Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::execution::ExecutionStatus;
    use std::io::Write;

    fn entry() -> TraceEntry {
        TraceEntry {
            node_id: "review".to_string(),
            edge_type: Some("approve".to_string()),
            node_type: "approval".to_string(),
            title: "Manager review".to_string(),
            status_key: "failed".to_string(),
            terminal: true,
            error: Some("Rejected twice".to_string()),
        }
    }

    #[test]
    fn test_render_entry() {
        assert_eq!(
            render_entry(&entry(), 1, 3),
            "[2/3] Manager review (approval) via approve - failed: Rejected twice"
        );

        let plain = TraceEntry {
            edge_type: None,
            error: None,
            status_key: "completed".to_string(),
            ..entry()
        };
        assert_eq!(
            render_entry(&plain, 0, 1),
            "[1/1] Manager review (approval) - completed"
        );
    }

    #[tokio::test]
    async fn test_file_source_missing_file_is_unavailable() {
        let source = FileStatusSource::new("/no/such/snapshot.json");
        let err = source.fetch_snapshot("exec-1").await.unwrap_err();
        assert!(matches!(err, SourceError::Unavailable(_)));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_file_source_reads_snapshot_and_steps() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot_path = dir.path().join("snapshot.json");
        let steps_path = dir.path().join("steps.yaml");
        std::fs::write(&snapshot_path, r#"{"status": "completed", "completed_steps": ["a"]}"#)
            .unwrap();

        let source = FileStatusSource::new(&snapshot_path).with_steps(&steps_path);
        let snapshot = source.fetch_snapshot("exec-1").await.unwrap();
        assert_eq!(snapshot.status, ExecutionStatus::Completed);
        assert_eq!(source.fetch_steps("exec-1").await.unwrap(), None);

        let mut steps = std::fs::File::create(&steps_path).unwrap();
        writeln!(steps, "- {{ node_id: a, order: 1, status: completed }}").unwrap();
        let steps = source.fetch_steps("exec-1").await.unwrap().unwrap();
        assert_eq!(steps[0].node_id, "a");
    }

    #[tokio::test]
    async fn test_file_source_malformed_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        std::fs::write(&path, "{ oops").unwrap();

        let err = FileStatusSource::new(&path)
            .fetch_snapshot("exec-1")
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_approval_desk_matches_execution() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("approvals.json");
        std::fs::write(
            &path,
            r#"[
                {"id": "ap-1", "execution_id": "other"},
                {"id": "ap-2", "execution_id": "exec-1", "node_id": "review"}
            ]"#,
        )
        .unwrap();

        let desk = ConsoleApprovalDesk::new(Some(path));
        let found = desk.find_pending("exec-1").await.unwrap().unwrap();
        assert_eq!(found.id, "ap-2");
        assert_eq!(found.node_id.as_deref(), Some("review"));
        assert_eq!(desk.find_pending("exec-9").await.unwrap(), None);

        let none = ConsoleApprovalDesk::new(None);
        assert_eq!(none.find_pending("exec-1").await.unwrap(), None);
    }
}
