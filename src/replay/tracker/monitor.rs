// SPDX-License-Identifier: MIT

//! Polling monitor for one execution at a time

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::state::RunStatusTracker;
use crate::replay::execution::{ExecutionSnapshot, ExecutionStatus};
use crate::replay::graph::GraphIndex;
use crate::replay::trace::{ErrorSanitizer, Trace, TraceSynthesizer};
use crate::runtime::{
    ApprovalDesk, ReplayConfig, ReplayRequest, ReplaySurface, ReportSink, RunReport,
    StatusSource,
};

/// Progress notifications published while watching an execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrackerEvent {
    StatusChanged {
        execution_id: String,
        status: ExecutionStatus,
        label: String,
    },
    /// The source failed; the tick was skipped
    PollFailed {
        execution_id: String,
        reason: String,
    },
    /// A poll was requested while another was still in flight
    PollSkipped { execution_id: String },
    ReplayStarted {
        execution_id: String,
        replay_id: Uuid,
        steps: usize,
    },
    ReplayFinished {
        execution_id: String,
        replay_id: Uuid,
    },
    ReplayFailed {
        execution_id: String,
        replay_id: Uuid,
        reason: String,
    },
    ApprovalPresented {
        execution_id: String,
        approval_id: String,
    },
    ApprovalNotFound {
        execution_id: String,
        attempts: u32,
    },
    ReportPresented {
        execution_id: String,
        status: ExecutionStatus,
    },
    SessionExpired { execution_id: String },
}

/// How a watch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// The run reached a status that stops polling
    Finished(ExecutionStatus),
    SessionExpired,
    /// The view was closed or another execution was opened
    Cancelled,
}

/// Result of a single poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Continue,
    /// Another poll was already in flight
    Skipped,
    Done(WatchOutcome),
}

/// Why a dispatch stopped early
enum Interrupt {
    Cancelled,
    SessionExpired,
}

/// Clears the in-flight flag when a poll ends, however it ends
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Polls a Status Source and dispatches each milestone exactly once.
///
/// Side effects run strictly after the replay of the same milestone has
/// finished, and nothing is mutated once the execution was closed.
pub struct ExecutionMonitor {
    source: Arc<dyn StatusSource>,
    surface: Arc<dyn ReplaySurface>,
    approvals: Option<Arc<dyn ApprovalDesk>>,
    reports: Option<Arc<dyn ReportSink>>,
    graph: Arc<GraphIndex>,
    sanitizer: ErrorSanitizer,
    config: ReplayConfig,
    tracker: Mutex<RunStatusTracker>,
    cancel: Mutex<CancellationToken>,
    in_flight: AtomicBool,
    events: Option<mpsc::Sender<TrackerEvent>>,
}

impl ExecutionMonitor {
    pub fn new(
        source: Arc<dyn StatusSource>,
        surface: Arc<dyn ReplaySurface>,
        graph: Arc<GraphIndex>,
        config: ReplayConfig,
    ) -> Self {
        Self {
            source,
            surface,
            approvals: None,
            reports: None,
            graph,
            sanitizer: ErrorSanitizer::from_config(&config),
            config,
            tracker: Mutex::new(RunStatusTracker::new()),
            cancel: Mutex::new(CancellationToken::new()),
            in_flight: AtomicBool::new(false),
            events: None,
        }
    }

    pub fn with_approvals(mut self, desk: Arc<dyn ApprovalDesk>) -> Self {
        self.approvals = Some(desk);
        self
    }

    pub fn with_reports(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.reports = Some(sink);
        self
    }

    pub fn with_events(mut self, tx: mpsc::Sender<TrackerEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Start tracking an execution, cancelling whatever was tracked before
    pub async fn open_execution(&self, execution_id: &str) -> CancellationToken {
        let token = CancellationToken::new();
        {
            let mut current = self.cancel.lock().await;
            current.cancel();
            *current = token.clone();
        }
        self.tracker.lock().await.open_execution(execution_id);
        log::info!("Tracking execution {}", execution_id);
        token
    }

    /// Stop polling and drop any pending replay or side effect
    pub async fn close(&self) {
        self.cancel.lock().await.cancel();
        let mut tracker = self.tracker.lock().await;
        if let Some(id) = tracker.execution_id() {
            log::info!("Closing execution {}", id);
        }
        tracker.close();
    }

    /// Current status label of the tracked execution
    pub async fn label(&self) -> Option<&'static str> {
        self.tracker.lock().await.label()
    }

    /// Open `execution_id` and poll it until polling should stop
    pub async fn watch(&self, execution_id: &str) -> WatchOutcome {
        let token = self.open_execution(execution_id).await;

        let mut ticker = tokio::time::interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = token.cancelled() => return WatchOutcome::Cancelled,
                _ = ticker.tick() => {}
            }
            match self.poll_with(execution_id, &token).await {
                PollOutcome::Continue | PollOutcome::Skipped => continue,
                PollOutcome::Done(outcome) => {
                    log::info!("Stopped watching {}: {:?}", execution_id, outcome);
                    return outcome;
                }
            }
        }
    }

    /// Poll once outside the timer, e.g. for a manual refresh
    pub async fn poll_once(&self, execution_id: &str) -> PollOutcome {
        let token = self.cancel.lock().await.clone();
        self.poll_with(execution_id, &token).await
    }

    async fn poll_with(&self, execution_id: &str, token: &CancellationToken) -> PollOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::debug!("Poll for {} still in flight, skipping tick", execution_id);
            self.emit(TrackerEvent::PollSkipped {
                execution_id: execution_id.to_string(),
            })
            .await;
            return PollOutcome::Skipped;
        }
        let _guard = InFlight(&self.in_flight);

        let fetched = tokio::select! {
            _ = token.cancelled() => return PollOutcome::Done(WatchOutcome::Cancelled),
            result = self.source.fetch_snapshot(execution_id) => result,
        };

        let snapshot = match fetched {
            Ok(snapshot) => snapshot,
            Err(e) if e.is_fatal() => {
                self.expire(execution_id).await;
                return PollOutcome::Done(WatchOutcome::SessionExpired);
            }
            Err(e) => {
                log::warn!("Poll for {} failed: {}", execution_id, e);
                self.emit(TrackerEvent::PollFailed {
                    execution_id: execution_id.to_string(),
                    reason: e.to_string(),
                })
                .await;
                return PollOutcome::Continue;
            }
        };

        let observation = {
            let mut tracker = self.tracker.lock().await;
            if token.is_cancelled() || tracker.execution_id() != Some(execution_id) {
                return PollOutcome::Done(WatchOutcome::Cancelled);
            }
            tracker.observe(&snapshot)
        };
        let Some(observation) = observation else {
            return PollOutcome::Done(WatchOutcome::Cancelled);
        };

        if observation.label_changed {
            self.emit(TrackerEvent::StatusChanged {
                execution_id: execution_id.to_string(),
                status: observation.status,
                label: observation.label.to_string(),
            })
            .await;
        }

        if let Some(milestone) = observation.milestone {
            match self.dispatch(execution_id, milestone, &snapshot, token).await {
                Ok(()) => {}
                Err(Interrupt::Cancelled) => return PollOutcome::Done(WatchOutcome::Cancelled),
                Err(Interrupt::SessionExpired) => {
                    self.expire(execution_id).await;
                    return PollOutcome::Done(WatchOutcome::SessionExpired);
                }
            }
        }

        if observation.keep_polling {
            PollOutcome::Continue
        } else {
            PollOutcome::Done(WatchOutcome::Finished(observation.status))
        }
    }

    /// Replay the trace, then run the milestone's side effect
    async fn dispatch(
        &self,
        execution_id: &str,
        milestone: ExecutionStatus,
        snapshot: &ExecutionSnapshot,
        token: &CancellationToken,
    ) -> Result<(), Interrupt> {
        log::info!("Execution {} reached milestone {}", execution_id, milestone);

        let steps = tokio::select! {
            _ = token.cancelled() => return Err(Interrupt::Cancelled),
            result = self.source.fetch_steps(execution_id) => result,
        };
        let steps = match steps {
            Ok(steps) => steps,
            Err(e) if e.is_fatal() => return Err(Interrupt::SessionExpired),
            Err(e) => {
                log::warn!(
                    "Step log for {} unavailable, using snapshot: {}",
                    execution_id,
                    e
                );
                None
            }
        };

        let trace = TraceSynthesizer::new(&self.graph, &self.sanitizer)
            .synthesize(snapshot, steps.as_deref());

        if trace.is_empty() {
            log::debug!("Nothing to replay for {}", execution_id);
        } else {
            self.replay(execution_id, milestone, &trace, token).await?;
        }

        if token.is_cancelled() {
            return Err(Interrupt::Cancelled);
        }

        match milestone {
            ExecutionStatus::Waiting => self.present_approval(execution_id, token).await,
            ExecutionStatus::Completed | ExecutionStatus::Failed => {
                self.present_report(execution_id, milestone, snapshot, trace)
                    .await;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn replay(
        &self,
        execution_id: &str,
        milestone: ExecutionStatus,
        trace: &Trace,
        token: &CancellationToken,
    ) -> Result<(), Interrupt> {
        let request = ReplayRequest::new(execution_id, trace.clone(), trace.subtitle(milestone));
        self.emit(TrackerEvent::ReplayStarted {
            execution_id: execution_id.to_string(),
            replay_id: request.replay_id,
            steps: trace.len(),
        })
        .await;

        let played = tokio::select! {
            _ = token.cancelled() => return Err(Interrupt::Cancelled),
            result = self.surface.play(&request) => result,
        };

        match played {
            Ok(()) => {
                self.emit(TrackerEvent::ReplayFinished {
                    execution_id: execution_id.to_string(),
                    replay_id: request.replay_id,
                })
                .await;
            }
            Err(e) => {
                log::warn!("Replay of {} failed: {}", execution_id, e);
                self.emit(TrackerEvent::ReplayFailed {
                    execution_id: execution_id.to_string(),
                    replay_id: request.replay_id,
                    reason: e.to_string(),
                })
                .await;
            }
        }
        Ok(())
    }

    /// Look up the pending approval, retrying while the run is still waiting
    async fn present_approval(
        &self,
        execution_id: &str,
        token: &CancellationToken,
    ) -> Result<(), Interrupt> {
        let Some(desk) = &self.approvals else {
            return Ok(());
        };
        let attempts = self.config.approval_lookup_attempts.max(1);

        for attempt in 1..=attempts {
            let found = tokio::select! {
                _ = token.cancelled() => return Err(Interrupt::Cancelled),
                result = desk.find_pending(execution_id) => result,
            };
            match found {
                Ok(Some(approval)) => {
                    if token.is_cancelled() {
                        return Err(Interrupt::Cancelled);
                    }
                    let approval_id = approval.id.clone();
                    desk.present(approval).await;
                    self.emit(TrackerEvent::ApprovalPresented {
                        execution_id: execution_id.to_string(),
                        approval_id,
                    })
                    .await;
                    return Ok(());
                }
                Ok(None) => {
                    log::debug!(
                        "Approval for {} not visible yet ({}/{})",
                        execution_id,
                        attempt,
                        attempts
                    );
                }
                Err(e) if e.is_fatal() => return Err(Interrupt::SessionExpired),
                Err(e) => log::warn!("Approval lookup for {} failed: {}", execution_id, e),
            }

            if attempt == attempts {
                break;
            }

            tokio::select! {
                _ = token.cancelled() => return Err(Interrupt::Cancelled),
                _ = tokio::time::sleep(self.config.approval_retry_delay()) => {}
            }

            let refreshed = tokio::select! {
                _ = token.cancelled() => return Err(Interrupt::Cancelled),
                result = self.source.fetch_snapshot(execution_id) => result,
            };
            match refreshed {
                Ok(snapshot) if snapshot.status != ExecutionStatus::Waiting => {
                    log::debug!(
                        "Execution {} left waiting ({}), dropping approval lookup",
                        execution_id,
                        snapshot.status
                    );
                    return Ok(());
                }
                Err(e) if e.is_fatal() => return Err(Interrupt::SessionExpired),
                _ => {}
            }
        }

        log::warn!(
            "No pending approval found for {} after {} attempts",
            execution_id,
            attempts
        );
        self.emit(TrackerEvent::ApprovalNotFound {
            execution_id: execution_id.to_string(),
            attempts,
        })
        .await;
        Ok(())
    }

    async fn present_report(
        &self,
        execution_id: &str,
        status: ExecutionStatus,
        snapshot: &ExecutionSnapshot,
        trace: Trace,
    ) {
        let Some(sink) = &self.reports else {
            return;
        };
        let error = (status == ExecutionStatus::Failed).then(|| match trace.error() {
            Some(message) => message.to_string(),
            None => self.sanitizer.sanitize(snapshot.error.as_deref()),
        });
        let report = RunReport {
            execution_id: execution_id.to_string(),
            status,
            steps_completed: trace.steps_completed(),
            trace,
            error,
        };
        sink.present_report(report).await;
        self.emit(TrackerEvent::ReportPresented {
            execution_id: execution_id.to_string(),
            status,
        })
        .await;
    }

    async fn expire(&self, execution_id: &str) {
        log::error!("Session expired while polling {}", execution_id);
        self.cancel.lock().await.cancel();
        self.tracker.lock().await.close();
        self.emit(TrackerEvent::SessionExpired {
            execution_id: execution_id.to_string(),
        })
        .await;
    }

    async fn emit(&self, event: TrackerEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{SourceError, SurfaceError};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex as StdMutex;

    struct ScriptedSource {
        snapshots: StdMutex<VecDeque<Result<ExecutionSnapshot, SourceError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<ExecutionSnapshot, SourceError>>) -> Arc<Self> {
            Arc::new(Self {
                snapshots: StdMutex::new(script.into()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl StatusSource for ScriptedSource {
        async fn fetch_snapshot(&self, _id: &str) -> Result<ExecutionSnapshot, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.snapshots.lock().unwrap();
            // The last entry repeats once the script runs out
            if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                script.front().cloned().unwrap()
            }
        }
    }

    #[derive(Default)]
    struct CountingSurface {
        plays: AtomicUsize,
    }

    #[async_trait]
    impl ReplaySurface for CountingSurface {
        async fn play(&self, _request: &ReplayRequest) -> Result<(), SurfaceError> {
            self.plays.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn fast_config() -> ReplayConfig {
        ReplayConfig {
            poll_interval_ms: 5,
            approval_retry_delay_ms: 1,
            ..Default::default()
        }
    }

    fn completed() -> ExecutionSnapshot {
        ExecutionSnapshot::new(ExecutionStatus::Completed).with_completed(["a"])
    }

    #[tokio::test]
    async fn test_watch_stops_on_completed() {
        let source = ScriptedSource::new(vec![
            Ok(ExecutionSnapshot::new(ExecutionStatus::Running)),
            Ok(completed()),
        ]);
        let surface = Arc::new(CountingSurface::default());
        let monitor = ExecutionMonitor::new(
            source.clone(),
            surface.clone(),
            Arc::new(GraphIndex::default()),
            fast_config(),
        );

        let outcome = monitor.watch("exec-1").await;
        assert_eq!(outcome, WatchOutcome::Finished(ExecutionStatus::Completed));
        assert_eq!(surface.plays.load(Ordering::SeqCst), 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unavailable_source_skips_tick() {
        let source = ScriptedSource::new(vec![
            Err(SourceError::Unavailable("502".to_string())),
            Ok(completed()),
        ]);
        let surface = Arc::new(CountingSurface::default());
        let monitor = ExecutionMonitor::new(
            source.clone(),
            surface.clone(),
            Arc::new(GraphIndex::default()),
            fast_config(),
        );

        let outcome = monitor.watch("exec-1").await;
        assert_eq!(outcome, WatchOutcome::Finished(ExecutionStatus::Completed));
        assert_eq!(surface.plays.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_session_expiry_stops_polling() {
        let source = ScriptedSource::new(vec![Err(SourceError::SessionExpired)]);
        let surface = Arc::new(CountingSurface::default());
        let (tx, mut rx) = mpsc::channel(16);
        let monitor = ExecutionMonitor::new(
            source.clone(),
            surface.clone(),
            Arc::new(GraphIndex::default()),
            fast_config(),
        )
        .with_events(tx);

        assert_eq!(monitor.watch("exec-1").await, WatchOutcome::SessionExpired);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            rx.recv().await,
            Some(TrackerEvent::SessionExpired {
                execution_id: "exec-1".to_string()
            })
        );
        assert_eq!(monitor.label().await, None);
    }

    #[tokio::test]
    async fn test_poll_once_outside_watch() {
        let source = ScriptedSource::new(vec![Ok(completed())]);
        let surface = Arc::new(CountingSurface::default());
        let monitor = ExecutionMonitor::new(
            source,
            surface.clone(),
            Arc::new(GraphIndex::default()),
            fast_config(),
        );

        monitor.open_execution("exec-1").await;
        assert_eq!(
            monitor.poll_once("exec-1").await,
            PollOutcome::Done(WatchOutcome::Finished(ExecutionStatus::Completed))
        );
        assert_eq!(
            monitor.poll_once("exec-1").await,
            PollOutcome::Done(WatchOutcome::Finished(ExecutionStatus::Completed))
        );
        assert_eq!(surface.plays.load(Ordering::SeqCst), 1);
        assert_eq!(monitor.label().await, Some("Completed"));
    }

    #[tokio::test]
    async fn test_poll_for_other_execution_is_ignored() {
        let source = ScriptedSource::new(vec![Ok(completed())]);
        let surface = Arc::new(CountingSurface::default());
        let monitor = ExecutionMonitor::new(
            source,
            surface.clone(),
            Arc::new(GraphIndex::default()),
            fast_config(),
        );

        monitor.open_execution("exec-2").await;
        assert_eq!(
            monitor.poll_once("exec-1").await,
            PollOutcome::Done(WatchOutcome::Cancelled)
        );
        assert_eq!(surface.plays.load(Ordering::SeqCst), 0);
    }
}
