// SPDX-License-Identifier: MIT

//! Run status tracking
//!
//! [`RunStatusTracker`] is the synchronous state machine: it turns each poll
//! result into an [`Observation`] and records every milestone in a
//! [`MilestoneLedger`] so it fires once per execution. [`ExecutionMonitor`]
//! drives it from a Status Source on a timer and performs the side effects.

mod ledger;
mod monitor;
mod state;

pub use ledger::MilestoneLedger;
pub use monitor::{ExecutionMonitor, PollOutcome, TrackerEvent, WatchOutcome};
pub use state::{Observation, RunPhase, RunStatusTracker};
