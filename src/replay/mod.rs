// SPDX-License-Identifier: MIT

//! Workflow run replay core

pub mod console;
pub mod execution;
pub mod form;
pub mod formula;
pub mod graph;
pub mod loader;
pub mod trace;
pub mod tracker;

pub use execution::{ExecutionSnapshot, ExecutionStatus, ExecutionStep};
pub use graph::GraphIndex;
pub use trace::{Trace, TraceEntry, TraceSynthesizer};
pub use tracker::{ExecutionMonitor, RunStatusTracker};
