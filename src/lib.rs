// SPDX-License-Identifier: MIT

//! Workflow run replay engine
//!
//! - [`replay::formula`] evaluates derived-field formulas
//! - [`replay::graph`] indexes a process graph definition
//! - [`replay::trace`] reconstructs the path an execution took
//! - [`replay::tracker`] follows a running execution and fires each milestone once

pub mod replay;
pub mod runtime;
