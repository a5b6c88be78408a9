// SPDX-License-Identifier: MIT

//! Shared runtime plumbing: errors, configuration and collaborator traits

pub mod config;
pub mod error;
pub mod source;
pub mod surface;

pub use config::ReplayConfig;
pub use error::{FormError, FormulaError, ReplayError, SourceError, SurfaceError};
pub use source::{ApprovalDesk, ApprovalRecord, StatusSource};
pub use surface::{ReplayRequest, ReplaySurface, ReportSink, RunReport};
