// SPDX-License-Identifier: MIT

//! Trace synthesis
//!
//! A trace is the ordered, deduplicated path an execution took through its
//! process graph, annotated with the branch followed into each node. It is
//! built from the fine-grained step log when the source has one, otherwise
//! from the coarse snapshot.

mod sanitize;
mod synthesizer;
mod types;

pub use sanitize::ErrorSanitizer;
pub use synthesizer::{TraceSynthesizer, FALLBACK_NODE_TYPE, UNKNOWN_STEP_TITLE};
pub use types::{Trace, TraceEntry};
