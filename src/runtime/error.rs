// SPDX-License-Identifier: MIT

//! Typed error handling for kinetic-replay
//!
//! Nothing in the replay core throws to its caller: formula failures collapse
//! to an empty string, trace synthesis always succeeds and the monitor turns
//! poll failures into events. These types describe the failures that do cross
//! a boundary (collaborators, configuration, loading, form edits).

use thiserror::Error;

/// Top-level error type for kinetic-replay
#[derive(Debug, Error)]
pub enum ReplayError {
    /// Configuration errors (invalid env vars, unreadable config file)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Form editing errors
    #[error("Form error: {0}")]
    Form(#[from] FormError),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

/// Failures reported by a Status Source or an approval lookup
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SourceError {
    /// Non-success response; the poll tick is skipped and polling continues
    #[error("status source unavailable: {0}")]
    Unavailable(String),

    /// Authorization expired; polling must stop
    #[error("session expired")]
    SessionExpired,

    /// The execution is unknown to the source
    #[error("execution '{0}' not found")]
    NotFound(String),

    /// The response could not be decoded
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl SourceError {
    /// Whether this failure must stop polling instead of being retried
    pub fn is_fatal(&self) -> bool {
        matches!(self, SourceError::SessionExpired)
    }
}

/// Failures reported by a Replay Surface
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SurfaceError {
    /// The surface refused the trace (e.g. still busy with another one)
    #[error("replay rejected: {0}")]
    Rejected(String),

    /// The surface went away before signalling completion
    #[error("replay surface closed")]
    Closed,
}

/// Form editing errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FormError {
    /// No field with this id exists in the form
    #[error("unknown field '{0}'")]
    UnknownField(String),

    /// Derived and prefilled fields cannot be edited
    #[error("field '{0}' is read-only")]
    ReadOnlyField(String),

    /// Derived fields reference each other in a cycle
    #[error("cyclic derivation between fields: {0:?}")]
    CyclicDerivation(Vec<String>),
}

/// Tokenizer/parser failures for derived-field formulas
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FormulaError {
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("unterminated string literal starting at offset {0}")]
    UnterminatedString(usize),

    #[error("invalid number literal '{0}'")]
    InvalidNumber(String),

    #[error("expected {expected}, found {found}")]
    UnexpectedToken { expected: String, found: String },

    #[error("a formula must be a field reference or a function call, found {0}")]
    NotAnExpression(String),
}

impl ReplayError {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_expired_is_fatal() {
        assert!(SourceError::SessionExpired.is_fatal());
        assert!(!SourceError::Unavailable("502".to_string()).is_fatal());
        assert!(!SourceError::NotFound("exec-1".to_string()).is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err: ReplayError = FormError::ReadOnlyField("total".to_string()).into();
        assert_eq!(err.to_string(), "Form error: field 'total' is read-only");

        assert_eq!(SourceError::SessionExpired.to_string(), "session expired");
        assert_eq!(
            ReplayError::config("poll_interval_ms must be greater than 0").to_string(),
            "Configuration error: poll_interval_ms must be greater than 0"
        );
    }
}
