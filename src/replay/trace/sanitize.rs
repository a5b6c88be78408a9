// SPDX-License-Identifier: MIT

//! Scrubbing of raw execution errors before they reach an operator

use once_cell::sync::Lazy;
use regex::Regex;

use crate::runtime::config::{ReplayConfig, DEFAULT_FALLBACK_ERROR};

/// Messages that leak internals rather than explain a failure
const INTERNAL_PATTERNS: &[(&str, &str)] = &[
    // stack traces
    (r"(?i)traceback \(most recent call last\)", "stack trace"),
    (r"(?i)\bat\s+[\w$.<>\[\]]+\s*\([^)]*:\d+:\d+\)", "stack trace"),
    (r"(?i)^\s*at\s+\S+:\d+:\d+\s*$", "stack trace"),
    (r"(?i)panicked at", "stack trace"),
    (r"(?i)\.(js|ts|py|rs|java|go|rb):\d+", "stack trace"),
    // database
    (r"(?i)\bsqlstate\b", "database"),
    (r"(?i)syntax error at or near", "database"),
    (r"(?i)duplicate key value", "database"),
    (r"(?i)violates (foreign key|unique|not-null|check) constraint", "database"),
    (r#"(?i)relation "[^"]*" does not exist"#, "database"),
    (r"(?i)deadlock detected", "database"),
    (r"(?i)\beconnrefused\b", "database"),
    (r"(?i)\b(pg|mysql|sqlite|postgres|mongo)\w*error\b", "database"),
    // exception classes
    (
        concat!(
            r"\b(TypeError|ReferenceError|SyntaxError|RangeError|NullPointerException|KeyError|",
            r"AttributeError|ValueError|IndexError|ZeroDivisionError|RuntimeException|",
            r"IllegalStateException|IllegalArgumentException)\b",
        ),
        "exception",
    ),
    // bare http status codes, alone or with their reason phrase
    (
        r"(?i)^\s*(http\s*)?(status\s*(code)?\s*:?\s*)?[1-5]\d{2}\s*$",
        "http status",
    ),
    (
        concat!(
            r"(?i)^\s*(http\s*)?(status\s*(code)?\s*:?\s*)?[1-5]\d{2}[\s:-]+",
            r"(ok|created|accepted|no content|moved permanently|found|see other|not modified|",
            r"bad request|unauthorized|payment required|forbidden|not found|method not allowed|",
            r"not acceptable|request timeout|conflict|gone|payload too large|",
            r"unsupported media type|unprocessable entity|too many requests|",
            r"internal server error|not implemented|bad gateway|service unavailable|",
            r"gateway timeout)\s*$",
        ),
        "http status",
    ),
    (r"(?i)status code \d{3}", "http status"),
    // null/undefined artifacts
    (r"(?i)^\s*(null|undefined|nan|none)\s*$", "artifact"),
    (r"(?i)\[object object\]", "artifact"),
    (r"(?i)cannot read propert(y|ies) of (undefined|null)", "artifact"),
    (r"(?i)\bundefined is not\b", "artifact"),
];

static COMPILED: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    INTERNAL_PATTERNS
        .iter()
        .filter_map(|(pattern, label)| match Regex::new(pattern) {
            Ok(re) => Some((re, *label)),
            Err(e) => {
                log::warn!("Skipping invalid sanitizer pattern {}: {}", pattern, e);
                None
            }
        })
        .collect()
});

/// Replaces internal-looking error messages with a generic one
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorSanitizer {
    fallback: String,
    max_length: usize,
}

impl Default for ErrorSanitizer {
    fn default() -> Self {
        Self::new(DEFAULT_FALLBACK_ERROR, 500)
    }
}

impl ErrorSanitizer {
    pub fn new(fallback: impl Into<String>, max_length: usize) -> Self {
        Self {
            fallback: fallback.into(),
            max_length,
        }
    }

    pub fn from_config(config: &ReplayConfig) -> Self {
        Self::new(config.fallback_error_message.clone(), config.max_error_length)
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Category of the first internal pattern the message matches
    pub fn internal_category(message: &str) -> Option<&'static str> {
        COMPILED
            .iter()
            .find(|(re, _)| re.is_match(message))
            .map(|(_, label)| *label)
    }

    /// Message fit for display. Missing, empty, oversized or internal-looking
    /// messages become the fallback.
    pub fn sanitize(&self, raw: Option<&str>) -> String {
        let Some(message) = raw.map(str::trim).filter(|m| !m.is_empty()) else {
            return self.fallback.clone();
        };
        if message.chars().count() > self.max_length {
            log::debug!("Replacing oversized error message ({} chars)", message.len());
            return self.fallback.clone();
        }
        if let Some(category) = Self::internal_category(message) {
            log::debug!("Replacing {} error message: {}", category, message);
            return self.fallback.clone();
        }
        message.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sanitizer() -> ErrorSanitizer {
        ErrorSanitizer::new("Something went wrong", 120)
    }

    #[test]
    fn test_plain_message_kept() {
        let s = sanitizer();
        assert_eq!(
            s.sanitize(Some("  Budget exceeds the department limit ")),
            "Budget exceeds the department limit"
        );
        for message in [
            "Request had 200 line items",
            "250 units exceed the budget",
            "100 approvers required",
            "at 10:30 the approver rejected it",
            "404 receipts are missing a date",
        ] {
            assert_eq!(s.sanitize(Some(message)), message);
        }
    }

    #[test]
    fn test_internal_messages_replaced() {
        let s = sanitizer();
        let cases = [
            "Traceback (most recent call last): File \"x.py\"",
            "at processStep (/app/engine/run.js:41:17)",
            "at /app/engine/run.js:41:17",
            "thread 'main' panicked at src/main.rs:4:5",
            "ERROR: duplicate key value violates unique constraint \"users_pkey\"",
            "SQLSTATE[42P01]: relation \"approvals\" does not exist",
            "connect ECONNREFUSED 127.0.0.1:5432",
            "TypeError: x is not a function",
            "KeyError: 'amount'",
            "500",
            "404 Not Found",
            "HTTP 502 Bad Gateway",
            "status: 503 - Service Unavailable",
            "Request failed with status code 502",
            "undefined",
            "null",
            "[object Object]",
            "Cannot read properties of undefined (reading 'id')",
        ];
        for case in cases {
            assert_eq!(s.sanitize(Some(case)), "Something went wrong", "{}", case);
        }
    }

    #[test]
    fn test_missing_and_oversized() {
        let s = sanitizer();
        assert_eq!(s.sanitize(None), "Something went wrong");
        assert_eq!(s.sanitize(Some("   ")), "Something went wrong");
        assert_eq!(s.sanitize(Some(&"x".repeat(121))), "Something went wrong");
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            ErrorSanitizer::internal_category("deadlock detected"),
            Some("database")
        );
        assert_eq!(
            ErrorSanitizer::internal_category("status code 403"),
            Some("http status")
        );
        assert_eq!(ErrorSanitizer::internal_category("Manager rejected"), None);
    }

    #[test]
    fn test_from_config() {
        let config = ReplayConfig {
            fallback_error_message: "Nope".to_string(),
            ..Default::default()
        };
        assert_eq!(ErrorSanitizer::from_config(&config).sanitize(None), "Nope");
    }
}
