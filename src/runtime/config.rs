// SPDX-License-Identifier: MIT

//! Runtime configuration for polling, replay pacing and error display

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::error::ReplayError;

pub const DEFAULT_FALLBACK_ERROR: &str =
    "The workflow could not be completed. Please try again or contact support.";

/// Tunables shared by the tracker, the monitor and the error sanitizer
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ReplayConfig {
    /// Fixed interval between Status Source polls
    pub poll_interval_ms: u64,
    /// Pause between two animated trace entries (console surface)
    pub replay_step_delay_ms: u64,
    /// How many times to look for a pending approval after a run enters `waiting`
    pub approval_lookup_attempts: u32,
    /// Delay between approval lookups
    pub approval_retry_delay_ms: u64,
    /// Message shown instead of internal/debug error text
    pub fallback_error_message: String,
    /// Error messages longer than this are replaced by the fallback
    pub max_error_length: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            replay_step_delay_ms: 600,
            approval_lookup_attempts: 5,
            approval_retry_delay_ms: 1000,
            fallback_error_message: DEFAULT_FALLBACK_ERROR.to_string(),
            max_error_length: 500,
        }
    }
}

impl ReplayConfig {
    /// Build a config from `KINETIC_REPLAY_*` environment variables
    ///
    /// Unset variables keep their defaults. Call `dotenv().ok()` first to pick
    /// up a `.env` file.
    pub fn from_env() -> Result<Self, ReplayError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ReplayConfig::from_env`] but reading from an arbitrary lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ReplayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("KINETIC_REPLAY_POLL_INTERVAL_MS") {
            config.poll_interval_ms = parse_number("KINETIC_REPLAY_POLL_INTERVAL_MS", &v)?;
        }
        if let Some(v) = lookup("KINETIC_REPLAY_STEP_DELAY_MS") {
            config.replay_step_delay_ms = parse_number("KINETIC_REPLAY_STEP_DELAY_MS", &v)?;
        }
        if let Some(v) = lookup("KINETIC_REPLAY_APPROVAL_ATTEMPTS") {
            config.approval_lookup_attempts =
                parse_number("KINETIC_REPLAY_APPROVAL_ATTEMPTS", &v)?;
        }
        if let Some(v) = lookup("KINETIC_REPLAY_APPROVAL_RETRY_MS") {
            config.approval_retry_delay_ms = parse_number("KINETIC_REPLAY_APPROVAL_RETRY_MS", &v)?;
        }
        if let Some(v) = lookup("KINETIC_REPLAY_FALLBACK_ERROR") {
            if !v.trim().is_empty() {
                config.fallback_error_message = v;
            }
        }
        if let Some(v) = lookup("KINETIC_REPLAY_MAX_ERROR_LENGTH") {
            config.max_error_length = parse_number("KINETIC_REPLAY_MAX_ERROR_LENGTH", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load a config from a YAML file; missing keys keep their defaults
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, ReplayError> {
        let content = std::fs::read_to_string(path)?;
        let config: ReplayConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the monitor spin
    pub fn validate(&self) -> Result<(), ReplayError> {
        if self.poll_interval_ms == 0 {
            return Err(ReplayError::config("poll_interval_ms must be greater than 0"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn replay_step_delay(&self) -> Duration {
        Duration::from_millis(self.replay_step_delay_ms)
    }

    pub fn approval_retry_delay(&self) -> Duration {
        Duration::from_millis(self.approval_retry_delay_ms)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ReplayError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ReplayError::config(format!("{} must be a number, got '{}'", key, value)))
}
