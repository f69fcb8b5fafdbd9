//! Retry policy for task initialization.
//!
//! Exponential backoff shared by all task processors, with an app-level
//! default that individual tasks may override.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;

/// Default maximum retry attempts.
pub const DEFAULT_MAX_ATTEMPTS: usize = 5;

/// Default initial backoff delay in milliseconds.
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 500;

/// Default maximum backoff delay in milliseconds.
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 10_000;

/// Retry configuration with exponential backoff.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// Initial backoff delay in milliseconds.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Cap on the backoff delay in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
        }
    }
}

impl RetryConfig {
    /// Creates a tokio-retry strategy: delays double from the initial value
    /// up to the cap, yielding `max_attempts - 1` retries.
    pub fn strategy(&self) -> impl Iterator<Item = Duration> {
        ExponentialBackoff::from_millis(2)
            .factor(self.initial_backoff_ms / 2)
            .max_delay(Duration::from_millis(self.max_backoff_ms))
            .take(self.max_attempts.saturating_sub(1))
    }

    /// Resolves the effective config: task-level overrides app-level,
    /// falling back to defaults when neither is set.
    pub fn merge(app_level: &Option<RetryConfig>, task_level: &Option<RetryConfig>) -> RetryConfig {
        match (app_level, task_level) {
            (_, Some(task_config)) => task_config.clone(),
            (Some(app_config), None) => app_config.clone(),
            (None, None) => RetryConfig::default(),
        }
    }
}

fn default_max_attempts() -> usize {
    DEFAULT_MAX_ATTEMPTS
}

fn default_initial_backoff_ms() -> u64 {
    DEFAULT_INITIAL_BACKOFF_MS
}

fn default_max_backoff_ms() -> u64 {
    DEFAULT_MAX_BACKOFF_MS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_retry_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(config.initial_backoff_ms, DEFAULT_INITIAL_BACKOFF_MS);
        assert_eq!(config.max_backoff_ms, DEFAULT_MAX_BACKOFF_MS);
    }

    #[test]
    fn test_strategy_length() {
        let config = RetryConfig {
            max_attempts: 4,
            initial_backoff_ms: 100,
            max_backoff_ms: 1000,
        };
        let delays: Vec<Duration> = config.strategy().collect();
        assert_eq!(delays.len(), 3);
    }

    #[test]
    fn test_merge_precedence() {
        let app = Some(RetryConfig {
            max_attempts: 2,
            initial_backoff_ms: 100,
            max_backoff_ms: 1000,
        });
        let task = Some(RetryConfig {
            max_attempts: 8,
            initial_backoff_ms: 50,
            max_backoff_ms: 2000,
        });

        assert_eq!(RetryConfig::merge(&app, &task).max_attempts, 8);
        assert_eq!(RetryConfig::merge(&app, &None).max_attempts, 2);
        assert_eq!(RetryConfig::merge(&None, &None), RetryConfig::default());
    }
}
