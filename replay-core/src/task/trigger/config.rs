//! Trigger task configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default delay before the control signal is emitted.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(2);

/// Default control payload emitted by the trigger.
pub const DEFAULT_SIGNAL: &str = "START";

/// Configuration for the trigger task that opens a replay session.
#[derive(PartialEq, Clone, Debug, Deserialize, Serialize)]
pub struct Subscriber {
    /// The unique name / identifier of the task.
    pub name: String,
    /// Subject attached to the emitted control event.
    pub subject: String,
    /// Delay before the control signal is emitted.
    #[serde(default = "default_delay", with = "humantime_serde")]
    pub delay: Duration,
    /// Control payload to emit.
    #[serde(default = "default_signal")]
    pub signal: String,
    /// Optional retry configuration (overrides app-level retry config).
    #[serde(default)]
    pub retry: Option<crate::retry::RetryConfig>,
}

fn default_delay() -> Duration {
    DEFAULT_DELAY
}

fn default_signal() -> String {
    DEFAULT_SIGNAL.to_string()
}
