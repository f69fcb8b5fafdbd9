//! Arm task configuration.

use serde::{Deserialize, Serialize};

/// Default control payload that arms the session.
pub const DEFAULT_ARM_SIGNAL: &str = "START";

/// Default control payload that disarms the session.
pub const DEFAULT_DISARM_SIGNAL: &str = "END";

/// Configuration for the arm task that gates the replay session.
#[derive(PartialEq, Clone, Debug, Deserialize, Serialize)]
pub struct Processor {
    /// The unique name / identifier of the task.
    pub name: String,
    /// Control payload that arms the session and resets the invocation
    /// counter.
    #[serde(default = "default_arm_signal")]
    pub arm_signal: String,
    /// Control payload that disarms the session.
    #[serde(default = "default_disarm_signal")]
    pub disarm_signal: String,
    /// Optional retry configuration (overrides app-level retry config).
    #[serde(default)]
    pub retry: Option<crate::retry::RetryConfig>,
}

fn default_arm_signal() -> String {
    DEFAULT_ARM_SIGNAL.to_string()
}

fn default_disarm_signal() -> String {
    DEFAULT_DISARM_SIGNAL.to_string()
}
