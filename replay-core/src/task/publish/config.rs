//! Publish task configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the publish task.
#[derive(PartialEq, Clone, Debug, Deserialize, Serialize)]
pub struct Processor {
    /// The unique name / identifier of the task.
    pub name: String,
    /// Topic override for outbound messages. The event subject is used when
    /// unset.
    #[serde(default)]
    pub topic: Option<String>,
    /// Whether published events are also forwarded to the next task.
    #[serde(default)]
    pub forward: bool,
    /// Optional retry configuration (overrides app-level retry config).
    #[serde(default)]
    pub retry: Option<crate::retry::RetryConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: Processor = serde_json::from_str(r#"{"name": "publish"}"#).unwrap();
        assert!(config.topic.is_none());
        assert!(!config.forward);
    }
}
