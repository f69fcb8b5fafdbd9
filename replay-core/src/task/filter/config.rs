//! Temperature filter configuration.

use serde::{Deserialize, Serialize};

/// Default unit accepted by the filter.
pub const DEFAULT_UNIT: &str = "C";

/// Configuration for the temperature filter task.
#[derive(PartialEq, Clone, Debug, Deserialize, Serialize)]
pub struct Processor {
    /// The unique name / identifier of the task.
    pub name: String,
    /// Measurement unit accepted by the filter.
    #[serde(default = "default_unit")]
    pub unit: String,
    /// Subject for the derived range-bound event. Inbound subject is reused
    /// when unset.
    #[serde(default)]
    pub derived_subject: Option<String>,
    /// Optional retry configuration (overrides app-level retry config).
    #[serde(default)]
    pub retry: Option<crate::retry::RetryConfig>,
}

fn default_unit() -> String {
    DEFAULT_UNIT.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_default() {
        let config: Processor = serde_json::from_str(r#"{"name": "filter"}"#).unwrap();
        assert_eq!(config.unit, "C");
        assert!(config.derived_subject.is_none());
    }
}
