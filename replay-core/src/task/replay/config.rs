//! Replay sequencer configuration.
//!
//! The observed capture uses offset 2022 over a 7711-row table with a
//! 100-invocation bound; those values are the defaults here, not hardcoded
//! behavior.

use crate::envelope::EnvelopeFormat;
use serde::{Deserialize, Serialize};

/// Default identifier offset applied before the table lookup.
pub const DEFAULT_OFFSET: i64 = 2022;

/// Default size of the record table.
pub const DEFAULT_TABLE_SIZE: u64 = 7711;

/// Default number of replay invocations before termination.
pub const DEFAULT_BOUND: u64 = 100;

/// Errors that can occur during configuration validation.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("'table_size' must be greater than zero")]
    ZeroTableSize,
    #[error("'table_size' is too large for index computation")]
    TableSizeOverflow,
}

/// Configuration for the replay sequencer task.
#[derive(PartialEq, Clone, Debug, Deserialize, Serialize)]
pub struct Processor {
    /// The unique name / identifier of the task.
    pub name: String,
    /// Outbound topic for every envelope, including the terminal signal.
    pub topic: String,
    /// Offset added to the inbound identifier before the modulo.
    #[serde(default = "default_offset")]
    pub offset: i64,
    /// Modulus for the record index computation.
    #[serde(default = "default_table_size")]
    pub table_size: u64,
    /// Number of invocations before the terminal signal is emitted.
    #[serde(default = "default_bound")]
    pub bound: u64,
    /// Wire encoding for outbound envelopes.
    #[serde(default)]
    pub format: EnvelopeFormat,
    /// Optional retry configuration (overrides app-level retry config).
    #[serde(default)]
    pub retry: Option<crate::retry::RetryConfig>,
}

impl Processor {
    /// Validates the index computation parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.table_size == 0 {
            return Err(ConfigError::ZeroTableSize);
        }
        if self.table_size > i64::MAX as u64 {
            return Err(ConfigError::TableSizeOverflow);
        }
        Ok(())
    }
}

fn default_offset() -> i64 {
    DEFAULT_OFFSET
}

fn default_table_size() -> u64 {
    DEFAULT_TABLE_SIZE
}

fn default_bound() -> u64 {
    DEFAULT_BOUND
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_yaml_equivalent() -> Processor {
        serde_json::from_str(r#"{"name": "replay", "topic": "challenge/replay"}"#).unwrap()
    }

    #[test]
    fn test_defaults_applied_on_deserialization() {
        let config = minimal_yaml_equivalent();
        assert_eq!(config.offset, DEFAULT_OFFSET);
        assert_eq!(config.table_size, DEFAULT_TABLE_SIZE);
        assert_eq!(config.bound, DEFAULT_BOUND);
        assert_eq!(config.format, EnvelopeFormat::Raw);
        assert!(config.retry.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_zero_table_size() {
        let config = Processor {
            table_size: 0,
            ..minimal_yaml_equivalent()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroTableSize)
        ));
    }

    #[test]
    fn test_validation_table_size_overflow() {
        let config = Processor {
            table_size: u64::MAX,
            ..minimal_yaml_equivalent()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TableSizeOverflow)
        ));
    }

    #[test]
    fn test_config_serialization_round_trip() {
        let config = Processor {
            name: "replay".to_string(),
            topic: "challenge/replay".to_string(),
            offset: 7,
            table_size: 11,
            bound: 3,
            format: EnvelopeFormat::Structured,
            retry: None,
        };

        let serialized = serde_json::to_string(&config).unwrap();
        let deserialized: Processor = serde_json::from_str(&serialized).unwrap();
        assert_eq!(config, deserialized);
    }
}
