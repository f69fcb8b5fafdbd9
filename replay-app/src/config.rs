//! Configuration structures for the replay worker application and flows.
//!
//! Provides configuration structures for the main application and individual
//! flows. Supports deserialization from YAML and JSON files plus environment
//! variable overrides.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Environment variable prefix for application config overrides.
pub const ENV_PREFIX: &str = "REPLAY";

/// Top-level configuration for an individual flow.
#[derive(PartialEq, Clone, Debug, Deserialize, Serialize)]
pub struct FlowConfig {
    /// Flow definition containing name and tasks.
    pub flow: Flow,
}

/// Flow definition with name and task list.
#[derive(PartialEq, Clone, Debug, Deserialize, Serialize)]
pub struct Flow {
    /// Unique name for this flow.
    pub name: String,
    /// Optional labels for logging.
    pub labels: Option<Map<String, Value>>,
    /// List of tasks to execute in this flow.
    pub tasks: Vec<Task>,
}

/// Available task types in the replay pipeline.
///
/// Each variant embeds the configuration for one processor type. Variant
/// names double as the task keys in flow files.
#[derive(PartialEq, Clone, Debug, Deserialize, Serialize)]
#[allow(non_camel_case_types)]
pub enum Task {
    /// Session trigger task.
    trigger(replay_core::task::trigger::config::Subscriber),
    /// Session gate task.
    arm(replay_core::task::arm::config::Processor),
    /// Temperature filter task.
    filter(replay_core::task::filter::config::Processor),
    /// Replay sequencer task.
    replay(replay_core::task::replay::config::Processor),
    /// Publish task.
    publish(replay_core::task::publish::config::Processor),
    /// Log output task.
    log(replay_core::task::log::config::Processor),
}

impl Task {
    /// Task type name used for event categorization and logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Task::trigger(_) => "trigger",
            Task::arm(_) => "arm",
            Task::filter(_) => "filter",
            Task::replay(_) => "replay",
            Task::publish(_) => "publish",
            Task::log(_) => "log",
        }
    }
}

/// Main application configuration.
#[derive(PartialEq, Clone, Debug, Deserialize, Serialize)]
pub struct AppConfig {
    /// Flow discovery options.
    pub flows: FlowOptions,
    /// Optional capture file backing the replay record store.
    pub records: Option<RecordStoreOptions>,
    /// Optional publish sink configuration.
    pub sink: Option<SinkOptions>,
    /// Optional default retry configuration for all tasks.
    pub retry: Option<replay_core::retry::RetryConfig>,
    /// Event channel buffer size for all flows (defaults to 10000 if not specified).
    pub event_buffer_size: Option<usize>,
}

/// Flow loading configuration.
#[derive(PartialEq, Clone, Debug, Deserialize, Serialize)]
pub struct FlowOptions {
    /// Directory pattern for discovering flow configuration files.
    pub dir: Option<PathBuf>,
}

/// Capture file configuration for the record store.
#[derive(PartialEq, Clone, Debug, Deserialize, Serialize)]
pub struct RecordStoreOptions {
    /// Path to the CSV capture file.
    pub path: PathBuf,
    /// Name of the description column (defaults to "Info").
    pub info_column: Option<String>,
    /// Name of the content column (defaults to "Message").
    pub message_column: Option<String>,
}

/// Sink type for outbound messages.
#[derive(PartialEq, Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkType {
    /// Write published messages to the application log.
    Log,
    /// Hold published messages in memory.
    Memory,
}

/// Publish sink configuration options.
#[derive(PartialEq, Clone, Debug, Deserialize, Serialize)]
pub struct SinkOptions {
    /// Sink backend type.
    #[serde(rename = "type")]
    pub sink_type: SinkType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_config_creation() {
        let flow_config = FlowConfig {
            flow: Flow {
                name: "test_flow".to_string(),
                labels: None,
                tasks: vec![],
            },
        };

        assert_eq!(flow_config.flow.name, "test_flow");
        assert!(flow_config.flow.labels.is_none());
        assert!(flow_config.flow.tasks.is_empty());
    }

    #[test]
    fn test_flow_config_serialization() {
        let mut labels = Map::new();
        labels.insert("environment".to_string(), Value::String("test".to_string()));

        let flow_config = FlowConfig {
            flow: Flow {
                name: "serialize_test".to_string(),
                labels: Some(labels),
                tasks: vec![],
            },
        };

        let serialized = serde_json::to_string(&flow_config).unwrap();
        let deserialized: FlowConfig = serde_json::from_str(&serialized).unwrap();
        assert_eq!(flow_config, deserialized);
    }

    #[test]
    fn test_task_deserialization_from_flow_file() {
        let raw = r#"
        {
            "flow": {
                "name": "replay-session",
                "labels": null,
                "tasks": [
                    {"trigger": {"name": "start", "subject": "control"}},
                    {"arm": {"name": "gate"}},
                    {"replay": {"name": "sequencer", "topic": "challenge/replay"}},
                    {"publish": {"name": "out"}},
                    {"log": {"name": "tap"}}
                ]
            }
        }"#;

        let config: FlowConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.flow.tasks.len(), 5);
        assert_eq!(config.flow.tasks[0].as_str(), "trigger");
        assert_eq!(config.flow.tasks[2].as_str(), "replay");
        match &config.flow.tasks[2] {
            Task::replay(replay) => assert_eq!(replay.topic, "challenge/replay"),
            other => panic!("unexpected task: {other:?}"),
        }
    }

    #[test]
    fn test_sink_type_deserialization() {
        let options: SinkOptions = serde_json::from_str(r#"{"type": "memory"}"#).unwrap();
        assert_eq!(options.sink_type, SinkType::Memory);
    }
}
