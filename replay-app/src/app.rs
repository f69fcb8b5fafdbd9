//! Application startup: flow discovery, shared collaborators, and execution.

use crate::config::{AppConfig, FlowConfig, SinkType};
use config::Config;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Errors that can occur during application execution.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Invalid glob pattern provided for flow discovery.
    #[error("Invalid glob pattern: {source}")]
    Pattern {
        #[source]
        source: glob::PatternError,
    },
    /// Configuration parsing or deserialization error.
    #[error("Failed to parse configuration: {source}")]
    Config {
        #[source]
        source: config::ConfigError,
    },
    /// Flow directory path is invalid or cannot be converted to string.
    #[error("Invalid path")]
    InvalidPath,
    /// Record store could not be loaded.
    #[error(transparent)]
    Store(#[from] replay_core::store::Error),
}

/// Main application that loads and runs flows concurrently.
pub struct App {
    /// Global application configuration.
    pub config: AppConfig,
}

impl App {
    /// Loads the application configuration from a file, with environment
    /// variable overrides under the `REPLAY` prefix.
    pub fn from_config_path(path: &str) -> Result<App, Error> {
        let config = Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix(crate::config::ENV_PREFIX).separator("__"))
            .build()
            .map_err(|source| Error::Config { source })?
            .try_deserialize::<AppConfig>()
            .map_err(|source| Error::Config { source })?;

        Ok(App { config })
    }

    /// Discovers flow configuration files, builds shared collaborators, and
    /// runs all flows concurrently until they complete.
    #[tracing::instrument(skip(self), name = "app")]
    pub async fn start(self) -> Result<(), Error> {
        let app_config = Arc::new(self.config);

        let glob_pattern = app_config
            .flows
            .dir
            .as_ref()
            .and_then(|path| path.to_str())
            .ok_or(Error::InvalidPath)?;

        let flow_configs: Vec<FlowConfig> = glob::glob(glob_pattern)
            .map_err(|e| Error::Pattern { source: e })?
            .filter_map(|path| {
                match path {
                    Ok(path) => {
                        info!("Loading flow: {:?}", path);
                        let contents = match std::fs::read_to_string(&path) {
                            Ok(c) => c,
                            Err(e) => {
                                error!("Failed to read flow file {:?}: {}. Skipping this flow.", path, e);
                                return None;
                            }
                        };

                        // Determine file format from extension.
                        let file_format = match path.extension().and_then(|s| s.to_str()) {
                            Some("yaml") | Some("yml") => config::FileFormat::Yaml,
                            Some("json") => config::FileFormat::Json,
                            _ => config::FileFormat::Json,
                        };

                        let config = match Config::builder()
                            .add_source(config::File::from_str(&contents, file_format))
                            .build()
                        {
                            Ok(c) => c,
                            Err(e) => {
                                error!("Failed to parse flow config {:?}: {}. Skipping this flow.", path, e);
                                return None;
                            }
                        };

                        match config.try_deserialize::<FlowConfig>() {
                            Ok(flow_config) => Some(flow_config),
                            Err(e) => {
                                error!("Failed to deserialize flow config {:?}: {}. Skipping this flow.", path, e);
                                None
                            }
                        }
                    }
                    Err(e) => {
                        error!("Failed to read flow path: {}. Skipping.", e);
                        None
                    }
                }
            })
            .collect();

        // Load the shared record store if a capture file is configured.
        let records: Option<Arc<dyn replay_core::store::RecordStore>> =
            match &app_config.records {
                Some(options) => {
                    let mut builder = replay_core::store::CsvRecordStoreBuilder::new()
                        .path(options.path.clone());
                    if let Some(ref name) = options.info_column {
                        builder = builder.info_column(name.clone());
                    }
                    if let Some(ref name) = options.message_column {
                        builder = builder.message_column(name.clone());
                    }
                    Some(Arc::new(builder.build()?))
                }
                None => None,
            };

        // Create the shared publish sink. Flows without one fall back to the
        // log sink so publish tasks stay operational.
        let sink: Arc<dyn replay_core::sink::PublishSink> = match &app_config.sink {
            Some(options) => match options.sink_type {
                SinkType::Log => Arc::new(replay_core::sink::LogSink::new()),
                SinkType::Memory => Arc::new(replay_core::sink::MemorySink::new()),
            },
            None => {
                warn!("No sink configured; published messages go to the application log.");
                Arc::new(replay_core::sink::LogSink::new())
            }
        };

        // Build all flows from configuration files.
        let mut flows: Vec<super::flow::Flow> = Vec::new();
        for config in flow_configs {
            let mut flow_builder = super::flow::FlowBuilder::new()
                .config(Arc::new(config))
                .records(records.clone())
                .sink(Some(Arc::clone(&sink)))
                .retry(app_config.retry.clone());

            if let Some(buffer_size) = app_config.event_buffer_size {
                flow_builder = flow_builder.event_buffer_size(buffer_size);
            }

            match flow_builder.build() {
                Ok(flow) => flows.push(flow),
                Err(e) => {
                    error!("Flow build failed: {}", e);
                    continue;
                }
            };
        }

        // Initialize flow setup.
        for flow in &mut flows {
            if let Err(e) = flow.init() {
                error!("Flow initialization failed for {}: {}", flow.name(), e);
            }
        }

        // Start all background flow tasks and wait for them to complete.
        let mut background_handles = Vec::new();
        for flow in flows {
            background_handles.push(flow.run());
        }

        let results = futures::future::join_all(background_handles).await;
        for result in results {
            if let Err(e) = result {
                error!("Background task panicked: {}", e);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlowOptions;

    #[test]
    fn test_start_requires_flow_dir() {
        let app = App {
            config: AppConfig {
                flows: FlowOptions { dir: None },
                records: None,
                sink: None,
                retry: None,
                event_buffer_size: None,
            },
        };

        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let result = runtime.block_on(app.start());
        assert!(matches!(result.unwrap_err(), Error::InvalidPath));
    }

    #[tokio::test]
    async fn test_start_with_empty_flow_dir() {
        let dir = std::env::temp_dir().join("replay-app-test-empty");
        std::fs::create_dir_all(&dir).unwrap();
        let pattern = dir.join("*.yaml");

        let app = App {
            config: AppConfig {
                flows: FlowOptions {
                    dir: Some(pattern),
                },
                records: None,
                sink: None,
                retry: None,
                event_buffer_size: None,
            },
        };

        // No flows discovered, nothing to run.
        app.start().await.unwrap();
    }
}
