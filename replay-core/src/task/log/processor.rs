//! Log processor for outputting event data to application logs.

use crate::event::{Event, EventBuilder, EventData, SenderExt};
use std::sync::Arc;
use tokio::sync::broadcast::{Receiver, Sender};
use tracing::{debug, error, info, trace, warn};

/// Default subject prefix for log events.
const DEFAULT_MESSAGE_SUBJECT: &str = "log";

/// Errors that can occur during log processing.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Required builder attribute was not provided.
    #[error("Missing required attribute: {}", _0)]
    MissingRequiredAttribute(String),
    /// Failed to send event through channel.
    #[error("Failed to send event message: {source}")]
    SendMessage {
        #[source]
        source: Box<tokio::sync::broadcast::error::SendError<Event>>,
    },
    /// Event construction failed.
    #[error("Processor event builder failed with error: {source}")]
    EventBuilder {
        #[source]
        source: crate::event::Error,
    },
}

/// Handles individual log operations.
pub struct EventHandler {
    /// Processor configuration settings.
    config: Arc<super::config::Processor>,
    /// Current task identifier for event filtering.
    task_id: usize,
    /// Event sender for passing through logged events.
    tx: Sender<Event>,
    /// Task type for event categorization and logging.
    task_type: &'static str,
}

impl EventHandler {
    /// Processes an event by logging its data and passing it through.
    async fn handle(&self, event: Event) -> Result<(), Error> {
        if Some(event.task_id) != self.task_id.checked_sub(1) {
            return Ok(());
        }

        if self.config.structured {
            // Structured logging mode for Grafana/Loki
            match &event.data {
                EventData::Json(json) => match self.config.level {
                    super::config::LogLevel::Trace => trace!(data = ?json),
                    super::config::LogLevel::Debug => debug!(data = ?json),
                    super::config::LogLevel::Info => info!(data = ?json),
                    super::config::LogLevel::Warn => warn!(data = ?json),
                    super::config::LogLevel::Error => error!(data = ?json),
                },
                EventData::Text(text) => match self.config.level {
                    super::config::LogLevel::Trace => trace!(data = %text),
                    super::config::LogLevel::Debug => debug!(data = %text),
                    super::config::LogLevel::Info => info!(data = %text),
                    super::config::LogLevel::Warn => warn!(data = %text),
                    super::config::LogLevel::Error => error!(data = %text),
                },
            }
        } else {
            // Pretty-printed mode for console readability
            let log_message = match &event.data {
                EventData::Json(json) => format!(
                    "\n{}",
                    serde_json::to_string_pretty(json).unwrap_or_else(|_| format!("{json:?}"))
                ),
                // Raw-spliced envelopes may not parse; print them verbatim
                // when they don't.
                EventData::Text(text) => match serde_json::from_str::<serde_json::Value>(text) {
                    Ok(parsed) => format!(
                        "\n{}",
                        serde_json::to_string_pretty(&parsed).unwrap_or_else(|_| text.clone())
                    ),
                    Err(_) => text.clone(),
                },
            };

            match self.config.level {
                super::config::LogLevel::Trace => trace!("{}", log_message),
                super::config::LogLevel::Debug => debug!("{}", log_message),
                super::config::LogLevel::Info => info!("{}", log_message),
                super::config::LogLevel::Warn => warn!("{}", log_message),
                super::config::LogLevel::Error => error!("{}", log_message),
            }
        }

        // Pass the event through to the next task
        let e = EventBuilder::new()
            .data(event.data)
            .subject(event.subject)
            .task_id(self.task_id)
            .task_type(self.task_type)
            .time(event.timestamp)
            .build()
            .map_err(|source| Error::EventBuilder { source })?;
        self.tx
            .send_with_logging(e)
            .map_err(|source| Error::SendMessage {
                source: Box::new(source),
            })?;

        Ok(())
    }
}

/// Log processor that outputs event data to logs.
#[derive(Debug)]
pub struct Processor {
    /// Log task configuration.
    config: Arc<super::config::Processor>,
    /// Channel sender for passing through events.
    tx: Sender<Event>,
    /// Channel receiver for incoming events to log.
    rx: Receiver<Event>,
    /// Current task identifier for event filtering.
    task_id: usize,
    /// Task type for event categorization and logging.
    task_type: &'static str,
}

#[async_trait::async_trait]
impl crate::task::runner::Runner for Processor {
    type Error = Error;
    type EventHandler = EventHandler;

    /// Initializes the processor.
    async fn init(&self) -> Result<Self::EventHandler, Self::Error> {
        let event_handler = EventHandler {
            config: Arc::clone(&self.config),
            task_id: self.task_id,
            tx: self.tx.clone(),
            task_type: self.task_type,
        };

        Ok(event_handler)
    }

    #[tracing::instrument(skip(self), name = DEFAULT_MESSAGE_SUBJECT, fields(task = %self.config.name, task_id = self.task_id))]
    async fn run(mut self) -> Result<(), Error> {
        let event_handler = match self.init().await {
            Ok(handler) => handler,
            Err(e) => {
                error!("{}", e);
                return Ok(());
            }
        };

        loop {
            match self.rx.recv().await {
                Ok(event) => {
                    if let Err(err) = event_handler.handle(event).await {
                        error!("{}", err);
                    }
                }
                Err(_) => return Ok(()),
            }
        }
    }
}

/// Builder for constructing Processor instances with validation.
#[derive(Debug, Default)]
pub struct ProcessorBuilder {
    /// Processor configuration (required for build).
    config: Option<Arc<super::config::Processor>>,
    /// Event broadcast sender (required for build).
    tx: Option<Sender<Event>>,
    /// Event broadcast receiver (required for build).
    rx: Option<Receiver<Event>>,
    /// Current task identifier for event filtering.
    task_id: usize,
    /// Task type for event categorization and logging.
    task_type: Option<&'static str>,
}

impl ProcessorBuilder {
    pub fn new() -> ProcessorBuilder {
        ProcessorBuilder {
            ..Default::default()
        }
    }

    pub fn config(mut self, config: Arc<super::config::Processor>) -> Self {
        self.config = Some(config);
        self
    }

    pub fn receiver(mut self, receiver: Receiver<Event>) -> Self {
        self.rx = Some(receiver);
        self
    }

    pub fn sender(mut self, sender: Sender<Event>) -> Self {
        self.tx = Some(sender);
        self
    }

    pub fn task_id(mut self, task_id: usize) -> Self {
        self.task_id = task_id;
        self
    }

    pub fn task_type(mut self, task_type: &'static str) -> Self {
        self.task_type = Some(task_type);
        self
    }

    pub async fn build(self) -> Result<Processor, Error> {
        Ok(Processor {
            config: self
                .config
                .ok_or_else(|| Error::MissingRequiredAttribute("config".to_string()))?,
            rx: self
                .rx
                .ok_or_else(|| Error::MissingRequiredAttribute("receiver".to_string()))?,
            tx: self
                .tx
                .ok_or_else(|| Error::MissingRequiredAttribute("sender".to_string()))?,
            task_id: self.task_id,
            task_type: self
                .task_type
                .ok_or_else(|| Error::MissingRequiredAttribute("task_type".to_string()))?,
        })
    }
}
