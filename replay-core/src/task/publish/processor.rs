//! Publish task.
//!
//! Hands inbound events to the flow's publish sink. Delivery is fire and
//! forget: a rejected publish is logged and dropped, never retried and never
//! fatal to the flow.

use crate::event::{Event, EventBuilder, SenderExt};
use crate::sink::PublishSink;
use std::sync::Arc;
use tokio::sync::broadcast::{Receiver, Sender};
use tracing::{error, warn};

/// Errors that can occur during publish processing.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("Sending event to channel failed with error: {source}")]
    SendMessage {
        #[source]
        source: Box<tokio::sync::broadcast::error::SendError<Event>>,
    },
    #[error("Processor event builder failed with error: {source}")]
    EventBuilder {
        #[source]
        source: crate::event::Error,
    },
    #[error("Payload serialization failed with error: {source}")]
    Payload {
        #[source]
        source: crate::event::Error,
    },
    #[error("Missing required builder attribute: {}", _0)]
    MissingRequiredAttribute(String),
    #[error("No publish sink configured for this flow")]
    MissingSink,
    #[error("Retries exhausted.")]
    RetryExhausted,
}

/// Handles delivery of individual events.
#[derive(Debug)]
pub struct EventHandler {
    /// Publish task configuration settings.
    config: Arc<super::config::Processor>,
    /// Channel sender for forwarded events.
    tx: Sender<Event>,
    /// Task identifier for event tracking.
    task_id: usize,
    /// Task type for event categorization and logging.
    task_type: &'static str,
    /// Outbound sink for this flow.
    sink: Arc<dyn PublishSink>,
}

impl EventHandler {
    async fn handle(&self, event: Event) -> Result<(), Error> {
        if Some(event.task_id) != self.task_id.checked_sub(1) {
            return Ok(());
        }

        let topic = self
            .config
            .topic
            .as_deref()
            .unwrap_or(event.subject.as_str());
        let payload = event
            .data
            .to_bytes()
            .map_err(|source| Error::Payload { source })?;

        if let Err(e) = self.sink.publish(topic, payload).await {
            warn!("Dropping undeliverable message: {}", e);
            return Ok(());
        }

        if self.config.forward {
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
        }
        Ok(())
    }
}

/// Publish task.
#[derive(Debug)]
pub struct Processor {
    /// Publish task configuration.
    config: Arc<super::config::Processor>,
    /// Channel sender for forwarded events.
    tx: Sender<Event>,
    /// Channel receiver for incoming events.
    rx: Receiver<Event>,
    /// Current task identifier for event filtering.
    task_id: usize,
    /// Task execution context providing shared collaborators.
    task_context: Arc<crate::task::context::TaskContext>,
    /// Task type for event categorization and logging.
    task_type: &'static str,
}

#[async_trait::async_trait]
impl crate::task::runner::Runner for Processor {
    type Error = Error;
    type EventHandler = EventHandler;

    async fn init(&self) -> Result<Self::EventHandler, Self::Error> {
        let sink = self
            .task_context
            .sink
            .as_ref()
            .ok_or(Error::MissingSink)?;
        Ok(EventHandler {
            config: Arc::clone(&self.config),
            tx: self.tx.clone(),
            task_id: self.task_id,
            task_type: self.task_type,
            sink: Arc::clone(sink),
        })
    }

    #[tracing::instrument(skip(self), fields(task = %self.config.name, task_id = self.task_id, task_type = %self.task_type))]
    async fn run(mut self) -> Result<(), Error> {
        let retry_config =
            crate::retry::RetryConfig::merge(&self.task_context.retry, &self.config.retry);

        let event_handler = match tokio_retry::Retry::spawn(retry_config.strategy(), || async {
            match self.init().await {
                Ok(handler) => Ok(handler),
                Err(e) => {
                    error!("{}", e);
                    Err(Error::RetryExhausted)
                }
            }
        })
        .await
        {
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
    config: Option<Arc<super::config::Processor>>,
    tx: Option<Sender<Event>>,
    rx: Option<Receiver<Event>>,
    task_id: usize,
    task_context: Option<Arc<crate::task::context::TaskContext>>,
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

    pub fn task_context(mut self, task_context: Arc<crate::task::context::TaskContext>) -> Self {
        self.task_context = Some(task_context);
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
            task_context: self
                .task_context
                .ok_or_else(|| Error::MissingRequiredAttribute("task_context".to_string()))?,
            task_type: self
                .task_type
                .ok_or_else(|| Error::MissingRequiredAttribute("task_type".to_string()))?,
        })
    }
}
