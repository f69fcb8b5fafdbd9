//! Session trigger.
//!
//! Emits a single control signal after a configurable delay, then completes.
//! The delay gives downstream tasks time to finish their own initialization
//! before the session opens; the original deployment waited two seconds.

use crate::event::{Event, EventBuilder, EventData, SenderExt};
use std::sync::Arc;
use tokio::sync::broadcast::Sender;
use tracing::error;

/// Errors that can occur during trigger processing.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("Sending event to channel failed with error: {source}")]
    SendMessage {
        #[source]
        source: Box<tokio::sync::broadcast::error::SendError<Event>>,
    },
    #[error("Subscriber event builder failed with error: {source}")]
    EventBuilder {
        #[source]
        source: crate::event::Error,
    },
    #[error("Missing required builder attribute: {}", _0)]
    MissingRequiredAttribute(String),
    #[error("Retries exhausted.")]
    RetryExhausted,
}

/// Emits the configured control signal once.
pub struct EventHandler {
    /// Trigger task configuration settings.
    config: Arc<super::config::Subscriber>,
    /// Channel sender for the control event.
    tx: Sender<Event>,
    /// Task identifier for event tracking.
    task_id: usize,
    /// Task type for event categorization and logging.
    task_type: &'static str,
}

impl EventHandler {
    async fn handle(&self) -> Result<(), Error> {
        tokio::time::sleep(self.config.delay).await;

        let e = EventBuilder::new()
            .data(EventData::Text(self.config.signal.clone()))
            .subject(self.config.subject.clone())
            .task_id(self.task_id)
            .task_type(self.task_type)
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

/// Session trigger task.
#[derive(Debug)]
pub struct Subscriber {
    /// Trigger task configuration.
    config: Arc<super::config::Subscriber>,
    /// Channel sender for the control event.
    tx: Sender<Event>,
    /// Current task identifier.
    task_id: usize,
    /// Task execution context providing shared collaborators.
    task_context: Arc<crate::task::context::TaskContext>,
    /// Task type for event categorization and logging.
    task_type: &'static str,
}

#[async_trait::async_trait]
impl crate::task::runner::Runner for Subscriber {
    type Error = Error;
    type EventHandler = EventHandler;

    async fn init(&self) -> Result<Self::EventHandler, Self::Error> {
        Ok(EventHandler {
            config: Arc::clone(&self.config),
            tx: self.tx.clone(),
            task_id: self.task_id,
            task_type: self.task_type,
        })
    }

    #[tracing::instrument(skip(self), fields(task = %self.config.name, task_id = self.task_id, task_type = %self.task_type))]
    async fn run(self) -> Result<(), Error> {
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

        if let Err(e) = event_handler.handle().await {
            error!("{}", e);
        }
        Ok(())
    }
}

/// Builder for constructing Subscriber instances with validation.
#[derive(Debug, Default)]
pub struct SubscriberBuilder {
    config: Option<Arc<super::config::Subscriber>>,
    tx: Option<Sender<Event>>,
    task_id: usize,
    task_context: Option<Arc<crate::task::context::TaskContext>>,
    task_type: Option<&'static str>,
}

impl SubscriberBuilder {
    pub fn new() -> SubscriberBuilder {
        SubscriberBuilder {
            ..Default::default()
        }
    }

    pub fn config(mut self, config: Arc<super::config::Subscriber>) -> Self {
        self.config = Some(config);
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

    pub async fn build(self) -> Result<Subscriber, Error> {
        Ok(Subscriber {
            config: self
                .config
                .ok_or_else(|| Error::MissingRequiredAttribute("config".to_string()))?,
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::broadcast;

    fn test_config(delay: Duration) -> Arc<super::super::config::Subscriber> {
        Arc::new(super::super::config::Subscriber {
            name: "trigger".to_string(),
            subject: "control".to_string(),
            delay,
            signal: "START".to_string(),
            retry: None,
        })
    }

    #[tokio::test]
    async fn test_emits_signal_after_delay() {
        let (tx, mut rx) = broadcast::channel(10);
        let handler = EventHandler {
            config: test_config(Duration::from_millis(1)),
            tx,
            task_id: 0,
            task_type: "trigger",
        };

        handler.handle().await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.data.as_text(), Some("START"));
        assert_eq!(event.subject, "control");
        assert_eq!(event.task_id, 0);
        // Only one signal per session.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_delay_is_respected() {
        tokio::time::pause();
        let (tx, mut rx) = broadcast::channel(10);
        let handler = EventHandler {
            config: test_config(Duration::from_secs(2)),
            tx,
            task_id: 0,
            task_type: "trigger",
        };

        let task = tokio::spawn(async move { handler.handle().await });
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());

        tokio::time::advance(Duration::from_secs(2)).await;
        task.await.unwrap().unwrap();
        assert!(rx.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_builder_missing_sender() {
        let result = SubscriberBuilder::new()
            .config(test_config(Duration::from_millis(1)))
            .task_type("trigger")
            .build()
            .await;
        assert!(matches!(
            result.unwrap_err(),
            Error::MissingRequiredAttribute(_)
        ));
    }
}
