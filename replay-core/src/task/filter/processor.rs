//! Temperature filter.
//!
//! Inspects the nested `payload` object of inbound messages. Readings in the
//! configured unit are counted in the session state and forwarded together
//! with a derived event carrying the upper bound of the reading's range.
//! Everything else is dropped.

use crate::event::{Event, EventBuilder, EventData, SenderExt};
use crate::session::SessionState;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast::{Receiver, Sender};
use tokio::sync::Mutex;
use tracing::{debug, error};

/// Errors that can occur during filter processing.
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
    #[error("Missing required builder attribute: {}", _0)]
    MissingRequiredAttribute(String),
}

/// Handles individual reading checks.
pub struct EventHandler {
    /// Filter task configuration settings.
    config: Arc<super::config::Processor>,
    /// Channel sender for forwarded and derived events.
    tx: Sender<Event>,
    /// Task identifier for event tracking.
    task_id: usize,
    /// Task type for event categorization and logging.
    task_type: &'static str,
    /// Shared session state for this flow.
    session: Arc<Mutex<SessionState>>,
}

/// Extracts the nested `payload` object from an inbound message.
///
/// Text payloads are parsed as JSON first; messages without a nested
/// `payload` object yield `None`.
fn nested_payload(data: &EventData) -> Option<Value> {
    let value = match data {
        EventData::Json(value) => value.clone(),
        EventData::Text(text) => serde_json::from_str(text).ok()?,
    };
    value.get("payload").cloned()
}

impl EventHandler {
    async fn handle(&self, event: Event) -> Result<(), Error> {
        if Some(event.task_id) != self.task_id.checked_sub(1) {
            return Ok(());
        }

        let Some(payload) = nested_payload(&event.data) else {
            debug!("Dropping event without nested payload");
            return Ok(());
        };

        if payload.get("unit").and_then(Value::as_str) != Some(self.config.unit.as_str()) {
            debug!("Dropping reading with non-matching unit");
            return Ok(());
        }

        self.session.lock().await.temperatures_received += 1;

        let upper_bound = payload
            .get("range")
            .and_then(Value::as_array)
            .and_then(|range| range.get(1))
            .cloned()
            .unwrap_or(Value::Null);

        let forwarded = EventBuilder::new()
            .data(event.data)
            .subject(event.subject.clone())
            .task_id(self.task_id)
            .task_type(self.task_type)
            .time(event.timestamp)
            .build()
            .map_err(|source| Error::EventBuilder { source })?;

        let derived_subject = self
            .config
            .derived_subject
            .clone()
            .unwrap_or(event.subject);
        let derived = EventBuilder::new()
            .data(EventData::Json(upper_bound))
            .subject(derived_subject)
            .task_id(self.task_id)
            .task_type(self.task_type)
            .build()
            .map_err(|source| Error::EventBuilder { source })?;

        self.tx
            .send_with_logging(forwarded)
            .map_err(|source| Error::SendMessage {
                source: Box::new(source),
            })?;
        self.tx
            .send_with_logging(derived)
            .map_err(|source| Error::SendMessage {
                source: Box::new(source),
            })?;
        Ok(())
    }
}

/// Temperature filter task.
#[derive(Debug)]
pub struct Processor {
    /// Filter task configuration.
    config: Arc<super::config::Processor>,
    /// Channel sender for forwarded and derived events.
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
        Ok(EventHandler {
            config: Arc::clone(&self.config),
            tx: self.tx.clone(),
            task_id: self.task_id,
            task_type: self.task_type,
            session: Arc::clone(&self.task_context.session),
        })
    }

    #[tracing::instrument(skip(self), fields(task = %self.config.name, task_id = self.task_id, task_type = %self.task_type))]
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::broadcast;

    fn handler(session: Arc<Mutex<SessionState>>, tx: Sender<Event>) -> EventHandler {
        EventHandler {
            config: Arc::new(super::super::config::Processor {
                name: "filter".to_string(),
                unit: "C".to_string(),
                derived_subject: None,
                retry: None,
            }),
            tx,
            task_id: 2,
            task_type: "filter",
            session,
        }
    }

    fn reading(data: EventData) -> Event {
        Event {
            data,
            subject: "readings".to_string(),
            task_id: 1,
            task_type: "test",
            id: None,
            timestamp: 123456789,
        }
    }

    #[tokio::test]
    async fn test_celsius_reading_counted_and_forwarded() {
        let session = Arc::new(Mutex::new(SessionState::new()));
        let (tx, mut rx) = broadcast::channel(100);
        let handler = handler(session.clone(), tx);

        let data = EventData::Json(json!({
            "payload": {"unit": "C", "range": [10, 35]}
        }));
        handler.handle(reading(data.clone())).await.unwrap();

        assert_eq!(session.lock().await.temperatures_received, 1);

        let forwarded = rx.recv().await.unwrap();
        assert_eq!(forwarded.data, data);
        assert_eq!(forwarded.task_id, 2);

        let derived = rx.recv().await.unwrap();
        assert_eq!(derived.data, EventData::Json(json!(35)));
        assert_eq!(derived.subject, "readings");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_textual_reading_parsed() {
        let session = Arc::new(Mutex::new(SessionState::new()));
        let (tx, mut rx) = broadcast::channel(100);
        let handler = handler(session.clone(), tx);

        let data = EventData::Text(r#"{"payload": {"unit": "C", "range": [0, 21]}}"#.to_string());
        handler.handle(reading(data)).await.unwrap();

        assert_eq!(session.lock().await.temperatures_received, 1);
        let _forwarded = rx.recv().await.unwrap();
        let derived = rx.recv().await.unwrap();
        assert_eq!(derived.data, EventData::Json(json!(21)));
    }

    #[tokio::test]
    async fn test_non_celsius_reading_dropped() {
        let session = Arc::new(Mutex::new(SessionState::new()));
        let (tx, mut rx) = broadcast::channel(100);
        let handler = handler(session.clone(), tx);

        let data = EventData::Json(json!({
            "payload": {"unit": "F", "range": [50, 95]}
        }));
        handler.handle(reading(data)).await.unwrap();

        assert_eq!(session.lock().await.temperatures_received, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_event_without_nested_payload_dropped() {
        let session = Arc::new(Mutex::new(SessionState::new()));
        let (tx, mut rx) = broadcast::channel(100);
        let handler = handler(session.clone(), tx);

        handler
            .handle(reading(EventData::Text("not json".to_string())))
            .await
            .unwrap();
        handler
            .handle(reading(EventData::Json(json!({"other": 1}))))
            .await
            .unwrap();

        assert_eq!(session.lock().await.temperatures_received, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_missing_range_yields_null_derived_event() {
        let session = Arc::new(Mutex::new(SessionState::new()));
        let (tx, mut rx) = broadcast::channel(100);
        let handler = handler(session.clone(), tx);

        let data = EventData::Json(json!({"payload": {"unit": "C"}}));
        handler.handle(reading(data)).await.unwrap();

        assert_eq!(session.lock().await.temperatures_received, 1);
        let _forwarded = rx.recv().await.unwrap();
        let derived = rx.recv().await.unwrap();
        assert_eq!(derived.data, EventData::Json(Value::Null));
    }
}
