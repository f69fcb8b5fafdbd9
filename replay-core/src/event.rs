//! Event structures for routing data between pipeline tasks.
//!
//! Events carry either structured JSON or raw text payloads. Raw text covers
//! the control signals ("START"/"END") and legacy wire-spliced envelopes that
//! are not guaranteed to be valid JSON.

use bytes::Bytes;
use chrono::Utc;
use serde_json::Value;
use tracing::info;

/// Default log message format for event processing.
pub const DEFAULT_LOG_MESSAGE: &str = "Event processed";

/// Errors that can occur during event construction and conversion.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Required builder attribute was not provided.
    #[error("Missing required attribute: {}", _0)]
    MissingRequiredAttribute(String),
    /// JSON serialization failed.
    #[error("JSON serialization failed: {source}")]
    SerdeJson {
        #[source]
        source: serde_json::Error,
    },
}

/// Extension trait for broadcast sender with automatic event logging.
pub trait SenderExt {
    /// Sends an event and automatically logs it.
    fn send_with_logging(
        &self,
        event: Event,
    ) -> Result<usize, tokio::sync::broadcast::error::SendError<Event>>;
}

impl SenderExt for tokio::sync::broadcast::Sender<Event> {
    fn send_with_logging(
        &self,
        event: Event,
    ) -> Result<usize, tokio::sync::broadcast::error::SendError<Event>> {
        let subject = event.subject.clone();
        let result = self.send(event)?;
        info!("{}: {}", DEFAULT_LOG_MESSAGE, subject);
        Ok(result)
    }
}

/// Event payload in one of the supported representations.
#[derive(Debug, Clone, PartialEq)]
pub enum EventData {
    /// Structured JSON data.
    Json(Value),
    /// Raw text passed through without parsing.
    Text(String),
}

impl EventData {
    /// Returns the payload as a string slice when it is textual.
    ///
    /// Covers both `Text` payloads and JSON string values, so control
    /// signals are recognized regardless of how an upstream task encoded
    /// them.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            EventData::Text(s) => Some(s),
            EventData::Json(Value::String(s)) => Some(s),
            EventData::Json(_) => None,
        }
    }

    /// Serializes the payload for handoff to a publish sink.
    pub fn to_bytes(&self) -> Result<Bytes, Error> {
        match self {
            EventData::Json(value) => {
                let buf = serde_json::to_vec(value).map_err(|e| Error::SerdeJson { source: e })?;
                Ok(Bytes::from(buf))
            }
            EventData::Text(s) => Ok(Bytes::copy_from_slice(s.as_bytes())),
        }
    }
}

/// Core event structure containing data and metadata for pipeline routing.
#[derive(Debug, Clone)]
pub struct Event {
    /// Event payload.
    pub data: EventData,
    /// Subject identifier for routing; doubles as the outbound topic for
    /// publish tasks.
    pub subject: String,
    /// Identifier of the task that emitted this event.
    pub task_id: usize,
    /// Task type of the emitting task, for logging.
    pub task_type: &'static str,
    /// Optional unique identifier for the event.
    pub id: Option<String>,
    /// Event creation timestamp in microseconds since Unix epoch.
    pub timestamp: i64,
}

/// Builder for constructing Event instances with validation.
#[derive(Default, Debug)]
pub struct EventBuilder {
    /// Event payload (required for build).
    pub data: Option<EventData>,
    /// Event subject for routing (required for build).
    pub subject: Option<String>,
    /// Identifier of the emitting task.
    pub task_id: usize,
    /// Task type of the emitting task.
    pub task_type: Option<&'static str>,
    /// Optional unique event identifier.
    pub id: Option<String>,
    /// Event timestamp, defaults to current time.
    pub timestamp: i64,
}

impl EventBuilder {
    pub fn new() -> Self {
        EventBuilder {
            timestamp: Utc::now().timestamp_micros(),
            ..Default::default()
        }
    }

    pub fn data(mut self, data: EventData) -> Self {
        self.data = Some(data);
        self
    }

    pub fn subject(mut self, subject: String) -> Self {
        self.subject = Some(subject);
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

    pub fn id(mut self, id: String) -> Self {
        self.id = Some(id);
        self
    }

    pub fn time(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn build(self) -> Result<Event, Error> {
        Ok(Event {
            data: self
                .data
                .ok_or_else(|| Error::MissingRequiredAttribute("data".to_string()))?,
            subject: self
                .subject
                .ok_or_else(|| Error::MissingRequiredAttribute("subject".to_string()))?,
            task_id: self.task_id,
            task_type: self.task_type.unwrap_or(""),
            id: self.id,
            timestamp: self.timestamp,
        })
    }
}
