//! Replay sequencer processor.
//!
//! For each inbound event carrying an identifier, looks up the matching
//! record in the capture table and republishes its content fragments as
//! timestamped envelopes. After a configured number of invocations the
//! sequencer emits a single terminal signal and goes permanently idle for
//! the session.

use crate::envelope::{Envelope, EnvelopeFormat, END_PAYLOAD};
use crate::event::{Event, EventBuilder, EventData, SenderExt};
use crate::fragment::split_fragments;
use crate::session::{Phase, SessionState};
use crate::store::RecordStore;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast::{Receiver, Sender};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Leading marker identifying records whose fragments should be republished.
pub const PUBLISH_MARKER: &str = "Publish Message";

/// Separator between sub-descriptions in a record's info field.
const SUBDESCRIPTION_SEPARATOR: &str = ", ";

/// Errors that can occur during replay processing.
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
    /// The inbound payload carried no usable integer 'id' field.
    #[error("Inbound payload has no usable 'id' field")]
    InvalidIdentifier,
    /// The computed index points at no record.
    #[error("No record found at index {index}")]
    RecordNotFound { index: usize },
    #[error("No record store configured for this flow")]
    MissingRecordStore,
    #[error(transparent)]
    Config(#[from] super::config::ConfigError),
    #[error("Missing required builder attribute: {}", _0)]
    MissingRequiredAttribute(String),
    #[error("Task failed after all retry attempts: {source}")]
    RetryExhausted {
        #[source]
        source: Box<Error>,
    },
}

/// Maps an inbound identifier onto the record table.
///
/// Total over all of `i64`, including negative identifiers; the result is
/// always in `[0, table_size)`. `table_size` must be validated as nonzero
/// and representable as `i64` (see config validation).
pub fn record_index(id: i64, offset: i64, table_size: u64) -> usize {
    id.wrapping_add(offset).rem_euclid(table_size as i64) as usize
}

/// Extracts the integer identifier from an inbound payload.
fn extract_identifier(data: &EventData) -> Option<i64> {
    match data {
        EventData::Json(value) => value.get("id")?.as_i64(),
        EventData::Text(text) => serde_json::from_str::<Value>(text)
            .ok()?
            .get("id")?
            .as_i64(),
    }
}

/// An inbound payload with no content does not count as an invocation.
fn payload_is_empty(data: &EventData) -> bool {
    match data {
        EventData::Text(text) => text.is_empty(),
        EventData::Json(Value::Null) => true,
        EventData::Json(Value::String(text)) => text.is_empty(),
        EventData::Json(_) => false,
    }
}

/// Handles individual replay invocations.
#[derive(Debug)]
pub struct EventHandler {
    /// Replay sequencer configuration settings.
    config: Arc<super::config::Processor>,
    /// Channel sender for produced envelopes.
    tx: Sender<Event>,
    /// Task identifier for event tracking.
    task_id: usize,
    /// Task type for event categorization and logging.
    task_type: &'static str,
    /// Capture table for record lookups.
    records: Arc<dyn RecordStore>,
    /// Shared session state for this flow.
    session: Arc<Mutex<SessionState>>,
}

impl EventHandler {
    /// Processes one inbound event as a single replay invocation.
    ///
    /// The session lock is held for the whole invocation: the counter update
    /// and the envelope batch are one critical section, and all envelopes of
    /// one invocation reach the channel together, in fragment order.
    async fn handle(&self, event: Event) -> Result<(), Error> {
        if Some(event.task_id) != self.task_id.checked_sub(1) {
            return Ok(());
        }

        if payload_is_empty(&event.data) {
            debug!("Empty inbound payload, ignoring");
            return Ok(());
        }

        let mut session = self.session.lock().await;
        match session.phase(self.config.bound) {
            Phase::Idle => {
                debug!("Session not armed, ignoring event");
                Ok(())
            }
            Phase::Done => {
                debug!("Replay already terminated, ignoring event");
                Ok(())
            }
            Phase::Terminating => {
                // Counted past the bound so this branch can never re-enter.
                session.invocations += 1;
                info!(
                    "Replay bound of {} reached, emitting terminal signal",
                    self.config.bound
                );
                let e = EventBuilder::new()
                    .data(EventData::Text(END_PAYLOAD.to_string()))
                    .subject(self.config.topic.clone())
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
            Phase::Replaying => {
                session.invocations += 1;

                let id = extract_identifier(&event.data).ok_or(Error::InvalidIdentifier)?;
                let index = record_index(id, self.config.offset, self.config.table_size);
                let record = self
                    .records
                    .get(index)
                    .ok_or(Error::RecordNotFound { index })?;

                if !record.info.starts_with(PUBLISH_MARKER) {
                    debug!("Record at index {} is not a publish record", index);
                    return Ok(());
                }

                let subdescriptions = record.info.split(SUBDESCRIPTION_SEPARATOR).count();
                let fragments = split_fragments(record.message.as_deref().unwrap_or(""));

                for position in 0..subdescriptions {
                    let envelope = Envelope::new(id, fragments.get(position).cloned());
                    let data = match self.config.format {
                        EnvelopeFormat::Raw => {
                            EventData::Text(envelope.to_wire(EnvelopeFormat::Raw))
                        }
                        EnvelopeFormat::Structured => EventData::Json(envelope.to_structured()),
                    };
                    let e = EventBuilder::new()
                        .data(data)
                        .subject(self.config.topic.clone())
                        .task_id(self.task_id)
                        .task_type(self.task_type)
                        .id(id.to_string())
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
    }
}

/// Replay sequencer task.
#[derive(Debug)]
pub struct Processor {
    /// Replay task configuration.
    config: Arc<super::config::Processor>,
    /// Channel sender for produced envelopes.
    tx: Sender<Event>,
    /// Channel receiver for inbound events.
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

    /// Validates the configuration and binds the shared collaborators.
    async fn init(&self) -> Result<Self::EventHandler, Self::Error> {
        self.config.validate()?;

        let records = self
            .task_context
            .records
            .as_ref()
            .map(Arc::clone)
            .ok_or(Error::MissingRecordStore)?;

        Ok(EventHandler {
            config: Arc::clone(&self.config),
            tx: self.tx.clone(),
            task_id: self.task_id,
            task_type: self.task_type,
            records,
            session: Arc::clone(&self.task_context.session),
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
                    Err(e)
                }
            }
        })
        .await
        {
            Ok(handler) => handler,
            Err(e) => {
                error!(
                    "{}",
                    Error::RetryExhausted {
                        source: Box::new(e)
                    }
                );
                return Ok(());
            }
        };

        // Invocations must not interleave: events are handled inline rather
        // than spawned, so one invocation runs to completion before the next
        // is considered. A degraded invocation is logged, never fatal.
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
    /// Replay task configuration (required for build).
    config: Option<Arc<super::config::Processor>>,
    /// Event broadcast sender (required for build).
    tx: Option<Sender<Event>>,
    /// Event broadcast receiver (required for build).
    rx: Option<Receiver<Event>>,
    /// Current task identifier for event filtering.
    task_id: usize,
    /// Task execution context providing shared collaborators.
    task_context: Option<Arc<crate::task::context::TaskContext>>,
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
