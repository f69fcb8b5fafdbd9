//! Session gate processor.
//!
//! Watches the event stream for the control payloads that open and close a
//! replay session. Control signals are consumed here; everything else passes
//! through to the next task untouched. Arming resets the invocation counter,
//! which keeps the sequencer itself free of backward counter movement.

use crate::event::{Event, EventBuilder, SenderExt};
use crate::session::SessionState;
use std::sync::Arc;
use tokio::sync::broadcast::{Receiver, Sender};
use tokio::sync::Mutex;
use tracing::{error, info};

/// Errors that can occur during arm processing.
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

/// Handles individual control-signal checks.
pub struct EventHandler {
    /// Arm task configuration settings.
    config: Arc<super::config::Processor>,
    /// Channel sender for passed-through events.
    tx: Sender<Event>,
    /// Task identifier for event tracking.
    task_id: usize,
    /// Task type for event categorization and logging.
    task_type: &'static str,
    /// Shared session state for this flow.
    session: Arc<Mutex<SessionState>>,
}

impl EventHandler {
    /// Applies control signals to the session; forwards everything else.
    async fn handle(&self, event: Event) -> Result<(), Error> {
        if Some(event.task_id) != self.task_id.checked_sub(1) {
            return Ok(());
        }

        if let Some(text) = event.data.as_text() {
            if text == self.config.arm_signal {
                self.session.lock().await.arm();
                info!("Session armed");
                return Ok(());
            }
            if text == self.config.disarm_signal {
                self.session.lock().await.disarm();
                info!("Session disarmed");
                return Ok(());
            }
        }

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

/// Session gate task.
#[derive(Debug)]
pub struct Processor {
    /// Arm task configuration.
    config: Arc<super::config::Processor>,
    /// Channel sender for passed-through events.
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

        // Handled inline: arming must be visible to the sequencer before the
        // next event is considered.
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
    use crate::event::EventData;
    use serde_json::json;
    use tokio::sync::broadcast;

    fn test_config() -> Arc<super::super::config::Processor> {
        Arc::new(super::super::config::Processor {
            name: "arm".to_string(),
            arm_signal: "START".to_string(),
            disarm_signal: "END".to_string(),
            retry: None,
        })
    }

    fn handler(
        session: Arc<Mutex<SessionState>>,
        tx: Sender<Event>,
    ) -> EventHandler {
        EventHandler {
            config: test_config(),
            tx,
            task_id: 1,
            task_type: "arm",
            session,
        }
    }

    fn control(text: &str) -> Event {
        Event {
            data: EventData::Text(text.to_string()),
            subject: "control".to_string(),
            task_id: 0,
            task_type: "test",
            id: None,
            timestamp: 123456789,
        }
    }

    #[tokio::test]
    async fn test_arm_signal_arms_and_resets() {
        let session = Arc::new(Mutex::new(SessionState {
            armed: false,
            invocations: 50,
            temperatures_received: 0,
        }));
        let (tx, mut rx) = broadcast::channel(100);
        let handler = handler(session.clone(), tx);

        handler.handle(control("START")).await.unwrap();

        let state = session.lock().await;
        assert!(state.armed);
        assert_eq!(state.invocations, 0);
        // Control signals are consumed, not forwarded.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_disarm_signal_disarms() {
        let session = Arc::new(Mutex::new(SessionState {
            armed: true,
            invocations: 7,
            temperatures_received: 0,
        }));
        let (tx, mut rx) = broadcast::channel(100);
        let handler = handler(session.clone(), tx);

        handler.handle(control("END")).await.unwrap();

        let state = session.lock().await;
        assert!(!state.armed);
        assert_eq!(state.invocations, 7);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_data_events_pass_through() {
        let session = Arc::new(Mutex::new(SessionState::new()));
        let (tx, mut rx) = broadcast::channel(100);
        let handler = handler(session.clone(), tx);

        let event = Event {
            data: EventData::Json(json!({"id": 5})),
            subject: "inbound".to_string(),
            task_id: 0,
            task_type: "test",
            id: None,
            timestamp: 123456789,
        };
        handler.handle(event).await.unwrap();

        let forwarded = rx.recv().await.unwrap();
        assert_eq!(forwarded.data, EventData::Json(json!({"id": 5})));
        assert_eq!(forwarded.task_id, 1);
        assert!(!session.lock().await.armed);
    }

    #[tokio::test]
    async fn test_events_from_other_tasks_ignored() {
        let session = Arc::new(Mutex::new(SessionState::new()));
        let (tx, mut rx) = broadcast::channel(100);
        let handler = handler(session.clone(), tx);

        let mut event = control("START");
        event.task_id = 5;
        handler.handle(event).await.unwrap();

        assert!(!session.lock().await.armed);
        assert!(rx.try_recv().is_err());
    }
}
