//! Task execution context shared across all tasks of one flow.
//!
//! Carries flow identification plus the shared collaborators: the session
//! state, the record store, and the publish sink. The session state is the
//! explicit replacement for the flow host's ambient key-value store.

use crate::session::SessionState;
use crate::sink::PublishSink;
use crate::store::RecordStore;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Errors that can occur during TaskContext construction.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("Missing required builder attribute: {}", _0)]
    MissingRequiredAttribute(String),
}

/// Flow identification and metadata.
#[derive(Clone, Debug)]
pub struct FlowOptions {
    /// Flow name.
    pub name: String,
    /// Optional labels for flow metadata.
    pub labels: Option<Map<String, Value>>,
}

/// Context information shared by every task in a flow.
#[derive(Clone)]
pub struct TaskContext {
    /// Flow identification and metadata.
    pub flow: FlowOptions,
    /// Session state for this flow's replay run. Single mutex: every task
    /// invocation that touches it runs as one critical section.
    pub session: Arc<Mutex<SessionState>>,
    /// Optional record store for replay tasks.
    pub records: Option<Arc<dyn RecordStore>>,
    /// Optional publish sink for publish tasks.
    pub sink: Option<Arc<dyn PublishSink>>,
    /// Optional app-level retry configuration (can be overridden per task).
    pub retry: Option<crate::retry::RetryConfig>,
}

impl std::fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskContext")
            .field("flow", &self.flow)
            .field("session", &"<SessionState>")
            .field("records", &self.records.as_ref().map(|_| "<RecordStore>"))
            .field("sink", &self.sink.as_ref().map(|_| "<PublishSink>"))
            .field("retry", &self.retry)
            .finish()
    }
}

/// Builder for constructing TaskContext instances.
#[derive(Default)]
pub struct TaskContextBuilder {
    flow_name: Option<String>,
    flow_labels: Option<Map<String, Value>>,
    session: Option<Arc<Mutex<SessionState>>>,
    records: Option<Arc<dyn RecordStore>>,
    sink: Option<Arc<dyn PublishSink>>,
    retry: Option<crate::retry::RetryConfig>,
}

impl TaskContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the unique flow name.
    pub fn flow_name(mut self, name: String) -> Self {
        self.flow_name = Some(name);
        self
    }

    /// Sets the optional flow labels for metadata.
    pub fn flow_labels(mut self, labels: Option<Map<String, Value>>) -> Self {
        self.flow_labels = labels;
        self
    }

    /// Sets a shared session state. A fresh disarmed state is created when
    /// this is not called.
    pub fn session(mut self, session: Arc<Mutex<SessionState>>) -> Self {
        self.session = Some(session);
        self
    }

    /// Sets the optional record store.
    pub fn records(mut self, records: Option<Arc<dyn RecordStore>>) -> Self {
        self.records = records;
        self
    }

    /// Sets the optional publish sink.
    pub fn sink(mut self, sink: Option<Arc<dyn PublishSink>>) -> Self {
        self.sink = sink;
        self
    }

    /// Sets the app-level retry configuration.
    pub fn retry(mut self, retry: crate::retry::RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Builds the TaskContext instance.
    ///
    /// # Errors
    /// Returns `Error::MissingRequiredAttribute` if required fields are not set.
    pub fn build(self) -> Result<TaskContext, Error> {
        Ok(TaskContext {
            flow: FlowOptions {
                name: self
                    .flow_name
                    .ok_or_else(|| Error::MissingRequiredAttribute("flow_name".to_string()))?,
                labels: self.flow_labels,
            },
            session: self
                .session
                .unwrap_or_else(|| Arc::new(Mutex::new(SessionState::new()))),
            records: self.records,
            sink: self.sink,
            retry: self.retry,
        })
    }
}
