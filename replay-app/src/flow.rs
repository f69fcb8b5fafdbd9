//! Flow execution and task orchestration.
//!
//! Manages the execution of individual flows by creating and orchestrating
//! tasks from the processor types in `replay-core`. Handles task lifecycle,
//! error propagation, and resource sharing between tasks.

use crate::config::{FlowConfig, Task};
use replay_core::event::Event;
use replay_core::task::runner::Runner;
use std::sync::Arc;
use tokio::{
    sync::broadcast::{self, Sender},
    task::JoinHandle,
};
use tracing::{error, info, Instrument};

const DEFAULT_EVENT_BUFFER_SIZE: usize = 10000;

/// Errors that can occur during flow execution.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Error in trigger subscriber task.
    #[error(transparent)]
    TriggerSubscriber(#[from] replay_core::task::trigger::subscriber::Error),
    /// Error in arm processor task.
    #[error(transparent)]
    ArmProcessor(#[from] replay_core::task::arm::processor::Error),
    /// Error in filter processor task.
    #[error(transparent)]
    FilterProcessor(#[from] replay_core::task::filter::processor::Error),
    /// Error in replay processor task.
    #[error(transparent)]
    ReplayProcessor(#[from] replay_core::task::replay::processor::Error),
    /// Error in publish processor task.
    #[error(transparent)]
    PublishProcessor(#[from] replay_core::task::publish::processor::Error),
    /// Error in log processor task.
    #[error(transparent)]
    LogProcessor(#[from] replay_core::task::log::processor::Error),
    /// Missing required configuration attribute.
    #[error("Missing required attribute: {0}")]
    MissingRequiredAttribute(String),
}

/// One configured flow and its shared collaborators.
#[derive(Debug)]
pub struct Flow {
    /// The flow's static configuration, loaded from a file.
    pub config: Arc<FlowConfig>,
    /// Optional shared record store, passed in from the main application.
    records: Option<Arc<dyn replay_core::store::RecordStore>>,
    /// Optional shared publish sink, passed in from the main application.
    sink: Option<Arc<dyn replay_core::sink::PublishSink>>,
    /// Optional default retry configuration from the main application.
    retry: Option<replay_core::retry::RetryConfig>,
    /// Event channel buffer size for this flow (from app config or DEFAULT).
    event_buffer_size: Option<usize>,
    /// The shared context for all tasks in this flow. Initialized by `init()`.
    task_context: Option<Arc<replay_core::task::context::TaskContext>>,
    /// The broadcast channel sender for events within this flow. Initialized by `init()`.
    tx: Option<Sender<Event>>,
}

impl Flow {
    /// Returns the name of the flow.
    pub fn name(&self) -> &str {
        &self.config.flow.name
    }

    /// Initializes shared resources for the flow. Must be called before
    /// `run()`.
    #[tracing::instrument(skip(self), name = "flow.init", fields(flow = %self.config.flow.name))]
    pub fn init(&mut self) -> Result<(), Error> {
        if self.task_context.is_some() {
            return Ok(());
        }

        let mut task_context_builder = replay_core::task::context::TaskContextBuilder::new()
            .flow_name(self.config.flow.name.clone())
            .flow_labels(self.config.flow.labels.clone())
            .records(self.records.clone())
            .sink(self.sink.clone());
        if let Some(ref retry) = self.retry {
            task_context_builder = task_context_builder.retry(retry.clone());
        }
        let task_context = Arc::new(
            task_context_builder
                .build()
                .map_err(|e| Error::MissingRequiredAttribute(e.to_string()))?,
        );

        let buffer_size = self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE);
        let (tx, _) = broadcast::channel(buffer_size);

        self.task_context = Some(task_context);
        self.tx = Some(tx);

        Ok(())
    }

    /// Starts the long-running execution of the flow.
    #[tracing::instrument(skip(self), name = "flow.run", fields(flow = %self.config.flow.name))]
    pub fn run(self) -> JoinHandle<()> {
        let flow_name = self.config.flow.name.clone();
        tokio::spawn(
            async move {
                if let Err(e) = self.run_tasks().await {
                    error!("Flow {} terminated with an error: {}", flow_name, e);
                }
            }
            .instrument(tracing::Span::current()),
        )
    }

    async fn run_tasks(self) -> Result<(), Error> {
        let task_context = self.task_context.ok_or_else(|| {
            Error::MissingRequiredAttribute("task_context: init() must be called first".to_string())
        })?;
        let tx = self.tx.ok_or_else(|| {
            Error::MissingRequiredAttribute("tx: init() must be called first".to_string())
        })?;

        if self.config.flow.tasks.is_empty() {
            info!("Flow {} has no tasks to run.", self.config.flow.name);
            return Ok(());
        }

        let tasks: Vec<(usize, Task)> = self
            .config
            .flow
            .tasks
            .iter()
            .enumerate()
            .map(|(i, task)| (i, task.clone()))
            .collect();

        let handles = spawn_tasks(&tasks, &tx, &task_context).await;
        futures::future::join_all(handles).await;
        info!("All tasks completed for flow {}", self.config.flow.name);
        Ok(())
    }
}

/// Spawns all tasks for the flow, one tokio task per pipeline stage.
async fn spawn_tasks(
    tasks: &[(usize, Task)],
    tx: &Sender<Event>,
    task_context: &Arc<replay_core::task::context::TaskContext>,
) -> Vec<JoinHandle<Result<(), Error>>> {
    let mut handles = Vec::new();

    for (i, task) in tasks.iter() {
        let i = *i;

        match task {
            Task::trigger(config) => {
                let config = Arc::new(config.to_owned());
                let tx = tx.clone();
                let task_context = Arc::clone(task_context);
                let task_type = task.as_str();
                let span = tracing::Span::current();
                let handle: JoinHandle<Result<(), Error>> = tokio::spawn(
                    async move {
                        replay_core::task::trigger::subscriber::SubscriberBuilder::new()
                            .config(config)
                            .sender(tx)
                            .task_id(i)
                            .task_type(task_type)
                            .task_context(task_context)
                            .build()
                            .await?
                            .run()
                            .await?;

                        Ok(())
                    }
                    .instrument(span),
                );
                handles.push(handle);
            }
            Task::arm(config) => {
                let config = Arc::new(config.to_owned());
                let rx = tx.subscribe();
                let tx = tx.clone();
                let task_context = Arc::clone(task_context);
                let task_type = task.as_str();
                let span = tracing::Span::current();
                let handle: JoinHandle<Result<(), Error>> = tokio::spawn(
                    async move {
                        replay_core::task::arm::processor::ProcessorBuilder::new()
                            .config(config)
                            .receiver(rx)
                            .sender(tx)
                            .task_id(i)
                            .task_type(task_type)
                            .task_context(task_context)
                            .build()
                            .await?
                            .run()
                            .await?;

                        Ok(())
                    }
                    .instrument(span),
                );
                handles.push(handle);
            }
            Task::filter(config) => {
                let config = Arc::new(config.to_owned());
                let rx = tx.subscribe();
                let tx = tx.clone();
                let task_context = Arc::clone(task_context);
                let task_type = task.as_str();
                let span = tracing::Span::current();
                let handle: JoinHandle<Result<(), Error>> = tokio::spawn(
                    async move {
                        replay_core::task::filter::processor::ProcessorBuilder::new()
                            .config(config)
                            .receiver(rx)
                            .sender(tx)
                            .task_id(i)
                            .task_type(task_type)
                            .task_context(task_context)
                            .build()
                            .await?
                            .run()
                            .await?;

                        Ok(())
                    }
                    .instrument(span),
                );
                handles.push(handle);
            }
            Task::replay(config) => {
                let config = Arc::new(config.to_owned());
                let rx = tx.subscribe();
                let tx = tx.clone();
                let task_context = Arc::clone(task_context);
                let task_type = task.as_str();
                let span = tracing::Span::current();
                let handle: JoinHandle<Result<(), Error>> = tokio::spawn(
                    async move {
                        replay_core::task::replay::processor::ProcessorBuilder::new()
                            .config(config)
                            .receiver(rx)
                            .sender(tx)
                            .task_id(i)
                            .task_type(task_type)
                            .task_context(task_context)
                            .build()
                            .await?
                            .run()
                            .await?;

                        Ok(())
                    }
                    .instrument(span),
                );
                handles.push(handle);
            }
            Task::publish(config) => {
                let config = Arc::new(config.to_owned());
                let rx = tx.subscribe();
                let tx = tx.clone();
                let task_context = Arc::clone(task_context);
                let task_type = task.as_str();
                let span = tracing::Span::current();
                let handle: JoinHandle<Result<(), Error>> = tokio::spawn(
                    async move {
                        replay_core::task::publish::processor::ProcessorBuilder::new()
                            .config(config)
                            .receiver(rx)
                            .sender(tx)
                            .task_id(i)
                            .task_type(task_type)
                            .task_context(task_context)
                            .build()
                            .await?
                            .run()
                            .await?;

                        Ok(())
                    }
                    .instrument(span),
                );
                handles.push(handle);
            }
            Task::log(config) => {
                let config = Arc::new(config.to_owned());
                let rx = tx.subscribe();
                let tx = tx.clone();
                let task_type = task.as_str();
                let span = tracing::Span::current();
                let handle: JoinHandle<Result<(), Error>> = tokio::spawn(
                    async move {
                        replay_core::task::log::processor::ProcessorBuilder::new()
                            .config(config)
                            .receiver(rx)
                            .sender(tx)
                            .task_id(i)
                            .task_type(task_type)
                            .build()
                            .await?
                            .run()
                            .await?;

                        Ok(())
                    }
                    .instrument(span),
                );
                handles.push(handle);
            }
        }
    }

    handles
}

/// Builder for constructing Flow instances.
#[derive(Default)]
pub struct FlowBuilder {
    config: Option<Arc<FlowConfig>>,
    records: Option<Arc<dyn replay_core::store::RecordStore>>,
    sink: Option<Arc<dyn replay_core::sink::PublishSink>>,
    retry: Option<replay_core::retry::RetryConfig>,
    event_buffer_size: Option<usize>,
}

impl FlowBuilder {
    pub fn new() -> FlowBuilder {
        FlowBuilder {
            ..Default::default()
        }
    }

    pub fn config(mut self, config: Arc<FlowConfig>) -> Self {
        self.config = Some(config);
        self
    }

    pub fn records(mut self, records: Option<Arc<dyn replay_core::store::RecordStore>>) -> Self {
        self.records = records;
        self
    }

    pub fn sink(mut self, sink: Option<Arc<dyn replay_core::sink::PublishSink>>) -> Self {
        self.sink = sink;
        self
    }

    pub fn retry(mut self, retry: Option<replay_core::retry::RetryConfig>) -> Self {
        self.retry = retry;
        self
    }

    pub fn event_buffer_size(mut self, event_buffer_size: usize) -> Self {
        self.event_buffer_size = Some(event_buffer_size);
        self
    }

    pub fn build(self) -> Result<Flow, Error> {
        Ok(Flow {
            config: self
                .config
                .ok_or_else(|| Error::MissingRequiredAttribute("config".to_string()))?,
            records: self.records,
            sink: self.sink,
            retry: self.retry,
            event_buffer_size: self.event_buffer_size,
            task_context: None,
            tx: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Flow as FlowDefinition, FlowConfig};

    fn flow_config(tasks: Vec<Task>) -> Arc<FlowConfig> {
        Arc::new(FlowConfig {
            flow: FlowDefinition {
                name: "test-flow".to_string(),
                labels: None,
                tasks,
            },
        })
    }

    #[test]
    fn test_builder_missing_config() {
        let result = FlowBuilder::new().build();
        assert!(matches!(
            result.unwrap_err(),
            Error::MissingRequiredAttribute(_)
        ));
    }

    #[test]
    fn test_init_is_idempotent() {
        let mut flow = FlowBuilder::new()
            .config(flow_config(vec![]))
            .build()
            .unwrap();

        flow.init().unwrap();
        flow.init().unwrap();
        assert!(flow.task_context.is_some());
        assert!(flow.tx.is_some());
    }

    #[tokio::test]
    async fn test_empty_flow_completes() {
        let mut flow = FlowBuilder::new()
            .config(flow_config(vec![]))
            .build()
            .unwrap();
        flow.init().unwrap();
        flow.run().await.unwrap();
    }

    #[tokio::test]
    async fn test_trigger_only_flow_runs_to_completion() {
        let tasks = vec![Task::trigger(
            serde_json::from_str(
                r#"{"name": "start", "subject": "control", "delay": "1ms"}"#,
            )
            .unwrap(),
        )];
        let mut flow = FlowBuilder::new().config(flow_config(tasks)).build().unwrap();
        flow.init().unwrap();
        // The trigger emits once and completes, which ends the flow.
        flow.run().await.unwrap();
    }
}
