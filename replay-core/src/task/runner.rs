//! Common execution contract for all pipeline tasks.

/// A runnable pipeline task.
///
/// `init` builds the task's event handler (connecting to any external
/// resources); `run` consumes the task and drives its event loop until the
/// channel closes.
#[async_trait::async_trait]
pub trait Runner {
    type Error;
    type EventHandler;

    async fn init(&self) -> Result<Self::EventHandler, Self::Error>;
    async fn run(self) -> Result<(), Self::Error>;
}
