//! Publish sink abstraction for outbound envelopes.
//!
//! The transport itself is external to this worker; tasks hand completed
//! (topic, payload) pairs to a sink and move on. Delivery guarantees are out
//! of scope, so a failed publish is logged and dropped by callers.

use bytes::Bytes;
use std::sync::Mutex;
use tracing::info;

/// Errors that can occur during a publish attempt.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The sink refused or could not accept the payload.
    #[error("Publish to topic '{topic}' rejected: {reason}")]
    Rejected { topic: String, reason: String },
}

/// External component accepting (topic, payload) pairs for delivery.
#[async_trait::async_trait]
pub trait PublishSink: std::fmt::Debug + Send + Sync + 'static {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), Error>;
}

/// Sink that records published messages in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemorySink {
    published: Mutex<Vec<(String, Bytes)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains and returns everything published so far.
    pub fn take(&self) -> Vec<(String, Bytes)> {
        std::mem::take(&mut self.published.lock().expect("sink lock poisoned"))
    }

    /// Number of messages currently held.
    pub fn len(&self) -> usize {
        self.published.lock().expect("sink lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl PublishSink for MemorySink {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), Error> {
        self.published
            .lock()
            .expect("sink lock poisoned")
            .push((topic.to_string(), payload));
        Ok(())
    }
}

/// Sink that writes every publish to the application log. Useful when no
/// transport is wired up.
#[derive(Debug, Default)]
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl PublishSink for LogSink {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), Error> {
        info!(
            "Published to {}: {}",
            topic,
            String::from_utf8_lossy(&payload)
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_sink_preserves_order() {
        let sink = MemorySink::new();
        sink.publish("t", Bytes::from_static(b"first")).await.unwrap();
        sink.publish("t", Bytes::from_static(b"second")).await.unwrap();

        let published = sink.take();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].1.as_ref(), b"first");
        assert_eq!(published[1].1.as_ref(), b"second");
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_memory_sink_records_topic() {
        let sink = MemorySink::new();
        sink.publish("challenge/replay", Bytes::from_static(b"END"))
            .await
            .unwrap();

        let published = sink.take();
        assert_eq!(published[0].0, "challenge/replay");
    }

    #[tokio::test]
    async fn test_log_sink_accepts_everything() {
        let sink = LogSink::new();
        assert!(sink
            .publish("topic", Bytes::from_static(b"payload"))
            .await
            .is_ok());
    }
}
