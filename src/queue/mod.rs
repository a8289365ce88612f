//! Message queue layer
//!
//! [`QueuePublisher`] and [`QueueSubscriber`] are the seams for the
//! external broker collaborator: topic-addressed byte payloads with
//! at-least-once delivery and no cross-message ordering. The task claim
//! protocol is what makes duplicate delivery harmless, so nothing here
//! attempts deduplication.
//!
//! [`InProcessQueue`] is the bundled implementation: per-topic fan-out
//! over unbounded channels, for single-process deployments and tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

mod consumer;
mod producer;

pub use consumer::spawn_task_created_consumer;
pub use producer::{TOPIC_TASK_CREATED, TaskCreatedEvent, TaskCreatedProducer};

/// Error type for queue operations
#[derive(Debug, thiserror::Error)]
#[error("queue error: {0}")]
pub struct QueueError(pub String);

/// Publishes payloads to a topic
#[async_trait]
pub trait QueuePublisher: Send + Sync {
    /// Publish a payload to every current subscriber of `topic`
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), QueueError>;
}

/// Subscribes to topics
pub trait QueueSubscriber: Send + Sync {
    /// Open a subscription to `topic`
    ///
    /// Messages published after this call are delivered in publish order
    /// for this topic; the receiver ends when the queue is dropped.
    fn subscribe(&self, topic: &str) -> mpsc::UnboundedReceiver<Vec<u8>>;
}

/// In-process queue: per-topic fan-out over unbounded channels
#[derive(Default)]
pub struct InProcessQueue {
    topics: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<Vec<u8>>>>>,
}

impl InProcessQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueuePublisher for InProcessQueue {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), QueueError> {
        let mut topics = self
            .topics
            .lock()
            .map_err(|_| QueueError("queue lock poisoned".to_string()))?;

        if let Some(senders) = topics.get_mut(topic) {
            // Prune subscribers that have gone away.
            senders.retain(|tx| tx.send(payload.clone()).is_ok());
        }

        Ok(())
    }
}

impl QueueSubscriber for InProcessQueue {
    fn subscribe(&self, topic: &str) -> mpsc::UnboundedReceiver<Vec<u8>> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut topics) = self.topics.lock() {
            topics.entry(topic.to_string()).or_default().push(tx);
        }
        rx
    }
}
