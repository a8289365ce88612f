//! Producer side of the task dispatch pipeline.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::TaskId;
use crate::{Error, Result};

use super::QueuePublisher;

/// Topic carrying "task created" events
pub const TOPIC_TASK_CREATED: &str = "task_created";

/// Event published after a task row commits in `pending`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCreatedEvent {
    /// ID of the newly created task
    pub task_id: TaskId,
}

/// Publishes [`TaskCreatedEvent`]s to the queue
#[derive(Clone)]
pub struct TaskCreatedProducer {
    queue: Arc<dyn QueuePublisher>,
}

impl TaskCreatedProducer {
    /// Create a producer over a queue client
    pub fn new(queue: Arc<dyn QueuePublisher>) -> Self {
        Self { queue }
    }

    /// Publish a "task created" event for `task_id`
    ///
    /// The caller invokes this only after the task row has committed; a
    /// publish failure therefore leaves a committed row with no event,
    /// which the caller handles by logging (the task stays `pending`).
    pub async fn publish(&self, task_id: TaskId) -> Result<()> {
        let payload = serde_json::to_vec(&TaskCreatedEvent { task_id })
            .map_err(|e| Error::Internal(format!("failed to encode event: {}", e)))?;

        self.queue
            .publish(TOPIC_TASK_CREATED, payload)
            .await
            .map_err(|e| Error::Internal(format!("failed to publish event: {}", e)))
    }
}
