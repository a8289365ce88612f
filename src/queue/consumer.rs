//! Consumer side of the task dispatch pipeline.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::task::TaskExecutor;

use super::{QueueSubscriber, TOPIC_TASK_CREATED, TaskCreatedEvent};

/// Spawn the background worker that turns "task created" events into
/// executor claim attempts
///
/// Runs until the queue closes or `cancel` fires. Per-message failures
/// are logged and the loop moves on; the transport's own redelivery plus
/// the claim protocol's idempotence cover retries, so the consumer never
/// retries a message itself.
pub fn spawn_task_created_consumer(
    queue: &dyn QueueSubscriber,
    executor: Arc<TaskExecutor>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let mut rx = queue.subscribe(TOPIC_TASK_CREATED);

    tokio::spawn(async move {
        loop {
            let payload = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("task consumer shutting down");
                    break;
                }
                msg = rx.recv() => match msg {
                    Some(payload) => payload,
                    None => {
                        tracing::info!("task queue closed, consumer exiting");
                        break;
                    }
                },
            };

            let event: TaskCreatedEvent = match serde_json::from_slice(&payload) {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(error = %e, "discarding undecodable task event");
                    continue;
                }
            };

            if let Err(e) = executor.execute(event.task_id).await {
                tracing::error!(
                    task_id = %event.task_id,
                    error = %e,
                    "failed to handle task created event"
                );
            }
        }
    })
}
