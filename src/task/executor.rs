//! Task executor: the claim-then-download state machine.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::config::DownloadConfig;
use crate::db::{Database, DownloadTaskRow};
use crate::error::DownloadError;
use crate::storage::FileStore;
use crate::types::{TaskId, TaskStatus};
use crate::Result;

use super::downloader::downloader_for;

/// Executes claimed download tasks to a terminal state
///
/// `execute` is safe to call any number of times for the same task ID
/// from any number of workers: the claim transaction guarantees at most
/// one caller wins the `pending` -> `downloading` transition, and every
/// other call is a no-op. The winning caller runs the download outside
/// any transaction and writes the terminal status when it is done.
pub struct TaskExecutor {
    db: Arc<Database>,
    files: Arc<dyn FileStore>,
    http: reqwest::Client,
    timeout: Duration,
    cancel: CancellationToken,
}

impl TaskExecutor {
    /// Create an executor over its collaborators
    ///
    /// `cancel` aborts in-flight transfers on shutdown; aborted tasks are
    /// still driven to `failed`, best-effort.
    pub fn new(
        db: Arc<Database>,
        files: Arc<dyn FileStore>,
        config: &DownloadConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            db,
            files,
            http: reqwest::Client::new(),
            timeout: Duration::from_secs(config.timeout_secs),
            cancel,
        }
    }

    /// Claim and run the task with the given ID
    ///
    /// Returns `Ok(())` both when this call executed the task and when
    /// the task was already claimed, finished, or missing (the idempotent
    /// no-op path for redelivered dispatch events).
    pub async fn execute(&self, id: TaskId) -> Result<()> {
        let Some(task) = self.db.claim_task(id).await? else {
            return Ok(());
        };

        let terminal = match self.run_download(&task).await {
            Ok(bytes_written) => {
                tracing::info!(task_id = %id, url = %task.url, bytes_written, "download completed");
                TaskStatus::Completed
            }
            Err(e) => {
                tracing::error!(task_id = %id, url = %task.url, error = %e, "download failed");
                TaskStatus::Failed
            }
        };

        self.db.update_task_status(id, terminal).await?;
        Ok(())
    }

    async fn run_download(
        &self,
        task: &DownloadTaskRow,
    ) -> std::result::Result<u64, DownloadError> {
        let downloader = downloader_for(&self.http, task.download_type, &task.url)?;

        let mut sink = self
            .files
            .open_for_write(&format!("download_file_{}", task.id))
            .await
            .map_err(|e| DownloadError::Sink(std::io::Error::other(e.to_string())))?;

        let written = match tokio::time::timeout(
            self.timeout,
            downloader.download(&mut sink, &self.cancel),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => return Err(DownloadError::TimedOut(self.timeout.as_secs())),
        };

        sink.shutdown().await?;
        Ok(written)
    }
}
