//! Download task surface and execution
//!
//! ## Submodules
//!
//! - [`TaskService`] — token-gated task CRUD plus dispatch publishing
//! - [`executor`] — the claim protocol and download state machine
//! - [`downloader`] — pluggable fetch strategies (HTTP today)

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use crate::auth::Authenticator;
use crate::db::{Database, DownloadTaskRow, NewDownloadTask};
use crate::queue::TaskCreatedProducer;
use crate::types::{AccountId, DownloadType, TaskId, TaskStatus};
use crate::{Error, Result};

mod downloader;
mod executor;

pub use downloader::{Downloader, HttpDownloader};
pub use executor::TaskExecutor;

/// Default page size for task listings when the caller passes limit 0
const DEFAULT_LIST_LIMIT: u64 = 20;
/// Hard cap on task listing page size
const MAX_LIST_LIMIT: u64 = 100;

/// Caller-facing view of a download task
#[derive(Debug, Clone)]
pub struct DownloadTask {
    /// Unique task ID
    pub id: TaskId,
    /// Owning account
    pub of_account_id: AccountId,
    /// Download strategy tag
    pub download_type: DownloadType,
    /// Source URL
    pub url: String,
    /// Current lifecycle status
    pub status: TaskStatus,
    /// Free-form metadata
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Time of the last status or URL write
    pub updated_at: DateTime<Utc>,
}

fn view(row: DownloadTaskRow) -> Result<DownloadTask> {
    let download_type = DownloadType::from_i32(row.download_type).ok_or_else(|| {
        Error::Internal(format!(
            "task {} has unknown download type {}",
            row.id, row.download_type
        ))
    })?;

    let metadata = serde_json::from_str(&row.metadata).unwrap_or_default();

    Ok(DownloadTask {
        id: row.id,
        of_account_id: row.of_account_id,
        download_type,
        url: row.url,
        status: TaskStatus::from_i32(row.download_status),
        metadata,
        created_at: Utc
            .timestamp_opt(row.created_at, 0)
            .single()
            .unwrap_or_else(Utc::now),
        updated_at: Utc
            .timestamp_opt(row.updated_at, 0)
            .single()
            .unwrap_or_else(Utc::now),
    })
}

/// Token-gated task CRUD plus dispatch publishing
///
/// Every operation starts by verifying the bearer token; the resulting
/// account ID is the caller identity against which ownership is checked.
pub struct TaskService {
    db: Arc<Database>,
    authenticator: Arc<Authenticator>,
    producer: TaskCreatedProducer,
}

impl TaskService {
    /// Create the service over its collaborators
    pub fn new(
        db: Arc<Database>,
        authenticator: Arc<Authenticator>,
        producer: TaskCreatedProducer,
    ) -> Self {
        Self {
            db,
            authenticator,
            producer,
        }
    }

    /// Create a download task in `pending` and dispatch it
    ///
    /// The "task created" event is published only after the row has
    /// committed. A publish failure does not fail the call: the row
    /// exists and stays `pending`, and the failure is logged.
    pub async fn create_task(
        &self,
        token: &str,
        download_type: DownloadType,
        url: &str,
    ) -> Result<DownloadTask> {
        let (account_id, _) = self.authenticator.verify(token).await?;

        if self.db.get_account_by_id(account_id).await?.is_none() {
            return Err(Error::NotFound(format!("account {} not found", account_id)));
        }

        validate_url(url)?;

        let task_id = self
            .db
            .insert_task(&NewDownloadTask {
                of_account_id: account_id,
                download_type: download_type.as_i32(),
                url: url.to_string(),
                metadata: "{}".to_string(),
            })
            .await?;

        if let Err(e) = self.producer.publish(task_id).await {
            // Partial failure: the row committed but no event went out.
            // The task stays pending until something re-dispatches it.
            tracing::error!(
                %task_id,
                error = %e,
                "task created but dispatch event publish failed"
            );
        }

        let row = self
            .db
            .get_task(task_id)
            .await?
            .ok_or_else(|| Error::Internal(format!("task {} vanished after insert", task_id)))?;

        tracing::info!(%task_id, %account_id, url, "created download task");
        view(row)
    }

    /// List the caller's tasks plus the total count
    ///
    /// `limit` 0 means the default page size; limits above the cap are
    /// clamped.
    pub async fn list_tasks(
        &self,
        token: &str,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<DownloadTask>, u64)> {
        let (account_id, _) = self.authenticator.verify(token).await?;

        let limit = match limit {
            0 => DEFAULT_LIST_LIMIT,
            n => n.min(MAX_LIST_LIMIT),
        };

        let total = self.db.count_tasks_of_account(account_id).await?;
        let rows = self
            .db
            .list_tasks_of_account(account_id, offset, limit)
            .await?;

        let tasks = rows.into_iter().map(view).collect::<Result<Vec<_>>>()?;
        Ok((tasks, total))
    }

    /// Update the URL of a still-pending task owned by the caller
    pub async fn update_task(
        &self,
        token: &str,
        task_id: TaskId,
        url: &str,
    ) -> Result<DownloadTask> {
        let (account_id, _) = self.authenticator.verify(token).await?;
        validate_url(url)?;

        let row = self.db.update_task_url(task_id, account_id, url).await?;
        view(row)
    }

    /// Delete an unclaimed task owned by the caller
    pub async fn delete_task(&self, token: &str, task_id: TaskId) -> Result<()> {
        let (account_id, _) = self.authenticator.verify(token).await?;
        self.db.delete_task(task_id, account_id).await
    }
}

fn validate_url(url: &str) -> Result<()> {
    url::Url::parse(url)
        .map(|_| ())
        .map_err(|e| Error::InvalidUrl(format!("{}: {}", url, e)))
}
