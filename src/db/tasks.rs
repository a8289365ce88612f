//! Download task CRUD, the claim protocol, and locked mutations.

use crate::error::DatabaseError;
use crate::types::{AccountId, TaskId, TaskStatus};
use crate::{Error, Result};
use sqlx::Sqlite;
use sqlx::pool::PoolConnection;

use super::{Database, DownloadTaskRow, NewDownloadTask, commit_tx, rollback_tx};

const SELECT_TASK_COLUMNS: &str = "SELECT id, of_account_id, download_type, url, \
     download_status, metadata, created_at, updated_at FROM download_tasks";

impl Database {
    /// Insert a new download task in `pending` status
    pub async fn insert_task(&self, task: &NewDownloadTask) -> Result<TaskId> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO download_tasks (
                of_account_id, download_type, url, download_status,
                metadata, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(task.of_account_id)
        .bind(task.download_type)
        .bind(&task.url)
        .bind(TaskStatus::Pending.as_i32())
        .bind(&task.metadata)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert download task: {}",
                e
            )))
        })?;

        Ok(TaskId(result.last_insert_rowid()))
    }

    /// Get a task by ID
    pub async fn get_task(&self, id: TaskId) -> Result<Option<DownloadTaskRow>> {
        let row = sqlx::query_as::<_, DownloadTaskRow>(&format!(
            "{} WHERE id = ?",
            SELECT_TASK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get download task: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// List an account's tasks, oldest first
    pub async fn list_tasks_of_account(
        &self,
        account_id: AccountId,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<DownloadTaskRow>> {
        let rows = sqlx::query_as::<_, DownloadTaskRow>(&format!(
            "{} WHERE of_account_id = ? ORDER BY id ASC LIMIT ? OFFSET ?",
            SELECT_TASK_COLUMNS
        ))
        .bind(account_id)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list download tasks: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Count all tasks owned by an account
    pub async fn count_tasks_of_account(&self, account_id: AccountId) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM download_tasks WHERE of_account_id = ?")
                .bind(account_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to count download tasks: {}",
                        e
                    )))
                })?;

        Ok(count as u64)
    }

    /// Claim a pending task for execution
    ///
    /// This is the linearization point of the task state machine. Under
    /// the exclusive transaction the row is re-read and the status
    /// re-checked, so of all concurrent claimers for the same task ID
    /// exactly one observes `pending` and writes `downloading`; the rest
    /// see a non-pending row and return `None` without writing, which
    /// makes redelivered queue messages a silent no-op.
    ///
    /// Returns the claimed row with its status already advanced, or
    /// `None` if the task is missing or was not `pending`.
    pub async fn claim_task(&self, id: TaskId) -> Result<Option<DownloadTaskRow>> {
        let mut conn = self.begin_immediate().await?;

        let result = Self::claim_task_in_tx(&mut conn, id).await;

        match result {
            Ok(claimed) => {
                commit_tx(&mut conn).await?;
                Ok(claimed)
            }
            Err(e) => {
                rollback_tx(&mut conn).await;
                Err(e)
            }
        }
    }

    async fn claim_task_in_tx(
        conn: &mut PoolConnection<Sqlite>,
        id: TaskId,
    ) -> Result<Option<DownloadTaskRow>> {
        let row = Self::get_task_locked(conn, id).await?;

        let Some(mut task) = row else {
            tracing::warn!(task_id = %id, "cannot find download task to claim");
            return Ok(None);
        };

        if task.download_status != TaskStatus::Pending.as_i32() {
            tracing::debug!(
                task_id = %id,
                status = %TaskStatus::from_i32(task.download_status),
                "download task is not pending, skipping claim"
            );
            return Ok(None);
        }

        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            "UPDATE download_tasks SET download_status = ?, updated_at = ? WHERE id = ?",
        )
        .bind(TaskStatus::Downloading.as_i32())
        .bind(now)
        .bind(id)
        .execute(&mut **conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to claim download task: {}",
                e
            )))
        })?;

        task.download_status = TaskStatus::Downloading.as_i32();
        task.updated_at = now;
        Ok(Some(task))
    }

    /// Update a task's URL on behalf of an account
    ///
    /// Runs under the exclusive lock so it serializes with claim
    /// attempts. Enforces ownership and the lifecycle rule that the URL
    /// is only mutable while the task is still `pending`.
    pub async fn update_task_url(
        &self,
        id: TaskId,
        account_id: AccountId,
        url: &str,
    ) -> Result<DownloadTaskRow> {
        let mut conn = self.begin_immediate().await?;

        let result = async {
            let Some(mut task) = Self::get_task_locked(&mut conn, id).await? else {
                return Err(Error::NotFound(format!("download task {} not found", id)));
            };

            if task.of_account_id != account_id {
                return Err(Error::PermissionDenied(
                    "download task belongs to another account".to_string(),
                ));
            }

            if task.download_status != TaskStatus::Pending.as_i32() {
                return Err(Error::Conflict(format!(
                    "download task {} is no longer pending",
                    id
                )));
            }

            let now = chrono::Utc::now().timestamp();
            sqlx::query("UPDATE download_tasks SET url = ?, updated_at = ? WHERE id = ?")
                .bind(url)
                .bind(now)
                .bind(id)
                .execute(&mut *conn)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to update download task: {}",
                        e
                    )))
                })?;

            task.url = url.to_string();
            task.updated_at = now;
            Ok(task)
        }
        .await;

        match result {
            Ok(task) => {
                commit_tx(&mut conn).await?;
                Ok(task)
            }
            Err(e) => {
                rollback_tx(&mut conn).await;
                Err(e)
            }
        }
    }

    /// Delete a task on behalf of an account
    ///
    /// Enforces ownership, and rejects deletion while the task is
    /// actively claimed (`downloading`).
    pub async fn delete_task(&self, id: TaskId, account_id: AccountId) -> Result<()> {
        let mut conn = self.begin_immediate().await?;

        let result = async {
            let Some(task) = Self::get_task_locked(&mut conn, id).await? else {
                return Err(Error::NotFound(format!("download task {} not found", id)));
            };

            if task.of_account_id != account_id {
                return Err(Error::PermissionDenied(
                    "download task belongs to another account".to_string(),
                ));
            }

            if task.download_status == TaskStatus::Downloading.as_i32() {
                return Err(Error::Conflict(format!(
                    "download task {} is being executed",
                    id
                )));
            }

            sqlx::query("DELETE FROM download_tasks WHERE id = ?")
                .bind(id)
                .execute(&mut *conn)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to delete download task: {}",
                        e
                    )))
                })?;

            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                commit_tx(&mut conn).await?;
                Ok(())
            }
            Err(e) => {
                rollback_tx(&mut conn).await;
                Err(e)
            }
        }
    }

    /// Write a task's status outside any transaction
    ///
    /// Used by the executor for the terminal write after a download
    /// attempt; during that window the claiming executor is the sole
    /// writer of record for the row, so no lock is re-acquired.
    pub async fn update_task_status(&self, id: TaskId, status: TaskStatus) -> Result<()> {
        sqlx::query(
            "UPDATE download_tasks SET download_status = ?, updated_at = ? WHERE id = ?",
        )
        .bind(status.as_i32())
        .bind(chrono::Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to update download task status: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Read a task row inside an exclusive transaction
    async fn get_task_locked(
        conn: &mut PoolConnection<Sqlite>,
        id: TaskId,
    ) -> Result<Option<DownloadTaskRow>> {
        sqlx::query_as::<_, DownloadTaskRow>(&format!("{} WHERE id = ?", SELECT_TASK_COLUMNS))
            .bind(id)
            .fetch_optional(&mut **conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to get download task: {}",
                    e
                )))
            })
    }
}
