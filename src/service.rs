//! Top-level service facade
//!
//! [`DownloadJobs`] wires the subsystems together — database, caches,
//! authenticator, queue, executor — and exposes the caller-facing
//! operations to the embedding transport layer.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::account::AccountService;
use crate::auth::Authenticator;
use crate::cache::{CacheClient, InMemoryCache, PublicKeyCache, TakenNameCache};
use crate::config::Config;
use crate::db::Database;
use crate::queue::{
    InProcessQueue, QueuePublisher, QueueSubscriber, TaskCreatedProducer,
    spawn_task_created_consumer,
};
use crate::storage::{FileStore, LocalFileStore};
use crate::task::{DownloadTask, TaskExecutor, TaskService};
use crate::types::{AccountId, DownloadType, TaskId};
use crate::Result;

/// The assembled download-job service
///
/// Construction is fatal on any startup failure (database, signing key);
/// a half-initialized service never accepts calls. The task consumer
/// starts immediately on its own worker task and runs until
/// [`shutdown`](DownloadJobs::shutdown).
pub struct DownloadJobs {
    db: Arc<Database>,
    accounts: AccountService,
    tasks: TaskService,
    cancel: CancellationToken,
    consumer: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl DownloadJobs {
    /// Create a service with bundled in-process collaborators
    ///
    /// Uses [`InMemoryCache`], [`InProcessQueue`], and a
    /// [`LocalFileStore`] rooted at the configured download directory.
    pub async fn new(config: Config) -> Result<Self> {
        let cache: Arc<dyn CacheClient> = Arc::new(InMemoryCache::new());
        let queue = Arc::new(InProcessQueue::new());
        let files: Arc<dyn FileStore> =
            Arc::new(LocalFileStore::new(config.download.download_dir.clone()).await?);

        Self::with_collaborators(config, cache, queue, files).await
    }

    /// Create a service over externally supplied collaborators
    ///
    /// The queue must serve both roles: the dispatcher publishes to it
    /// and the consumer subscribes to it.
    pub async fn with_collaborators<Q>(
        config: Config,
        cache: Arc<dyn CacheClient>,
        queue: Arc<Q>,
        files: Arc<dyn FileStore>,
    ) -> Result<Self>
    where
        Q: QueuePublisher + QueueSubscriber + 'static,
    {
        let db = Arc::new(Database::new(&config.database).await?);

        let authenticator = Arc::new(
            Authenticator::new(
                db.clone(),
                PublicKeyCache::new(cache.clone()),
                &config.auth,
            )
            .await?,
        );

        let accounts = AccountService::new(
            db.clone(),
            TakenNameCache::new(cache),
            authenticator.clone(),
        );

        let publisher: Arc<dyn QueuePublisher> = queue.clone();
        let tasks = TaskService::new(
            db.clone(),
            authenticator,
            TaskCreatedProducer::new(publisher),
        );

        let cancel = CancellationToken::new();
        let executor = Arc::new(TaskExecutor::new(
            db.clone(),
            files,
            &config.download,
            cancel.child_token(),
        ));
        let consumer =
            spawn_task_created_consumer(queue.as_ref(), executor, cancel.child_token());

        Ok(Self {
            db,
            accounts,
            tasks,
            cancel,
            consumer: Mutex::new(Some(consumer)),
        })
    }

    /// Register a new account; see [`AccountService::register`]
    pub async fn register(&self, account_name: &str, password: &str) -> Result<AccountId> {
        self.accounts.register(account_name, password).await
    }

    /// Exchange credentials for a bearer token; see
    /// [`AccountService::authenticate`]
    pub async fn authenticate(
        &self,
        account_name: &str,
        password: &str,
    ) -> Result<(String, DateTime<Utc>)> {
        self.accounts.authenticate(account_name, password).await
    }

    /// Create and dispatch a download task; see
    /// [`TaskService::create_task`]
    pub async fn create_task(
        &self,
        token: &str,
        download_type: DownloadType,
        url: &str,
    ) -> Result<DownloadTask> {
        self.tasks.create_task(token, download_type, url).await
    }

    /// List the caller's tasks with the total count; see
    /// [`TaskService::list_tasks`]
    pub async fn list_tasks(
        &self,
        token: &str,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<DownloadTask>, u64)> {
        self.tasks.list_tasks(token, offset, limit).await
    }

    /// Update a pending task's URL; see [`TaskService::update_task`]
    pub async fn update_task(
        &self,
        token: &str,
        task_id: TaskId,
        url: &str,
    ) -> Result<DownloadTask> {
        self.tasks.update_task(token, task_id, url).await
    }

    /// Delete an unclaimed task; see [`TaskService::delete_task`]
    pub async fn delete_task(&self, token: &str, task_id: TaskId) -> Result<()> {
        self.tasks.delete_task(token, task_id).await
    }

    /// Stop the consumer, abandon in-flight transfers, and close the pool
    ///
    /// In-flight tasks are driven to `failed` best-effort before the
    /// consumer exits.
    pub async fn shutdown(&self) {
        self.cancel.cancel();

        if let Some(handle) = self.consumer.lock().await.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "task consumer terminated abnormally");
            }
        }

        self.db.close().await;
    }
}
