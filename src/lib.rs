//! # download-jobs
//!
//! Embeddable backend library for an account-gated asynchronous
//! download-job service: registered accounts submit download tasks,
//! track their status, and hold bearer tokens; a background consumer
//! claims each task exactly once and streams the source into a file
//! sink.
//!
//! ## Design Philosophy
//!
//! - **Library-first** - No CLI or bundled transport; embed it behind
//!   your own gRPC/HTTP layer
//! - **Correctness at the store** - Caches and queues are advisory;
//!   uniqueness and single-execution are enforced by exclusive database
//!   transactions
//! - **At-least-once tolerant** - Duplicate dispatch events are no-ops
//!   by construction, not by deduplication
//!
//! ## Quick Start
//!
//! ```no_run
//! use download_jobs::{Config, DownloadJobs, DownloadType};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let jobs = DownloadJobs::new(Config::default()).await?;
//!
//!     let _account = jobs.register("alice", "correct horse").await?;
//!     let (token, _expiry) = jobs.authenticate("alice", "correct horse").await?;
//!
//!     let task = jobs
//!         .create_task(&token, DownloadType::Http, "http://example.test/a.bin")
//!         .await?;
//!     println!("submitted task {}", task.id);
//!
//!     jobs.shutdown().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Account registration and authentication
pub mod account;
/// Bearer token subsystem
pub mod auth;
/// Advisory cache layer
pub mod cache;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Error types
pub mod error;
/// Message queue layer
pub mod queue;
/// Top-level service facade
pub mod service;
/// File sink storage
pub mod storage;
/// Download task surface and execution
pub mod task;
/// Core identifier and enum types
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use error::{DatabaseError, DownloadError, Error, Result};
pub use service::DownloadJobs;
pub use task::{DownloadTask, Downloader, HttpDownloader, TaskExecutor};
pub use types::{AccountId, DownloadType, TaskId, TaskStatus};
