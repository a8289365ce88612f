//! Error types for download-jobs
//!
//! The crate-level [`Error`] enum mirrors the caller-facing taxonomy of the
//! service: conflict, unauthenticated, permission-denied, not-found, and
//! internal failures, plus database and I/O wrappers. Downloader-internal
//! failures use [`DownloadError`] and are never surfaced to callers; the
//! executor folds them into a task's `failed` terminal state.

use thiserror::Error;

/// Result type alias for download-jobs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for download-jobs
///
/// Every caller-facing operation returns one of these variants with a
/// human-readable message. Cache failures never appear here; they are
/// recovered locally with a fallback to the authoritative store.
#[derive(Debug, Error)]
pub enum Error {
    /// A uniqueness or lifecycle conflict (duplicate account name,
    /// editing a task that is no longer `pending`)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Missing, malformed, expired, or unresolvable credentials or token
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Caller is not the owner of the targeted task
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Unknown task, account, or signing-key record
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller-supplied URL could not be parsed
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Storage, signing, or queue failure not attributable to caller input
    #[error("internal error: {0}")]
    Internal(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Unique-constraint violation (e.g. duplicate account name)
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Downloader-internal errors
///
/// These never cross the service boundary: the task executor records any
/// of them as the task's `failed` terminal state, and the caller observes
/// the failure asynchronously through task status.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Transport-level HTTP failure (DNS, connect, mid-body disconnect)
    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("http status {0}")]
    HttpStatus(u16),

    /// Transfer exceeded the configured deadline
    #[error("download timed out after {0} seconds")]
    TimedOut(u64),

    /// Transfer was cancelled by shutdown
    #[error("download cancelled")]
    Cancelled,

    /// Writing to the file sink failed
    #[error("sink I/O error: {0}")]
    Sink(#[from] std::io::Error),

    /// The task's download type has no registered strategy
    #[error("unsupported download type: {0}")]
    UnsupportedType(i32),
}
