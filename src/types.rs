//! Core identifier and enum types for download-jobs

use serde::{Deserialize, Serialize};

/// Unique identifier for an account
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AccountId(pub i64);

/// Unique identifier for a download task
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TaskId(pub i64);

macro_rules! impl_id_type {
    ($name:ident) => {
        impl $name {
            /// Get the inner i64 value
            pub fn get(&self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl sqlx::Type<sqlx::Sqlite> for $name {
            fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
                <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
            }

            fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
                <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
            }
        }

        impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
            ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>>
            {
                sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for $name {
            fn decode(
                value: sqlx::sqlite::SqliteValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
                Ok(Self(id))
            }
        }
    };
}

impl_id_type!(AccountId);
impl_id_type!(TaskId);

/// Download strategy selector for a task
///
/// One variant today; the executor dispatches on this tag to pick a
/// [`Downloader`](crate::task::Downloader) implementation, so new
/// protocols slot in as new variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadType {
    /// Plain HTTP(S) GET streamed to the file sink
    Http,
}

impl DownloadType {
    /// Convert an integer type code to a `DownloadType`, if known
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(DownloadType::Http),
            _ => None,
        }
    }

    /// Integer type code stored in the database
    pub fn as_i32(&self) -> i32 {
        match self {
            DownloadType::Http => 0,
        }
    }
}

/// Download task status
///
/// Lifecycle: `Pending` -> `Downloading` -> `Completed` | `Failed`.
/// `Downloading` is entered exactly once, by the executor that wins the
/// claim; the terminal states have no outgoing transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Created, waiting for an executor to claim it
    Pending,
    /// Claimed by an executor; transfer in progress
    Downloading,
    /// Transfer finished successfully
    Completed,
    /// Transfer failed, timed out, was cancelled, or had no strategy
    Failed,
}

impl TaskStatus {
    /// Convert an integer status code to a `TaskStatus`
    ///
    /// Unknown codes map to `Failed`; the schema only ever writes the
    /// four known codes.
    pub fn from_i32(status: i32) -> Self {
        match status {
            0 => TaskStatus::Pending,
            1 => TaskStatus::Downloading,
            2 => TaskStatus::Completed,
            _ => TaskStatus::Failed,
        }
    }

    /// Integer status code stored in the database
    pub fn as_i32(&self) -> i32 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::Downloading => 1,
            TaskStatus::Completed => 2,
            TaskStatus::Failed => 3,
        }
    }

    /// Whether this status has no outgoing transition
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Downloading => "downloading",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}
