//! Configuration types for download-jobs

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration
///
/// All fields have sensible defaults; `Config::default()` yields a working
/// in-directory setup suitable for development and tests.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Token and credential configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Download execution configuration
    #[serde(default)]
    pub download: DownloadConfig,
}

/// Database configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file (default: "./download-jobs.db")
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    /// How long a write transaction waits on a busy database before
    /// giving up, in seconds (default: 30)
    ///
    /// This is the blocking window for exclusive task claims; contending
    /// claimers wait rather than fail.
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            busy_timeout_secs: default_busy_timeout_secs(),
        }
    }
}

impl DatabaseConfig {
    /// Busy timeout as a [`Duration`]
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_secs(self.busy_timeout_secs)
    }
}

/// Token and credential configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Bearer token lifetime in seconds (default: 3600)
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_ttl_secs: default_token_ttl_secs(),
        }
    }
}

/// Download execution configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory download sinks are written into (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Overall deadline for a single transfer in seconds (default: 3600)
    ///
    /// A transfer that exceeds the deadline is cancelled and the task is
    /// marked failed, so a stuck remote cannot hold a task in
    /// `downloading` forever.
    #[serde(default = "default_download_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            timeout_secs: default_download_timeout_secs(),
        }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./download-jobs.db")
}

fn default_busy_timeout_secs() -> u64 {
    30
}

fn default_token_ttl_secs() -> u64 {
    3600
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_download_timeout_secs() -> u64 {
    3600
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.auth.token_ttl_secs, 3600);
        assert_eq!(config.database.busy_timeout_secs, 30);
        assert_eq!(config.download.timeout_secs, 3600);
    }

    #[test]
    fn partial_config_deserializes_with_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"auth": {"token_ttl_secs": 60}}"#).unwrap();
        assert_eq!(config.auth.token_ttl_secs, 60);
        assert_eq!(config.download.download_dir, PathBuf::from("./downloads"));
    }
}
