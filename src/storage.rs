//! File sink storage
//!
//! [`FileStore`] is the seam for the external file-storage collaborator:
//! it hands out writable byte sinks by name and nothing else. The
//! executor streams downloaded bodies into these sinks.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, BufWriter};

use crate::Result;

/// A writable byte sink, closed by the caller
pub type FileSink = Box<dyn AsyncWrite + Send + Unpin>;

/// Opens named sinks for download output
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Open (create or truncate) a sink with the given name
    async fn open_for_write(&self, name: &str) -> Result<FileSink>;
}

/// Filesystem-backed [`FileStore`] rooted at a directory
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    /// Create a store rooted at `root`, creating the directory if needed
    pub async fn new(root: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn open_for_write(&self, name: &str) -> Result<FileSink> {
        let path = self.root.join(name);
        let file = tokio::fs::File::create(&path).await?;
        Ok(Box::new(BufWriter::new(file)))
    }
}
