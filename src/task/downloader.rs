//! Pluggable download strategies.

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::error::DownloadError;
use crate::storage::FileSink;
use crate::types::DownloadType;

/// A download strategy: fetch one source and stream it into a sink
///
/// One implementation per [`DownloadType`] variant; the executor selects
/// the implementation by the task's type tag. Implementations must honor
/// the cancellation token so a stuck transfer can be abandoned.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Fetch the source and write its bytes to `sink`
    ///
    /// Returns the number of bytes written. The sink is flushed by the
    /// caller.
    async fn download(
        &self,
        sink: &mut FileSink,
        cancel: &CancellationToken,
    ) -> Result<u64, DownloadError>;
}

/// Select the downloader for a task's type tag
pub(crate) fn downloader_for(
    client: &reqwest::Client,
    download_type: i32,
    url: &str,
) -> Result<Box<dyn Downloader>, DownloadError> {
    match DownloadType::from_i32(download_type) {
        Some(DownloadType::Http) => Ok(Box::new(HttpDownloader::new(
            client.clone(),
            url.to_string(),
        ))),
        None => Err(DownloadError::UnsupportedType(download_type)),
    }
}

/// HTTP(S) GET strategy: streams the response body into the sink
pub struct HttpDownloader {
    client: reqwest::Client,
    url: String,
}

impl HttpDownloader {
    /// Create a downloader for one URL
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(
        &self,
        sink: &mut FileSink,
        cancel: &CancellationToken,
    ) -> Result<u64, DownloadError> {
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
            response = self.client.get(&self.url).send() => response?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::HttpStatus(status.as_u16()));
        }

        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
                chunk = stream.next() => chunk,
            };

            match chunk {
                None => break,
                Some(Ok(bytes)) => {
                    sink.write_all(&bytes).await?;
                    written += bytes.len() as u64;
                }
                Some(Err(e)) => return Err(DownloadError::Transport(e)),
            }
        }

        Ok(written)
    }
}
