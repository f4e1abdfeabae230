//! Bundle downloads to the scratch directory.
//!
//! Bytes are streamed into `<destination>.part` and renamed into place once
//! the body has been fully written, so a failed transfer never leaves a
//! truncated bundle under the final name.

use crate::config::NetworkConfig;
use crate::network::client::{extract_domain, HttpClient};
use crate::{MarketError, Result};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Streams remote payloads to disk.
pub struct DownloadManager {
    http: Arc<HttpClient>,
    temp_suffix: String,
    /// A stalled transfer fails after this much silence.
    read_timeout: Duration,
}

impl DownloadManager {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self {
            http,
            temp_suffix: NetworkConfig::DOWNLOAD_TEMP_SUFFIX.to_string(),
            read_timeout: NetworkConfig::READ_TIMEOUT,
        }
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Download `url` to `destination`, returning the number of bytes written.
    pub async fn download(&self, url: &str, destination: &Path) -> Result<u64> {
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| MarketError::io_with_path(e, parent))?;
        }

        let temp_path = PathBuf::from(format!("{}{}", destination.display(), self.temp_suffix));

        match self.do_download(url, &temp_path).await {
            Ok(bytes) => {
                if let Err(e) = tokio::fs::rename(&temp_path, destination).await {
                    let _ = tokio::fs::remove_file(&temp_path).await;
                    return Err(MarketError::Io {
                        message: format!("Failed to move download to final destination: {}", e),
                        path: Some(destination.to_path_buf()),
                        source: Some(e),
                    });
                }
                info!("Downloaded {} bytes to {}", bytes, destination.display());
                Ok(bytes)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&temp_path).await;
                Err(e)
            }
        }
    }

    async fn do_download(&self, url: &str, temp_path: &Path) -> Result<u64> {
        let response = tokio::time::timeout(self.read_timeout, self.http.get_stream(url))
            .await
            .map_err(|_| self.stalled(url))??;
        let started = Instant::now();

        let mut file = tokio::fs::File::create(temp_path)
            .await
            .map_err(|e| MarketError::io_with_path(e, temp_path))?;

        let mut bytes_downloaded: u64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = tokio::time::timeout(self.read_timeout, stream.next())
            .await
            .map_err(|_| self.stalled(url))?
        {
            let chunk = chunk.map_err(|e| MarketError::DownloadFailed {
                url: url.to_string(),
                message: format!("Error reading download stream: {}", e),
            })?;

            file.write_all(&chunk)
                .await
                .map_err(|e| MarketError::io_with_path(e, temp_path))?;
            bytes_downloaded += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| MarketError::io_with_path(e, temp_path))?;

        debug!(
            "Fetched {} bytes from {} in {:?}",
            bytes_downloaded,
            extract_domain(url),
            started.elapsed()
        );
        Ok(bytes_downloaded)
    }

    fn stalled(&self, url: &str) -> MarketError {
        MarketError::Timeout(format!(
            "No data from {} for {} seconds",
            extract_domain(url),
            self.read_timeout.as_secs_f32()
        ))
    }
}
