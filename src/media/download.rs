use crate::config::DEFAULT_MAX_MEDIA_BYTES;
use crate::error::{Error, Result};
use crate::media::EncryptedMediaBlob;
use crate::MediaHost;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Fetches encrypted attachments over HTTP(S)
///
/// The body is streamed chunk by chunk into a temporary file under
/// `media_dir` rather than buffered by the HTTP client, and the download is
/// abandoned once it passes `max_bytes`. The blob is then read back whole, so
/// peak memory per request is bounded by `max_bytes`, not by streaming. The
/// temporary file is removed once the blob has been read back.
#[derive(Debug, Clone)]
pub struct HttpMediaHost {
    client: Client,
    media_dir: PathBuf,
    max_bytes: u64,
}

impl HttpMediaHost {
    /// Creates a host writing temporary files to `media_dir`
    pub fn new(media_dir: impl Into<PathBuf>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Unable to build HTTP client: {}", e)))?;

        Ok(Self::with_client(client, media_dir))
    }

    /// Uses an existing client, e.g. one shared with other outbound calls
    pub fn with_client(client: Client, media_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            media_dir: media_dir.into(),
            max_bytes: DEFAULT_MAX_MEDIA_BYTES,
        }
    }

    /// Caps the size of a single download
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    async fn download_to(&self, url: &str, path: &Path) -> Result<u64> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::MediaDownload(e.to_string()))?;

        if let Some(length) = response.content_length() {
            if length > self.max_bytes {
                return Err(self.too_large(length));
            }
        }

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(path)
            .await?;

        let mut written = 0_u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Error::MediaDownload(e.to_string()))?
        {
            written += chunk.len() as u64;
            if written > self.max_bytes {
                return Err(self.too_large(written));
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        Ok(written)
    }

    fn too_large(&self, bytes: u64) -> Error {
        Error::MediaDownload(format!(
            "attachment exceeds {} bytes (got at least {})",
            self.max_bytes, bytes
        ))
    }
}

#[async_trait]
impl MediaHost for HttpMediaHost {
    async fn fetch(&self, url: &str) -> Result<EncryptedMediaBlob> {
        tokio::fs::create_dir_all(&self.media_dir).await?;

        let temp = tempfile::Builder::new()
            .prefix("flow-media-")
            .suffix(".enc")
            .tempfile_in(&self.media_dir)?;

        let written = self.download_to(url, temp.path()).await?;
        debug!("downloaded {} encrypted bytes to {}", written, temp.path().display());

        let bytes = tokio::fs::read(temp.path()).await?;
        Ok(EncryptedMediaBlob::new(bytes))
    }
}
