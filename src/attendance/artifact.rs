use crate::error::{Error, Result};
use crate::ArtifactStore;

use async_trait::async_trait;
use log::debug;
use std::path::{Path, PathBuf};

/// Stores decrypted attachments as files under a directory
///
/// Returns `<base_url>/<file_name>` when a base URL is configured, the local
/// path otherwise. Only the final path component of the supplied name is used.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    dir: PathBuf,
    base_url: Option<String>,
}

impl FsArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            base_url: None,
        }
    }

    /// Publishes stored files under `base_url`
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Reduces a client supplied file name to a bare file name
pub fn sanitize_file_name(name: &str) -> Result<String> {
    let candidate = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();

    if candidate.is_empty() || candidate == "." || candidate == ".." {
        return Err(Error::InvalidPayload(format!(
            "unusable attachment file name {:?}",
            name
        )));
    }

    Ok(candidate.to_string())
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn put(&self, file_name: &str, bytes: &[u8]) -> Result<String> {
        let file_name = sanitize_file_name(file_name)?;
        let path = self.dir.join(&file_name);

        let write = async {
            tokio::fs::create_dir_all(&self.dir).await?;
            tokio::fs::write(&path, bytes).await
        };
        write.await.map_err(|e| {
            Error::DownstreamPersistenceFailure(format!(
                "Unable to write {}: {}",
                path.display(),
                e
            ))
        })?;

        debug!("stored {} bytes at {}", bytes.len(), path.display());

        Ok(match &self.base_url {
            Some(base) => format!("{}/{}", base, file_name),
            None => path.display().to_string(),
        })
    }
}
