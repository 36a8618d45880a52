use crate::error::{Error, Result};
use crate::media::PlaintextDigestPolicy;

use std::path::PathBuf;
use std::time::Duration;

/// Default values for ExchangeConfig
pub const DEFAULT_FLOW_VERSION: &str = "3.0";
pub const DEFAULT_WORKER_POOL_SIZE: usize = 4;
pub const DEFAULT_WORKER_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_ARTIFACT_DIR: &str = "./media";
pub const DEFAULT_NOTIFICATION_DELAY: Duration = Duration::from_millis(300);
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_MEDIA_BYTES: u64 = 16 * 1024 * 1024;

/// Runtime settings for the exchange pipeline
///
/// Key material is deliberately not part of this struct; see
/// [`PrivateKey`](crate::crypto::PrivateKey).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeConfig {
    /// Version echoed in screen responses when the request carries none
    pub flow_version: String,

    /// Maximum number of concurrent media decryptions
    pub worker_pool_size: usize,

    /// Time allowed for one media decryption, including queueing
    pub worker_timeout: Duration,

    /// Directory for request-scoped download files
    pub media_dir: PathBuf,

    /// Directory decrypted attachments are stored in
    pub artifact_dir: PathBuf,

    /// Public URL prefix for stored attachments
    pub artifact_base_url: Option<String>,

    /// Whether to check the plaintext digest of decrypted media
    pub verify_plaintext_digest: bool,

    /// Pause between consecutive owner notifications
    pub notification_delay: Duration,

    /// Timeout for a single attachment download
    pub download_timeout: Duration,

    /// Largest encrypted attachment accepted from the media host
    pub max_media_bytes: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            flow_version: DEFAULT_FLOW_VERSION.to_string(),
            worker_pool_size: DEFAULT_WORKER_POOL_SIZE,
            worker_timeout: DEFAULT_WORKER_TIMEOUT,
            media_dir: std::env::temp_dir(),
            artifact_dir: PathBuf::from(DEFAULT_ARTIFACT_DIR),
            artifact_base_url: None,
            verify_plaintext_digest: false,
            notification_delay: DEFAULT_NOTIFICATION_DELAY,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            max_media_bytes: DEFAULT_MAX_MEDIA_BYTES,
        }
    }
}

impl ExchangeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads overrides from `FLOW_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads overrides through `lookup`, starting from the defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(version) = lookup("FLOW_VERSION") {
            config.flow_version = version;
        }
        if let Some(size) = parse_var(&lookup, "FLOW_MEDIA_WORKERS")? {
            config = config.with_worker_pool_size(size);
        }
        if let Some(secs) = parse_var(&lookup, "FLOW_MEDIA_TIMEOUT_SECS")? {
            config.worker_timeout = Duration::from_secs(secs);
        }
        if let Some(dir) = lookup("FLOW_MEDIA_DIR") {
            config.media_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("FLOW_ARTIFACT_DIR") {
            config.artifact_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("FLOW_ARTIFACT_BASE_URL") {
            config.artifact_base_url = Some(url);
        }
        if let Some(verify) = parse_var(&lookup, "FLOW_VERIFY_PLAINTEXT_DIGEST")? {
            config.verify_plaintext_digest = verify;
        }
        if let Some(millis) = parse_var(&lookup, "FLOW_NOTIFICATION_DELAY_MS")? {
            config.notification_delay = Duration::from_millis(millis);
        }
        if let Some(secs) = parse_var(&lookup, "FLOW_DOWNLOAD_TIMEOUT_SECS")? {
            config.download_timeout = Duration::from_secs(secs);
        }
        if let Some(bytes) = parse_var(&lookup, "FLOW_MAX_MEDIA_BYTES")? {
            config.max_media_bytes = bytes;
        }

        Ok(config)
    }

    pub fn with_flow_version(mut self, version: impl Into<String>) -> Self {
        self.flow_version = version.into();
        self
    }

    /// Sets the worker pool size; zero is raised to one
    pub fn with_worker_pool_size(mut self, size: usize) -> Self {
        self.worker_pool_size = size.max(1);
        self
    }

    pub fn with_worker_timeout(mut self, timeout: Duration) -> Self {
        self.worker_timeout = timeout;
        self
    }

    pub fn with_media_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.media_dir = dir.into();
        self
    }

    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = dir.into();
        self
    }

    pub fn with_artifact_base_url(mut self, url: impl Into<String>) -> Self {
        self.artifact_base_url = Some(url.into());
        self
    }

    pub fn with_verify_plaintext_digest(mut self, verify: bool) -> Self {
        self.verify_plaintext_digest = verify;
        self
    }

    pub fn with_notification_delay(mut self, delay: Duration) -> Self {
        self.notification_delay = delay;
        self
    }

    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    pub fn with_max_media_bytes(mut self, bytes: u64) -> Self {
        self.max_media_bytes = bytes;
        self
    }

    /// Digest policy handed to the media unit
    pub fn digest_policy(&self) -> PlaintextDigestPolicy {
        if self.verify_plaintext_digest {
            PlaintextDigestPolicy::Verify
        } else {
            PlaintextDigestPolicy::Skip
        }
    }
}

fn parse_var<F, T>(lookup: &F, name: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("{}={:?}: {}", name, raw, e))),
        None => Ok(None),
    }
}
