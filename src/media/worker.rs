use crate::config::{DEFAULT_WORKER_POOL_SIZE, DEFAULT_WORKER_TIMEOUT};
use crate::error::{Error, Result};
use crate::media::{
    decrypt_media, EncryptedMediaBlob, MediaIntegrityMetadata, PlaintextDigestPolicy,
};

use log::{debug, error};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Semaphore};

/// Bounded pool that runs media decryption off the async executor
///
/// Each job runs on tokio's blocking thread pool and replies over a oneshot
/// channel. At most `size` jobs run at once; the rest wait for a permit. A job
/// that panics surfaces as [`Error::WorkerFailure`], one that does not reply
/// within the timeout as [`Error::WorkerTimeout`]. The timeout covers waiting
/// for a permit as well as the work itself.
#[derive(Debug, Clone)]
pub struct MediaWorkerPool {
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl Default for MediaWorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_WORKER_POOL_SIZE, DEFAULT_WORKER_TIMEOUT)
    }
}

impl MediaWorkerPool {
    /// Creates a pool running at most `size` jobs concurrently
    pub fn new(size: usize, timeout: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(size.max(1))),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Verifies and decrypts `blob` on a worker
    pub async fn decrypt(
        &self,
        blob: EncryptedMediaBlob,
        metadata: MediaIntegrityMetadata,
        policy: PlaintextDigestPolicy,
    ) -> Result<Vec<u8>> {
        self.submit(move || decrypt_media(&blob, metadata, policy)).await
    }

    pub(crate) async fn submit<F>(&self, job: F) -> Result<Vec<u8>>
    where
        F: FnOnce() -> Result<Vec<u8>> + Send + 'static,
    {
        match tokio::time::timeout(self.timeout, self.run(job)).await {
            Ok(result) => result,
            Err(_) => {
                error!("media worker did not reply within {:?}", self.timeout);
                Err(Error::WorkerTimeout(self.timeout))
            }
        }
    }

    async fn run<F>(&self, job: F) -> Result<Vec<u8>>
    where
        F: FnOnce() -> Result<Vec<u8>> + Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| Error::WorkerFailure(e.to_string()))?;

        let (tx, rx) = oneshot::channel();

        // The permit is released when the job finishes, even if the caller
        // has already given up on it.
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let result = job();
            if tx.send(result).is_err() {
                debug!("media worker reply dropped, caller went away");
            }
        });

        match rx.await {
            Ok(result) => result,
            Err(_) => {
                error!("media worker exited without replying");
                Err(Error::WorkerFailure("worker exited without replying".into()))
            }
        }
    }
}
