//! Request orchestration
//!
//! [`ExchangeOrchestrator::handle`] takes a raw request body through
//! `envelope -> action -> media -> persistence -> classification -> response`.
//! Anything that fails once the session key is known is recovered into an
//! encrypted screen; only envelope failures are returned as errors.

mod handlers;
pub mod screen;

pub use screen::ScreenResponse;

use crate::action::{FlowAction, RejectedAction};
use crate::attendance::{
    FsArtifactStore, LogNotifier, MemoryAttendanceStore, ShiftClock, SystemClock,
};
use crate::config::ExchangeConfig;
use crate::crypto::PrivateKey;
use crate::envelope::{DecryptedPayload, EncryptedEnvelope, EnvelopeCodec, OpenedEnvelope};
use crate::error::{Error, Result};
use crate::exchange::handlers::rejected_response;
use crate::media::{HttpMediaHost, MediaWorkerPool};
use crate::{ArtifactStore, AttendanceStore, Clock, MediaHost, Notifier, TimeEngine};

use log::{debug, warn};
use metrics::counter;
use std::sync::Arc;

/// Composes the envelope codec, the media unit and the attendance collaborators
#[derive(Debug, Clone)]
pub struct ExchangeOrchestrator {
    codec: EnvelopeCodec,
    workers: MediaWorkerPool,
    media_host: Arc<dyn MediaHost>,
    store: Arc<dyn AttendanceStore>,
    artifacts: Arc<dyn ArtifactStore>,
    time_engine: Arc<dyn TimeEngine>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    config: Arc<ExchangeConfig>,
}

impl ExchangeOrchestrator {
    /// Handles one raw request body and returns the raw response body
    ///
    /// `Err` is only returned when no reply can be encrypted: the envelope
    /// could not be opened (see [`Error::is_transport_level`]) or sealing the
    /// reply itself failed.
    pub async fn handle(&self, body: &[u8]) -> Result<String> {
        counter!("flow.exchange.request", 1);

        let OpenedEnvelope { payload, session } = self.open(body).map_err(|e| {
            counter!("flow.envelope.decrypt.failure", 1, "kind" => e.kind());
            warn!("rejecting envelope: {}", e);
            e
        })?;

        let response = self.respond(&payload).await;
        self.codec.encrypt(&response, session)
    }

    fn open(&self, body: &[u8]) -> Result<OpenedEnvelope> {
        let envelope = EncryptedEnvelope::from_json(body)?;
        self.codec.decrypt(&envelope)
    }

    /// Builds the plaintext reply for a decrypted payload; never fails
    pub async fn respond(&self, payload: &DecryptedPayload) -> ScreenResponse {
        let version = payload
            .version
            .clone()
            .unwrap_or_else(|| self.config.flow_version.clone());

        let action = match FlowAction::parse(payload) {
            Ok(action) => action,
            Err(e @ Error::UnsupportedAction(_)) => {
                self.recovered(&e, "parse");
                return ScreenResponse::error(version, payload.screen.clone(), &e);
            }
            Err(e) => match RejectedAction::from_payload(payload) {
                Some(rejected) => {
                    self.recovered(&e, rejected.kind.as_str());
                    return rejected_response(version, payload.screen.clone(), rejected);
                }
                None => {
                    self.recovered(&e, "parse");
                    return ScreenResponse::error(version, payload.screen.clone(), &e);
                }
            },
        };
        debug!("dispatching {} action", action.name());

        match action {
            FlowAction::Ping => ScreenResponse::ping(),
            FlowAction::ManualCheckIn(check_in) => self.manual_check_in(version, check_in).await,
            FlowAction::ManualPunch(punch) => self.manual_punch(version, punch),
            FlowAction::GenericIn(punch) => self.generic_in(version, punch).await,
            FlowAction::GenericOut(punch) => self.generic_out(version, punch).await,
        }
    }

    pub(crate) fn recovered(&self, error: &Error, action: &'static str) {
        counter!(
            "flow.exchange.recovered",
            1,
            "stage" => error.stage().as_str(),
            "action" => action
        );
        warn!("{} action failed, sending failure screen: {}", action, error);
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }
}

/// A builder for ExchangeOrchestrator
///
/// Only the private key is required. Unset collaborators default to an HTTP
/// media host, an in-memory attendance store, a filesystem artifact store,
/// [`ShiftClock`], [`LogNotifier`] and [`SystemClock`].
#[derive(Debug, Default)]
pub struct ExchangeOrchestratorBuilder {
    private_key: Option<Arc<PrivateKey>>,
    config: Option<ExchangeConfig>,
    media_host: Option<Arc<dyn MediaHost>>,
    store: Option<Arc<dyn AttendanceStore>>,
    artifacts: Option<Arc<dyn ArtifactStore>>,
    time_engine: Option<Arc<dyn TimeEngine>>,
    notifier: Option<Arc<dyn Notifier>>,
    clock: Option<Arc<dyn Clock>>,
}

impl ExchangeOrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the key used to unwrap session keys
    pub fn with_private_key(mut self, private_key: Arc<PrivateKey>) -> Self {
        self.private_key = Some(private_key);
        self
    }

    pub fn with_config(mut self, config: ExchangeConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_media_host(mut self, media_host: Arc<dyn MediaHost>) -> Self {
        self.media_host = Some(media_host);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn AttendanceStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_artifact_store(mut self, artifacts: Arc<dyn ArtifactStore>) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    pub fn with_time_engine(mut self, time_engine: Arc<dyn TimeEngine>) -> Self {
        self.time_engine = Some(time_engine);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds the ExchangeOrchestrator
    pub fn build(self) -> Result<ExchangeOrchestrator> {
        let private_key = self
            .private_key
            .ok_or_else(|| Error::Config("private key is required".to_string()))?;
        let config = self.config.unwrap_or_default();

        let media_host: Arc<dyn MediaHost> = match self.media_host {
            Some(host) => host,
            None => Arc::new(
                HttpMediaHost::new(config.media_dir.clone(), config.download_timeout)?
                    .with_max_bytes(config.max_media_bytes),
            ),
        };

        let artifacts: Arc<dyn ArtifactStore> = match self.artifacts {
            Some(artifacts) => artifacts,
            None => {
                let store = FsArtifactStore::new(config.artifact_dir.clone());
                match &config.artifact_base_url {
                    Some(url) => Arc::new(store.with_base_url(url.clone())),
                    None => Arc::new(store),
                }
            }
        };

        Ok(ExchangeOrchestrator {
            codec: EnvelopeCodec::new(private_key),
            workers: MediaWorkerPool::new(config.worker_pool_size, config.worker_timeout),
            media_host,
            store: self
                .store
                .unwrap_or_else(|| Arc::new(MemoryAttendanceStore::new())),
            artifacts,
            time_engine: self.time_engine.unwrap_or_else(|| Arc::new(ShiftClock::new())),
            notifier: self.notifier.unwrap_or_else(|| Arc::new(LogNotifier)),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            config: Arc::new(config),
        })
    }
}
