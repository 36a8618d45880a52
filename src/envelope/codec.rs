use crate::crypto::{complement_iv, FlowAead, PrivateKey};
use crate::envelope::{DecryptedPayload, EncryptedEnvelope, OpenedEnvelope, SessionKeyMaterial};
use crate::error::{Error, Result};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use log::debug;
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use zeroize::Zeroize;

/// Opens inbound envelopes and seals responses
///
/// Holds only the long-lived private key; all per-request material lives in
/// the returned [`SessionKeyMaterial`].
#[derive(Debug, Clone)]
pub struct EnvelopeCodec {
    private_key: Arc<PrivateKey>,
    aead: FlowAead,
}

impl EnvelopeCodec {
    /// Creates a codec around the service's private key
    pub fn new(private_key: Arc<PrivateKey>) -> Self {
        Self {
            private_key,
            aead: FlowAead::new(),
        }
    }

    /// Unwraps the session key, verifies and decrypts the payload
    pub fn decrypt(&self, envelope: &EncryptedEnvelope) -> Result<OpenedEnvelope> {
        counter!("flow.envelope.decrypt", 1);

        let key = self.private_key.unwrap_key(&envelope.wrapped_key)?;
        let session = SessionKeyMaterial::new(key, envelope.iv.clone());

        let mut plaintext = self
            .aead
            .open(session.key(), session.iv(), &envelope.ciphertext)?;

        let payload = serde_json::from_slice::<DecryptedPayload>(&plaintext)
            .map_err(|e| Error::MalformedEnvelope(format!("decrypted payload: {}", e)));
        plaintext.zeroize();
        let payload = payload?;

        debug!("opened envelope, action={:?}", payload.action);
        Ok(OpenedEnvelope { payload, session })
    }

    /// Seals a response under the complemented request IV
    ///
    /// Returns `base64(ciphertext || tag)`, the raw HTTP response body.
    pub fn encrypt<T: Serialize + ?Sized>(
        &self,
        response: &T,
        session: SessionKeyMaterial,
    ) -> Result<String> {
        encrypt_response(&self.aead, response, session)
    }
}

/// Seals `response` with the session key and `!iv`
pub fn encrypt_response<T: Serialize + ?Sized>(
    aead: &FlowAead,
    response: &T,
    session: SessionKeyMaterial,
) -> Result<String> {
    counter!("flow.envelope.encrypt", 1);

    let body = serde_json::to_vec(response)?;
    let mut response_iv = complement_iv(session.iv());
    let sealed = aead.seal(session.key(), &response_iv, &body);
    response_iv.zeroize();

    Ok(BASE64.encode(sealed?))
}
