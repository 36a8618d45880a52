use crate::error::{Error, Result};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use std::path::Path;

/// The service's RSA private key, used to unwrap inbound session keys
///
/// Loaded once at startup from PEM. Unwrapping uses OAEP with SHA-256 as both
/// the label digest and the MGF1 digest.
#[derive(Clone)]
pub struct PrivateKey {
    inner: RsaPrivateKey,
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKey")
            .field("key", &"<hidden>")
            .finish()
    }
}

impl PrivateKey {
    /// Parses a PKCS#8 (`BEGIN PRIVATE KEY`) or PKCS#1 (`BEGIN RSA PRIVATE KEY`) PEM
    pub fn from_pem(pem: &str) -> Result<Self> {
        let inner = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| Error::Config(format!("Unable to parse RSA private key: {}", e)))?;

        Ok(Self { inner })
    }

    /// Reads and parses a PEM file
    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self> {
        let pem = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!(
                "Unable to read private key {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_pem(&pem)
    }

    /// Wraps an already parsed key
    pub fn from_rsa(inner: RsaPrivateKey) -> Self {
        Self { inner }
    }

    /// Returns the matching public key, as handed to the form platform
    pub fn public_key(&self) -> RsaPublicKey {
        self.inner.to_public_key()
    }

    /// Recovers a session key wrapped with RSA-OAEP-SHA256
    pub fn unwrap_key(&self, wrapped: &[u8]) -> Result<Vec<u8>> {
        self.inner
            .decrypt(Oaep::new::<Sha256>(), wrapped)
            .map_err(|e| Error::KeyRecoveryFailed(e.to_string()))
    }
}
