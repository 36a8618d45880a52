//! Encrypted media attachments
//!
//! Attachments are downloaded from a media host as `AES-256-CBC(ciphertext) ||
//! HMAC-SHA256(iv || ciphertext)[..10]`. The keys and digests needed to check
//! and open a blob arrive separately, inside the decrypted form payload.

pub mod decrypt;
pub mod download;
pub mod worker;

use crate::error::{Error, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Length of the truncated MAC trailing every blob
pub const MAC_TAG_SIZE: usize = 10;

/// AES-256 key size in bytes
pub const MEDIA_KEY_SIZE: usize = 32;

/// AES block size, which is also the CBC IV size
pub const MEDIA_BLOCK_SIZE: usize = 16;

/// SHA-256 digest size
pub const DIGEST_SIZE: usize = 32;

/// Encryption metadata as it appears in the form payload (all base64)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WireMediaMetadata {
    pub encryption_key: String,
    pub hmac_key: String,
    pub iv: String,
    pub plaintext_hash: String,
    pub encrypted_hash: String,
}

/// One attachment reference from the form payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaAttachment {
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_id: Option<String>,
    pub cdn_url: String,
    pub encryption_metadata: WireMediaMetadata,
}

/// Decoded keys and digests for one blob
///
/// Consumed by [`decrypt::decrypt_media`]; key bytes are wiped on drop.
pub struct MediaIntegrityMetadata {
    pub(crate) encryption_key: Vec<u8>,
    pub(crate) mac_key: Vec<u8>,
    pub(crate) iv: Vec<u8>,
    pub(crate) plaintext_digest: Vec<u8>,
    pub(crate) encrypted_digest: Vec<u8>,
}

impl std::fmt::Debug for MediaIntegrityMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaIntegrityMetadata")
            .field("encryption_key", &"<hidden>")
            .field("mac_key", &"<hidden>")
            .field("iv", &"<hidden>")
            .finish()
    }
}

impl MediaIntegrityMetadata {
    /// Builds metadata from raw bytes, checking fixed lengths
    pub fn new(
        encryption_key: Vec<u8>,
        mac_key: Vec<u8>,
        iv: Vec<u8>,
        plaintext_digest: Vec<u8>,
        encrypted_digest: Vec<u8>,
    ) -> Result<Self> {
        let expect = |name: &str, value: &[u8], len: usize| {
            if value.len() == len {
                Ok(())
            } else {
                Err(Error::MalformedMetadata(format!(
                    "{} must be {} bytes, got {}",
                    name,
                    len,
                    value.len()
                )))
            }
        };
        expect("encryption_key", &encryption_key, MEDIA_KEY_SIZE)?;
        expect("iv", &iv, MEDIA_BLOCK_SIZE)?;
        expect("plaintext_hash", &plaintext_digest, DIGEST_SIZE)?;
        expect("encrypted_hash", &encrypted_digest, DIGEST_SIZE)?;
        if mac_key.is_empty() {
            return Err(Error::MalformedMetadata("hmac_key is empty".into()));
        }

        Ok(Self {
            encryption_key,
            mac_key,
            iv,
            plaintext_digest,
            encrypted_digest,
        })
    }

    /// Decodes the base64 wire form
    pub fn from_wire(wire: &WireMediaMetadata) -> Result<Self> {
        let decode = |field: &str, value: &str| {
            BASE64
                .decode(value)
                .map_err(|e| {
                    Error::MalformedMetadata(format!("{} is not valid base64: {}", field, e))
                })
        };

        Self::new(
            decode("encryption_key", &wire.encryption_key)?,
            decode("hmac_key", &wire.hmac_key)?,
            decode("iv", &wire.iv)?,
            decode("plaintext_hash", &wire.plaintext_hash)?,
            decode("encrypted_hash", &wire.encrypted_hash)?,
        )
    }
}

impl Drop for MediaIntegrityMetadata {
    fn drop(&mut self) {
        self.encryption_key.zeroize();
        self.mac_key.zeroize();
        self.iv.zeroize();
    }
}

/// Raw downloaded bytes: `ciphertext || mac_tag`
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedMediaBlob {
    bytes: Vec<u8>,
}

impl std::fmt::Debug for EncryptedMediaBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedMediaBlob")
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl EncryptedMediaBlob {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// The entire blob, as covered by the encrypted digest
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Splits into `(ciphertext, mac_tag)`, or `None` if shorter than the tag
    pub fn split(&self) -> Option<(&[u8], &[u8])> {
        if self.bytes.len() < MAC_TAG_SIZE {
            return None;
        }
        Some(self.bytes.split_at(self.bytes.len() - MAC_TAG_SIZE))
    }
}

/// Whether to check the plaintext digest after decryption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaintextDigestPolicy {
    Verify,
    #[default]
    Skip,
}

pub use decrypt::decrypt_media;
pub use download::HttpMediaHost;
pub use worker::MediaWorkerPool;
