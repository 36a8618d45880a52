//! Wire types and the envelope codec
//!
//! An inbound request carries an RSA-wrapped AES-128 session key, a 16-byte IV
//! and an AES-GCM ciphertext with its tag appended. The reply is encrypted with
//! the same session key under the bitwise complement of the request IV.

pub mod codec;

use crate::error::{Error, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Inbound request body exactly as posted by the form platform
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WireEnvelope {
    /// RSA-OAEP wrapped session key, base64
    pub encrypted_aes_key: String,
    /// AES-GCM ciphertext with the tag appended, base64
    pub encrypted_flow_data: String,
    /// Request IV, base64
    pub initial_vector: String,
}

/// Decoded inbound envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    pub wrapped_key: Vec<u8>,
    pub iv: Vec<u8>,
    /// AEAD output; the last 16 bytes are the tag
    pub ciphertext: Vec<u8>,
}

impl EncryptedEnvelope {
    /// Decodes the base64 fields of a wire envelope
    pub fn from_wire(wire: &WireEnvelope) -> Result<Self> {
        let decode = |field: &str, value: &str| {
            BASE64
                .decode(value)
                .map_err(|e| {
                    Error::MalformedEnvelope(format!("{} is not valid base64: {}", field, e))
                })
        };

        Ok(Self {
            wrapped_key: decode("encrypted_aes_key", &wire.encrypted_aes_key)?,
            iv: decode("initial_vector", &wire.initial_vector)?,
            ciphertext: decode("encrypted_flow_data", &wire.encrypted_flow_data)?,
        })
    }

    /// Parses a raw JSON request body
    pub fn from_json(body: &[u8]) -> Result<Self> {
        let wire: WireEnvelope = serde_json::from_slice(body)
            .map_err(|e| Error::MalformedEnvelope(format!("request body: {}", e)))?;
        Self::from_wire(&wire)
    }

    /// Encodes back into the wire representation
    pub fn to_wire(&self) -> WireEnvelope {
        WireEnvelope {
            encrypted_aes_key: BASE64.encode(&self.wrapped_key),
            encrypted_flow_data: BASE64.encode(&self.ciphertext),
            initial_vector: BASE64.encode(&self.iv),
        }
    }
}

/// Session key and request IV recovered from one inbound envelope
///
/// Not `Clone`: encrypting the response consumes it, so one request yields at
/// most one response. Bytes are wiped on drop.
pub struct SessionKeyMaterial {
    key: Vec<u8>,
    iv: Vec<u8>,
}

impl std::fmt::Debug for SessionKeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeyMaterial")
            .field("key", &"<hidden>")
            .field("iv", &"<hidden>")
            .finish()
    }
}

impl SessionKeyMaterial {
    pub(crate) fn new(key: Vec<u8>, iv: Vec<u8>) -> Self {
        Self { key, iv }
    }

    pub(crate) fn key(&self) -> &[u8] {
        &self.key
    }

    pub(crate) fn iv(&self) -> &[u8] {
        &self.iv
    }
}

impl Drop for SessionKeyMaterial {
    fn drop(&mut self) {
        self.key.zeroize();
        self.iv.zeroize();
    }
}

/// Decrypted request body
///
/// Only `action` is interpreted here; `data` is handed to the action parser.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DecryptedPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_token: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl DecryptedPayload {
    /// Reserved action used by the platform's health check
    pub const PING: &'static str = "ping";

    /// True for the zero-side-effect health check
    pub fn is_ping(&self) -> bool {
        self.action == Self::PING
    }
}

/// Result of opening an inbound envelope
#[derive(Debug)]
pub struct OpenedEnvelope {
    pub payload: DecryptedPayload,
    pub session: SessionKeyMaterial,
}

pub use codec::EnvelopeCodec;
