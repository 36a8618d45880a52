use crate::crypto::aead::{FLOW_IV_SIZE, FLOW_KEY_SIZE, FLOW_TAG_SIZE};
use crate::error::{Error, Result};
use aes_gcm::{
    aead::{consts::U16, generic_array::GenericArray, AeadInPlace, KeyInit},
    aes::Aes128,
    AesGcm,
};

/// AES-128-GCM parameterised for the platform's 16-byte IVs
type Aes128Gcm16 = AesGcm<Aes128, U16>;

/// AES-128-GCM as spoken by the form platform
///
/// Ciphertexts on the wire are `body || tag`, with the 16-byte tag split off
/// explicitly before verification. No associated data is used.
#[derive(Default, Debug, Clone, Copy)]
pub struct FlowAead;

impl FlowAead {
    /// Creates a new instance of the AES-128-GCM implementation
    pub fn new() -> Self {
        Self
    }

    fn cipher(key: &[u8]) -> Result<Aes128Gcm16> {
        if key.len() != FLOW_KEY_SIZE {
            return Err(Error::KeyRecoveryFailed(format!(
                "expected a {}-byte session key, got {}",
                FLOW_KEY_SIZE,
                key.len()
            )));
        }

        Aes128Gcm16::new_from_slice(key).map_err(|e| Error::KeyRecoveryFailed(e.to_string()))
    }

    fn check_iv(iv: &[u8]) -> Result<()> {
        if iv.len() != FLOW_IV_SIZE {
            return Err(Error::MalformedEnvelope(format!(
                "expected a {}-byte IV, got {}",
                FLOW_IV_SIZE,
                iv.len()
            )));
        }
        Ok(())
    }

    /// Verifies and decrypts `body || tag`
    pub fn open(&self, key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        Self::check_iv(iv)?;
        if data.len() < FLOW_TAG_SIZE {
            return Err(Error::MalformedEnvelope(
                "ciphertext is shorter than the authentication tag".into(),
            ));
        }

        let cipher = Self::cipher(key)?;
        let (body, tag) = data.split_at(data.len() - FLOW_TAG_SIZE);

        let mut buffer = body.to_vec();
        cipher
            .decrypt_in_place_detached(
                GenericArray::from_slice(iv),
                b"",
                &mut buffer,
                GenericArray::from_slice(tag),
            )
            .map_err(|_| Error::IntegrityFailed)?;

        Ok(buffer)
    }

    /// Encrypts `plaintext` and returns `ciphertext || tag`
    pub fn seal(&self, key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        Self::check_iv(iv).map_err(|e| Error::Crypto(e.to_string()))?;
        let cipher = Self::cipher(key).map_err(|e| Error::Crypto(e.to_string()))?;

        let mut buffer = Vec::with_capacity(plaintext.len() + FLOW_TAG_SIZE);
        buffer.extend_from_slice(plaintext);

        let tag = cipher
            .encrypt_in_place_detached(GenericArray::from_slice(iv), b"", &mut buffer)
            .map_err(|e| Error::Crypto(format!("Encryption failed: {}", e)))?;
        buffer.extend_from_slice(&tag);

        Ok(buffer)
    }
}
