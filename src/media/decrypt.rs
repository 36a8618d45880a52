use crate::error::{Error, Result};
use crate::media::{
    EncryptedMediaBlob, MediaIntegrityMetadata, PlaintextDigestPolicy, MAC_TAG_SIZE,
    MEDIA_BLOCK_SIZE,
};

use cbc::cipher::{block_padding::NoPadding, BlockDecryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use metrics::{counter, histogram};
use sha2::{Digest, Sha256};
use std::time::Instant;
use subtle::ConstantTimeEq;

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// Verifies and decrypts one downloaded blob
///
/// Checks run in a fixed order and stop at the first failure:
///
/// 1. SHA-256 of the whole blob against the encrypted digest
/// 2. HMAC-SHA256(`iv || ciphertext`), first 10 bytes, against the blob trailer
/// 3. AES-256-CBC decryption
/// 4. PKCS#7 padding removal
/// 5. SHA-256 of the plaintext, when `policy` asks for it
///
/// Synchronous and CPU bound; callers on an async runtime go through
/// [`MediaWorkerPool`](crate::media::MediaWorkerPool).
pub fn decrypt_media(
    blob: &EncryptedMediaBlob,
    metadata: MediaIntegrityMetadata,
    policy: PlaintextDigestPolicy,
) -> Result<Vec<u8>> {
    let start = Instant::now();
    counter!("flow.media.decrypt", 1);

    let result = verify_and_decrypt(blob, &metadata, policy);
    drop(metadata);

    histogram!("flow.media.decrypt.time", start.elapsed());
    if let Err(e) = &result {
        counter!("flow.media.failure", 1, "kind" => e.kind());
    }

    result
}

fn verify_and_decrypt(
    blob: &EncryptedMediaBlob,
    metadata: &MediaIntegrityMetadata,
    policy: PlaintextDigestPolicy,
) -> Result<Vec<u8>> {
    let encrypted_digest = Sha256::digest(blob.as_bytes());
    if !bool::from(encrypted_digest.as_slice().ct_eq(&metadata.encrypted_digest)) {
        return Err(Error::EncryptedIntegrityMismatch);
    }

    let (ciphertext, mac_tag) = blob.split().ok_or(Error::MacMismatch)?;

    let mut mac = <HmacSha256 as Mac>::new_from_slice(&metadata.mac_key)
        .map_err(|e| Error::MalformedMetadata(e.to_string()))?;
    mac.update(&metadata.iv);
    mac.update(ciphertext);
    let expected = mac.finalize().into_bytes();
    if !bool::from(expected[..MAC_TAG_SIZE].ct_eq(mac_tag)) {
        return Err(Error::MacMismatch);
    }

    if ciphertext.is_empty() || ciphertext.len() % MEDIA_BLOCK_SIZE != 0 {
        return Err(Error::InvalidPadding(format!(
            "ciphertext length {} is not a positive multiple of {}",
            ciphertext.len(),
            MEDIA_BLOCK_SIZE
        )));
    }

    let mut plaintext = Aes256CbcDec::new_from_slices(&metadata.encryption_key, &metadata.iv)
        .map_err(|e| Error::MalformedMetadata(e.to_string()))?
        .decrypt_padded_vec_mut::<NoPadding>(ciphertext)
        .map_err(|_| Error::InvalidPadding("ciphertext is not block aligned".into()))?;

    strip_pkcs7(&mut plaintext)?;

    if policy == PlaintextDigestPolicy::Verify {
        let plaintext_digest = Sha256::digest(&plaintext);
        if !bool::from(plaintext_digest.as_slice().ct_eq(&metadata.plaintext_digest)) {
            return Err(Error::PlaintextIntegrityMismatch);
        }
    }

    Ok(plaintext)
}

/// Removes PKCS#7 padding in place
///
/// The last byte declares the pad length; zero or longer than the buffer is
/// rejected. Pad byte values are not otherwise checked.
pub fn strip_pkcs7(buffer: &mut Vec<u8>) -> Result<()> {
    let pad = match buffer.last() {
        Some(&pad) => pad as usize,
        None => return Err(Error::InvalidPadding("empty plaintext".into())),
    };

    if pad == 0 || pad > buffer.len() {
        return Err(Error::InvalidPadding(format!(
            "pad length {} for {} bytes",
            pad,
            buffer.len()
        )));
    }

    buffer.truncate(buffer.len() - pad);
    Ok(())
}
