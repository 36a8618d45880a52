//! The form platform's side of the exchange
//!
//! Simulates the counterpart for tests, benches and local tooling: wrap a
//! fresh session key for the service's public key, open the service's
//! replies, and encrypt media the way the platform's upload path does. Not
//! part of the service's supported API.

use crate::crypto::{complement_iv, fill_random, FlowAead, FLOW_IV_SIZE, FLOW_KEY_SIZE};
use crate::envelope::EncryptedEnvelope;
use crate::error::{Error, Result};
use crate::media::{
    EncryptedMediaBlob, WireMediaMetadata, MAC_TAG_SIZE, MEDIA_BLOCK_SIZE, MEDIA_KEY_SIZE,
};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use cbc::cipher::{block_padding::Pkcs7, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use rsa::{Oaep, RsaPublicKey};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// A request as produced by the platform, with the secrets it keeps
#[derive(Debug, Clone)]
pub struct SealedRequest {
    pub envelope: EncryptedEnvelope,
    pub session_key: Vec<u8>,
    pub iv: Vec<u8>,
}

/// Encrypts raw bytes as a request body under a fresh session key and IV
pub fn seal_raw_request(public_key: &RsaPublicKey, plaintext: &[u8]) -> Result<SealedRequest> {
    let mut session_key = vec![0_u8; FLOW_KEY_SIZE];
    let mut iv = vec![0_u8; FLOW_IV_SIZE];
    fill_random(&mut session_key);
    fill_random(&mut iv);

    let wrapped_key = public_key
        .encrypt(&mut rand::thread_rng(), Oaep::new::<Sha256>(), &session_key)
        .map_err(|e| Error::Crypto(format!("Key wrap failed: {}", e)))?;
    let ciphertext = FlowAead::new().seal(&session_key, &iv, plaintext)?;

    Ok(SealedRequest {
        envelope: EncryptedEnvelope {
            wrapped_key,
            iv: iv.clone(),
            ciphertext,
        },
        session_key,
        iv,
    })
}

/// Serializes `payload` to JSON and seals it as a request
pub fn seal_request<T: Serialize + ?Sized>(
    public_key: &RsaPublicKey,
    payload: &T,
) -> Result<SealedRequest> {
    seal_raw_request(public_key, &serde_json::to_vec(payload)?)
}

/// Opens a service reply given the session key and the *request* IV
pub fn open_response<T: DeserializeOwned>(
    body: &str,
    session_key: &[u8],
    request_iv: &[u8],
) -> Result<T> {
    let sealed = BASE64
        .decode(body.trim())
        .map_err(|e| Error::Crypto(format!("response is not valid base64: {}", e)))?;
    let plaintext = FlowAead::new().open(session_key, &complement_iv(request_iv), &sealed)?;
    Ok(serde_json::from_slice(&plaintext)?)
}

/// Encrypts media under fresh keys and returns the blob with its metadata
pub fn seal_media(plaintext: &[u8]) -> Result<(EncryptedMediaBlob, WireMediaMetadata)> {
    let mut encryption_key = [0_u8; MEDIA_KEY_SIZE];
    let mut hmac_key = [0_u8; 32];
    let mut iv = [0_u8; MEDIA_BLOCK_SIZE];
    fill_random(&mut encryption_key);
    fill_random(&mut hmac_key);
    fill_random(&mut iv);

    let ciphertext = Aes256CbcEnc::new_from_slices(&encryption_key, &iv)
        .map_err(|e| Error::Crypto(e.to_string()))?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut mac = <HmacSha256 as Mac>::new_from_slice(&hmac_key)
        .map_err(|e| Error::Crypto(e.to_string()))?;
    mac.update(&iv);
    mac.update(&ciphertext);
    let tag = mac.finalize().into_bytes();

    let mut blob = ciphertext;
    blob.extend_from_slice(&tag[..MAC_TAG_SIZE]);

    let metadata = WireMediaMetadata {
        encryption_key: BASE64.encode(encryption_key),
        hmac_key: BASE64.encode(hmac_key),
        iv: BASE64.encode(iv),
        plaintext_hash: BASE64.encode(Sha256::digest(plaintext)),
        encrypted_hash: BASE64.encode(Sha256::digest(&blob)),
    };

    Ok((EncryptedMediaBlob::new(blob), metadata))
}
