use rand::{rngs::OsRng, RngCore};

/// AES-128 key size in bytes
pub const FLOW_KEY_SIZE: usize = 16;

/// IV size used by the form platform for GCM
pub const FLOW_IV_SIZE: usize = 16;

/// GCM authentication tag size, appended to every ciphertext
pub const FLOW_TAG_SIZE: usize = 16;

/// Fills a buffer with random bytes using a cryptographically secure RNG
pub fn fill_random(buffer: &mut [u8]) {
    OsRng.fill_bytes(buffer);
}

/// Derives the response IV by flipping every bit of the request IV
pub fn complement_iv(iv: &[u8]) -> Vec<u8> {
    iv.iter().map(|b| b ^ 0xFF).collect()
}
