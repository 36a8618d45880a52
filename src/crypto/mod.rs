//! Cryptographic primitives used by the exchange pipeline
//!
//! - [`FlowAead`]: AES-128-GCM with a 16-byte IV and a detached 16-byte tag
//! - [`PrivateKey`]: RSA-OAEP (SHA-256 digest and MGF1) key unwrap
//! - [`complement_iv`]: the response IV transform

mod aead;
pub mod aes128gcm;
pub mod oaep;

pub use aead::{complement_iv, fill_random, FLOW_IV_SIZE, FLOW_KEY_SIZE, FLOW_TAG_SIZE};
pub use aes128gcm::FlowAead;
pub use oaep::PrivateKey;
