use std::time::Duration;
use thiserror::Error;

/// Result type for flowexchange operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline stage an error belongs to.
///
/// Only [`ErrorStage::Envelope`] failures may surface as a plain transport
/// error, since no session key exists yet to encrypt a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorStage {
    /// Inbound envelope could not be opened
    Envelope,
    /// Attachment download, verification or decryption
    Media,
    /// Payload interpretation and external collaborators
    Business,
    /// Anything else, including response encryption
    Internal,
}

impl ErrorStage {
    /// Short label used for logs and metric labels
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorStage::Envelope => "envelope",
            ErrorStage::Media => "media",
            ErrorStage::Business => "business",
            ErrorStage::Internal => "internal",
        }
    }
}

/// Errors that can occur in the exchange pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// Envelope fields were not valid base64 or had impossible lengths
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The wrapped session key could not be recovered with the private key
    #[error("Key recovery failed: {0}")]
    KeyRecoveryFailed(String),

    /// The AEAD authentication tag did not verify
    #[error("Envelope integrity check failed")]
    IntegrityFailed,

    /// Attachment encryption metadata was missing or not valid base64
    #[error("Malformed media metadata: {0}")]
    MalformedMetadata(String),

    /// The encrypted attachment could not be fetched from the media host
    #[error("Media download failed: {0}")]
    MediaDownload(String),

    /// SHA-256 of the downloaded blob did not match the published digest
    #[error("Encrypted media digest mismatch")]
    EncryptedIntegrityMismatch,

    /// Truncated HMAC over `iv || ciphertext` did not match the blob trailer
    #[error("Media MAC mismatch")]
    MacMismatch,

    /// PKCS#7 padding on the decrypted media was invalid
    #[error("Invalid padding: {0}")]
    InvalidPadding(String),

    /// SHA-256 of the decrypted media did not match the published digest
    #[error("Plaintext media digest mismatch")]
    PlaintextIntegrityMismatch,

    /// The media worker went away without replying
    #[error("Media worker failure: {0}")]
    WorkerFailure(String),

    /// The media worker did not reply in time
    #[error("Media worker timed out after {0:?}")]
    WorkerTimeout(Duration),

    /// The decrypted payload did not carry the fields its action needs
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// The decrypted payload named an action this service does not handle
    #[error("Unsupported action: {0}")]
    UnsupportedAction(String),

    /// The attendance store or artifact store failed
    #[error("Persistence failure: {0}")]
    DownstreamPersistenceFailure(String),

    /// The time engine could not classify the attendance event
    #[error("Classification failure: {0}")]
    ClassificationFailure(String),

    /// Errors related to cryptographic operations outside the inbound checks
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Errors related to configuration and key loading
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to JSON serialization/deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors related to I/O operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// General internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns the pipeline stage this error belongs to
    pub fn stage(&self) -> ErrorStage {
        match self {
            Error::MalformedEnvelope(_) | Error::KeyRecoveryFailed(_) | Error::IntegrityFailed => {
                ErrorStage::Envelope
            }
            Error::MalformedMetadata(_)
            | Error::MediaDownload(_)
            | Error::EncryptedIntegrityMismatch
            | Error::MacMismatch
            | Error::InvalidPadding(_)
            | Error::PlaintextIntegrityMismatch
            | Error::WorkerFailure(_)
            | Error::WorkerTimeout(_) => ErrorStage::Media,
            Error::InvalidPayload(_)
            | Error::UnsupportedAction(_)
            | Error::DownstreamPersistenceFailure(_)
            | Error::ClassificationFailure(_) => ErrorStage::Business,
            Error::Crypto(_)
            | Error::Config(_)
            | Error::Json(_)
            | Error::Io(_)
            | Error::Internal(_) => ErrorStage::Internal,
        }
    }

    /// True when the error happened before a session key was recovered
    pub fn is_transport_level(&self) -> bool {
        self.stage() == ErrorStage::Envelope
    }

    /// Stable variant name for logs; never includes payload contents
    pub fn kind(&self) -> &'static str {
        match self {
            Error::MalformedEnvelope(_) => "MalformedEnvelope",
            Error::KeyRecoveryFailed(_) => "KeyRecoveryFailed",
            Error::IntegrityFailed => "IntegrityFailed",
            Error::MalformedMetadata(_) => "MalformedMetadata",
            Error::MediaDownload(_) => "MediaDownload",
            Error::EncryptedIntegrityMismatch => "EncryptedIntegrityMismatch",
            Error::MacMismatch => "MacMismatch",
            Error::InvalidPadding(_) => "InvalidPadding",
            Error::PlaintextIntegrityMismatch => "PlaintextIntegrityMismatch",
            Error::WorkerFailure(_) => "WorkerFailure",
            Error::WorkerTimeout(_) => "WorkerTimeout",
            Error::InvalidPayload(_) => "InvalidPayload",
            Error::UnsupportedAction(_) => "UnsupportedAction",
            Error::DownstreamPersistenceFailure(_) => "DownstreamPersistenceFailure",
            Error::ClassificationFailure(_) => "ClassificationFailure",
            Error::Crypto(_) => "Crypto",
            Error::Config(_) => "Config",
            Error::Json(_) => "Json",
            Error::Io(_) => "Io",
            Error::Internal(_) => "Internal",
        }
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for Error {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Error::Internal(err.to_string())
    }
}
