//! # Flow Exchange
//!
//! Secure exchange pipeline for encrypted attendance form submissions.
//!
//! A chat platform posts each form submission as an envelope: an AES-128 session
//! key wrapped with the service's RSA public key (OAEP, SHA-256), a 16-byte IV,
//! and an AES-GCM ciphertext. `flowexchange` opens the envelope, dispatches on
//! the submitted action, fetches and verifies any attached photo, records the
//! attendance through pluggable stores, and seals the reply under the same
//! session key and the bitwise complement of the request IV.
//!
//! Attached photos arrive separately as `AES-256-CBC || HMAC-SHA256[..10]`
//! blobs. They are checked against a published digest and a truncated MAC
//! before decryption, which runs on a bounded pool of blocking workers.
//!
//! Every failure after the envelope has been opened is turned into an encrypted
//! error screen, because the counterpart is a form UI that must always receive
//! a reply it can decrypt. Only envelope failures surface as plain errors.
//! Writes that complete before a later step fails are kept (at-least-once).
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use flowexchange::config::ExchangeConfig;
//! use flowexchange::crypto::PrivateKey;
//! use flowexchange::exchange::ExchangeOrchestratorBuilder;
//! use std::sync::Arc;
//!
//! # async fn example(body: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
//! // Load the key once at startup; it is never embedded or logged
//! let private_key = Arc::new(PrivateKey::from_pem_file("/run/secrets/flow.pem")?);
//!
//! let orchestrator = ExchangeOrchestratorBuilder::new()
//!     .with_private_key(private_key)
//!     .with_config(ExchangeConfig::from_env()?)
//!     .build()?;
//!
//! // `body` is the raw JSON request; the result is the raw response body
//! let encrypted_reply = orchestrator.handle(body).await?;
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod attendance;
pub mod config;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod exchange;
pub mod media;
#[doc(hidden)]
pub mod platform;
pub mod server;

// Re-export key types
pub use crate::action::FlowAction;
pub use crate::config::ExchangeConfig;
pub use crate::crypto::PrivateKey;
pub use crate::envelope::{DecryptedPayload, EncryptedEnvelope, EnvelopeCodec, SessionKeyMaterial};
pub use crate::error::{Error, ErrorStage, Result};
pub use crate::exchange::{ExchangeOrchestrator, ExchangeOrchestratorBuilder, ScreenResponse};
pub use crate::media::{EncryptedMediaBlob, MediaIntegrityMetadata, MediaWorkerPool};

use crate::attendance::{
    AttendanceRecord, AttendanceStatus, CheckOutClassification, CheckOutUpdate, EmployeeShift,
    NewAttendance, StoreOutcome,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use uuid::Uuid;

/// Source of encrypted attachment blobs
#[async_trait]
pub trait MediaHost: Send + Sync + fmt::Debug {
    /// Downloads the blob behind `url`
    async fn fetch(&self, url: &str) -> Result<EncryptedMediaBlob>;
}

/// Attendance and employee persistence
///
/// Writes are upsert-style; `AlreadyExists` and `NotFound` are outcomes, not
/// errors. Errors should be reported as
/// [`Error::DownstreamPersistenceFailure`].
#[async_trait]
pub trait AttendanceStore: Send + Sync + fmt::Debug {
    /// Loads the shift definition for an employee
    async fn find_employee(&self, employee_id: &str) -> Result<Option<EmployeeShift>>;

    /// Records a check-in
    async fn create_check_in(&self, check_in: NewAttendance) -> Result<StoreOutcome>;

    /// Finds the open attendance for an employee on a local date
    async fn find_open_attendance(
        &self,
        employee_id: &str,
        company_id: &str,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>>;

    /// Closes an open attendance
    async fn record_check_out(
        &self,
        attendance_id: Uuid,
        update: CheckOutUpdate,
    ) -> Result<StoreOutcome>;
}

/// Durable home for decrypted attachments
#[async_trait]
pub trait ArtifactStore: Send + Sync + fmt::Debug {
    /// Stores `bytes` under `file_name` and returns where it can be fetched
    async fn put(&self, file_name: &str, bytes: &[u8]) -> Result<String>;
}

/// Outbound messages to company owners
#[async_trait]
pub trait Notifier: Send + Sync + fmt::Debug {
    /// Sends an image with a caption
    async fn send_image(&self, recipient: &str, url: &str, caption: &str) -> Result<()>;
}

/// Source of the current instant
///
/// Submitted wall-clock times are placed on today's date in the submitted
/// zone; this decides what "today" is.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Attendance status classification
///
/// Implementations must be pure: no I/O, same answer for the same input.
pub trait TimeEngine: Send + Sync + fmt::Debug {
    /// Status for a check-in at `at`
    fn check_in_status(&self, at: DateTime<Utc>, shift: &EmployeeShift) -> Result<AttendanceStatus>;

    /// Status and elapsed time for closing `attendance` at `at`
    fn check_out_status(
        &self,
        at: DateTime<Utc>,
        attendance: &AttendanceRecord,
        shift: &EmployeeShift,
    ) -> Result<CheckOutClassification>;
}
