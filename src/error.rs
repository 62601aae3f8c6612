// src/error.rs
//! Error taxonomy for certificate record-keeping.
//!
//! Every component surfaces a [`CertificateError`]; callers decide whether a
//! failure is conclusive ("the certificate is not valid") or inconclusive
//! ("the certificate could not be checked") through
//! [`CertificateError::is_inconclusive`].

use std::time::Duration;

/// Errors raised by the store, the registry, the ledger client and the gateway.
#[derive(Debug, thiserror::Error)]
pub enum CertificateError {
    /// Malformed identifier, hash or storage key.
    #[error("validation failed: {0}")]
    Validation(String),

    /// No certificate or enrollment exists at the consulted source.
    #[error("not found: {0}")]
    NotFound(String),

    /// No provider or wallet is available, or the transport failed.
    #[error("ledger unavailable: {0}")]
    Connectivity(String),

    /// A ledger call did not complete within its deadline.
    #[error("ledger call timed out after {0:?}")]
    Timeout(Duration),

    /// The contract reverted the call.
    #[error("ledger rejected the call: {0}")]
    Rejected(String),

    /// A persisted collection could not be decoded.
    #[error("corrupt collection `{collection}`: {reason}")]
    StorageCorruption { collection: String, reason: String },

    /// A record failed its collection schema at write time.
    #[error("record rejected by collection `{collection}`: {reason}")]
    Schema { collection: String, reason: String },

    /// A certificate already exists for the student/course pair.
    #[error("certificate already issued for student `{student_id}` in course `{course_id}`")]
    DuplicateIssuance { student_id: String, course_id: String },

    /// I/O failure in the storage backend.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CertificateError {
    /// Returns `true` when the failure says nothing about the certificate itself.
    pub fn is_inconclusive(&self) -> bool {
        matches!(
            self,
            CertificateError::Connectivity(_)
                | CertificateError::Timeout(_)
                | CertificateError::StorageCorruption { .. }
                | CertificateError::Io(_)
        )
    }

    pub(crate) fn corruption(collection: &str, reason: impl ToString) -> Self {
        CertificateError::StorageCorruption {
            collection: collection.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result alias used across the crate.
pub type CertificateResult<T> = Result<T, CertificateError>;
