// src/utils/crypto.rs
//! Content addressing for certificates.
//!
//! Uses Keccak-256 (Ethereum's standard hash function), so a certificate hash
//! has the same shape as the `bytes32` keys of the ledger contract.

use crate::models::certificate::{CertificateHash, CertificateInput};
use chrono::SecondsFormat;
use ethers::utils::keccak256;

/// Separator between fields of the canonical certificate string.
pub const FIELD_DELIMITER: &str = "|";

/// Computes a Keccak-256 hash of the input data.
pub fn hash_data(data: &[u8]) -> [u8; 32] {
    keccak256(data)
}

/// Canonical string of a certificate's immutable fields.
///
/// Field order: student name, course name, completion date, instructor name,
/// student id, course id. The completion date is rendered as RFC 3339 UTC with
/// millisecond precision and a `Z` suffix.
pub fn canonical_form(input: &CertificateInput) -> String {
    let completion_date = input
        .completion_date
        .to_rfc3339_opts(SecondsFormat::Millis, true);
    [
        input.student_name.as_str(),
        input.course_name.as_str(),
        completion_date.as_str(),
        input.instructor_name.as_str(),
        input.student_id.as_str(),
        input.course_id.as_str(),
    ]
    .join(FIELD_DELIMITER)
}

/// Content address of a certificate. Pure: never reads the clock.
pub fn compute_certificate_hash(input: &CertificateInput) -> CertificateHash {
    CertificateHash::from_digest(hash_data(canonical_form(input).as_bytes()))
}
