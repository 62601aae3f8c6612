// src/models/certificate.rs
//! Course-completion certificate data model.
//!
//! Defines the locally stored [`Certificate`], the ledger's
//! [`LedgerCertificate`], the rendered [`CertificateView`] handed back by
//! validation, and the [`CertificateHash`] content address that ties them
//! together.

use crate::error::{CertificateError, CertificateResult};
use crate::storage::document_store::Record;
use chrono::{DateTime, Utc};
use ethers::types::H256;
use ethers::utils::hex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Collection owned by the certificate registry.
pub const CERTIFICATES: &str = "certificates";

/// 32-byte content address of a certificate.
///
/// Rendered as `0x` followed by 64 lowercase hex digits, which is also the
/// only textual form accepted on parse (hex digits may be either case).
/// The same form keys certificates on the ledger (`bytes32`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CertificateHash(H256);

impl CertificateHash {
    /// Wraps a raw digest.
    pub fn from_digest(digest: [u8; 32]) -> Self {
        CertificateHash(H256::from(digest))
    }

    /// The digest as the contract's `bytes32` argument.
    pub fn as_h256(&self) -> H256 {
        self.0
    }
}

impl FromStr for CertificateHash {
    type Err = CertificateError;

    fn from_str(s: &str) -> CertificateResult<Self> {
        let digits = s
            .strip_prefix("0x")
            .filter(|d| d.len() == 64 && d.bytes().all(|b| b.is_ascii_hexdigit()))
            .ok_or_else(|| {
                CertificateError::Validation(format!(
                    "`{s}` is not 0x followed by 64 hex digits"
                ))
            })?;
        let bytes = hex::decode(digits)
            .map_err(|e| CertificateError::Validation(format!("`{s}`: {e}")))?;
        Ok(CertificateHash(H256::from_slice(&bytes)))
    }
}

impl TryFrom<String> for CertificateHash {
    type Error = CertificateError;

    fn try_from(value: String) -> CertificateResult<Self> {
        value.parse()
    }
}

impl From<CertificateHash> for String {
    fn from(hash: CertificateHash) -> Self {
        hash.to_string()
    }
}

impl fmt::Display for CertificateHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

impl fmt::Debug for CertificateHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CertificateHash({self})")
    }
}

/// Caller-supplied fields of a certificate, before issuance.
///
/// `completion_date` is captured once by the caller; the same value is hashed
/// and stored.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CertificateInput {
    pub student_id: String,
    pub course_id: String,
    pub student_name: String,
    pub course_name: String,
    pub completion_date: DateTime<Utc>,
    pub instructor_name: String,
}

/// A course-completion credential as persisted in the `certificates` collection.
///
/// Immutable once written. `certificate_hash` is computed at issuance from the
/// other immutable fields and is never recomputed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    /// Store-local id, assigned on insert.
    #[serde(default)]
    pub id: u64,
    pub student_id: String,
    pub course_id: String,
    pub student_name: String,
    pub course_name: String,
    pub completion_date: DateTime<Utc>,
    pub instructor_name: String,
    pub certificate_hash: CertificateHash,
}

impl Certificate {
    /// Builds an unsaved record (id 0) from its input and content address.
    pub fn new(input: CertificateInput, certificate_hash: CertificateHash) -> Self {
        Certificate {
            id: 0,
            student_id: input.student_id,
            course_id: input.course_id,
            student_name: input.student_name,
            course_name: input.course_name,
            completion_date: input.completion_date,
            instructor_name: input.instructor_name,
            certificate_hash,
        }
    }

    pub fn view(&self) -> CertificateView {
        CertificateView {
            student_name: self.student_name.clone(),
            course_name: self.course_name.clone(),
            completion_date: self.completion_date,
            instructor_name: self.instructor_name.clone(),
            certificate_hash: self.certificate_hash,
        }
    }
}

impl Record for Certificate {
    const COLLECTION: &'static str = CERTIFICATES;

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    fn validate(&self) -> CertificateResult<()> {
        let required = [
            ("studentId", &self.student_id),
            ("courseId", &self.course_id),
            ("studentName", &self.student_name),
            ("courseName", &self.course_name),
        ];
        match required.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(CertificateError::Schema {
                collection: CERTIFICATES.to_string(),
                reason: format!("`{field}` must not be empty"),
            }),
            None => Ok(()),
        }
    }
}

/// A certificate as recorded by the external registry contract.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerCertificate {
    pub recipient_name: String,
    pub course_name: String,
    /// Seconds since the Unix epoch.
    pub issue_date: u64,
    pub issuer_name: String,
    pub is_valid: bool,
}

impl LedgerCertificate {
    /// Issue date as a UTC timestamp; out-of-range values collapse to the epoch.
    pub fn issued_at(&self) -> DateTime<Utc> {
        i64::try_from(self.issue_date)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or_default()
    }
}

/// The rendered record returned by certificate validation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CertificateView {
    pub student_name: String,
    pub course_name: String,
    pub completion_date: DateTime<Utc>,
    pub instructor_name: String,
    pub certificate_hash: CertificateHash,
}

impl CertificateView {
    /// Renders a ledger record looked up under `hash`.
    pub fn from_ledger(hash: CertificateHash, record: &LedgerCertificate) -> Self {
        CertificateView {
            student_name: record.recipient_name.clone(),
            course_name: record.course_name.clone(),
            completion_date: record.issued_at(),
            instructor_name: record.issuer_name.clone(),
            certificate_hash: hash,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "0x1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef";

    #[test]
    fn test_hash_parse_and_render() {
        let hash: CertificateHash = HASH.parse().unwrap();
        assert_eq!(hash.to_string(), HASH);

        let upper = format!("0x{}", HASH[2..].to_uppercase());
        assert_eq!(upper.parse::<CertificateHash>().unwrap(), hash);
    }

    #[test]
    fn test_hash_rejects_malformed_identifiers() {
        let too_long = format!("{HASH}00");
        let not_hex = format!("0x{}", "g".repeat(64));
        let upper_prefix = format!("0X{}", &HASH[2..]);
        let cases: [&str; 7] = [
            "not-a-hash",
            "",
            &HASH[2..],
            &HASH[..65],
            too_long.as_str(),
            not_hex.as_str(),
            upper_prefix.as_str(),
        ];
        for bad in cases {
            let err = bad.parse::<CertificateHash>().unwrap_err();
            assert!(matches!(err, CertificateError::Validation(_)), "{bad}");
        }
    }

    #[test]
    fn test_certificate_persists_camel_case_fields() {
        let certificate = Certificate {
            id: 7,
            student_id: "s1".into(),
            course_id: "c1".into(),
            student_name: "Ann".into(),
            course_name: "CS101".into(),
            completion_date: "2024-01-01T00:00:00Z".parse().unwrap(),
            instructor_name: "Dr. X".into(),
            certificate_hash: HASH.parse().unwrap(),
        };

        let value = serde_json::to_value(&certificate).unwrap();
        assert_eq!(value["studentId"], "s1");
        assert_eq!(value["certificateHash"], HASH);
        assert_eq!(value["id"], 7);

        let decoded: Certificate = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, certificate);
    }

    #[test]
    fn test_validate_rejects_blank_fields() {
        let mut certificate = Certificate::new(
            CertificateInput {
                student_id: "s1".into(),
                course_id: " ".into(),
                student_name: "Ann".into(),
                course_name: "CS101".into(),
                completion_date: Utc::now(),
                instructor_name: "Dr. X".into(),
            },
            HASH.parse().unwrap(),
        );
        assert!(matches!(
            certificate.validate(),
            Err(CertificateError::Schema { .. })
        ));

        certificate.course_id = "c1".into();
        assert!(certificate.validate().is_ok());
    }

    #[test]
    fn test_view_from_ledger_record() {
        let record = LedgerCertificate {
            recipient_name: "Ann".into(),
            course_name: "CS101".into(),
            issue_date: 1_704_067_200,
            issuer_name: "Dr. X".into(),
            is_valid: true,
        };
        let view = CertificateView::from_ledger(HASH.parse().unwrap(), &record);

        assert_eq!(view.student_name, "Ann");
        assert_eq!(view.instructor_name, "Dr. X");
        assert_eq!(view.completion_date.to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }
}
