// src/services/verification_gateway.rs
//! Certificate verification service.
//!
//! Reconciles the local registry and the ledger into one outcome. Sources are
//! consulted in precedence order (local first, ledger second); the first
//! source holding the certificate wins. When none does, the last source
//! consulted, which is the authoritative ledger, decides between `INVALID`
//! (a conclusive "no") and `UNKNOWN` (the check itself failed).
//!
//! ```text
//! PENDING ──sample id──────────────▶ VALID
//!    │────malformed id─────────────▶ INVALID
//!    │────found by a source────────▶ VALID
//!    │────last source says no──────▶ INVALID
//!    └────last source failed───────▶ UNKNOWN
//! ```

use crate::error::{CertificateError, CertificateResult};
use crate::models::certificate::{CertificateHash, CertificateView};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Identifier accepted without consulting any source, for onboarding demos.
pub const SAMPLE_CERTIFICATE_HASH: &str =
    "0x1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef";

/// A place certificates can be looked up by content address.
#[async_trait]
pub trait CertificateSource: Send + Sync {
    /// Short label used in logs and reports.
    fn name(&self) -> &'static str;

    /// Returns the rendered certificate stored under `hash`, if any.
    async fn find(&self, hash: &CertificateHash) -> CertificateResult<Option<CertificateView>>;
}

/// Verification states. `Pending` is the only non-terminal one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationState {
    Pending,
    Valid,
    Invalid,
    Unknown,
}

impl VerificationState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, VerificationState::Pending)
    }
}

impl fmt::Display for VerificationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VerificationState::Pending => "PENDING",
            VerificationState::Valid => "VALID",
            VerificationState::Invalid => "INVALID",
            VerificationState::Unknown => "UNKNOWN",
        };
        f.write_str(label)
    }
}

/// Terminal result of a verification.
#[derive(Debug)]
pub enum VerificationOutcome {
    /// Confirmed by the named source (`"sample"`, `"local"` or `"ledger"`).
    Valid {
        source: &'static str,
        certificate: CertificateView,
    },
    /// Conclusively not a valid certificate.
    Invalid { reason: CertificateError },
    /// The check could not be completed.
    Unknown { reason: CertificateError },
}

impl VerificationOutcome {
    pub fn state(&self) -> VerificationState {
        match self {
            VerificationOutcome::Valid { .. } => VerificationState::Valid,
            VerificationOutcome::Invalid { .. } => VerificationState::Invalid,
            VerificationOutcome::Unknown { .. } => VerificationState::Unknown,
        }
    }

    fn from_error(reason: CertificateError) -> Self {
        if reason.is_inconclusive() {
            VerificationOutcome::Unknown { reason }
        } else {
            VerificationOutcome::Invalid { reason }
        }
    }
}

/// A verification request that has not been resolved yet.
///
/// Resolving consumes the request, so a request reaches exactly one
/// terminal state.
#[derive(Debug)]
pub struct PendingVerification {
    identifier: String,
}

impl PendingVerification {
    pub fn new(identifier: impl Into<String>) -> Self {
        PendingVerification {
            identifier: identifier.into(),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn state(&self) -> VerificationState {
        VerificationState::Pending
    }

    pub fn resolve(self, outcome: VerificationOutcome) -> Verification {
        info!(
            "Verification of {}: {} -> {}",
            self.identifier,
            VerificationState::Pending,
            outcome.state()
        );
        Verification {
            identifier: self.identifier,
            outcome,
        }
    }
}

/// A resolved verification.
#[derive(Debug)]
pub struct Verification {
    identifier: String,
    outcome: VerificationOutcome,
}

impl Verification {
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn state(&self) -> VerificationState {
        self.outcome.state()
    }

    pub fn outcome(&self) -> &VerificationOutcome {
        &self.outcome
    }

    /// Serializable summary for callers.
    pub fn report(&self) -> VerificationReport {
        let (source, certificate, reason) = match &self.outcome {
            VerificationOutcome::Valid {
                source,
                certificate,
            } => (Some(*source), Some(certificate.clone()), None),
            VerificationOutcome::Invalid { reason } | VerificationOutcome::Unknown { reason } => {
                (None, None, Some(reason.to_string()))
            }
        };
        VerificationReport {
            identifier: self.identifier.clone(),
            state: self.state(),
            source,
            certificate,
            reason,
        }
    }
}

/// Rendered verification result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub identifier: String,
    pub state: VerificationState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<CertificateView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Verification gateway over an ordered list of certificate sources.
pub struct VerificationGateway {
    /// Sources in precedence order
    sources: Vec<Arc<dyn CertificateSource>>,
    /// Reserved demo identifier, if enabled
    sample: Option<CertificateHash>,
}

impl VerificationGateway {
    /// Gateway consulting `local` first and `ledger` second, with the default
    /// sample identifier enabled.
    pub fn new(local: Arc<dyn CertificateSource>, ledger: Arc<dyn CertificateSource>) -> Self {
        VerificationGateway {
            sources: vec![local, ledger],
            sample: SAMPLE_CERTIFICATE_HASH.parse().ok(),
        }
    }

    /// Replaces the reserved sample identifier; `None` disables it.
    pub fn with_sample(mut self, sample: Option<CertificateHash>) -> Self {
        self.sample = sample;
        self
    }

    /// Verifies an externally supplied identifier.
    pub async fn verify(&self, identifier: &str) -> Verification {
        let request = PendingVerification::new(identifier);
        let outcome = self.evaluate(request.identifier()).await;
        request.resolve(outcome)
    }

    async fn evaluate(&self, identifier: &str) -> VerificationOutcome {
        if let Some(sample) = self.sample.filter(|s| s.to_string() == identifier) {
            debug!("Sample certificate {} requested", identifier);
            return VerificationOutcome::Valid {
                source: "sample",
                certificate: sample_certificate(sample),
            };
        }

        let hash: CertificateHash = match identifier.parse() {
            Ok(hash) => hash,
            Err(reason) => return VerificationOutcome::Invalid { reason },
        };

        let mut outcome = VerificationOutcome::Invalid {
            reason: CertificateError::NotFound(identifier.to_string()),
        };
        for source in &self.sources {
            match source.find(&hash).await {
                Ok(Some(certificate)) => {
                    return VerificationOutcome::Valid {
                        source: source.name(),
                        certificate,
                    };
                }
                Ok(None) => {
                    debug!("Certificate {} not held by {} source", hash, source.name());
                    outcome = VerificationOutcome::Invalid {
                        reason: CertificateError::NotFound(identifier.to_string()),
                    };
                }
                Err(e) => {
                    warn!("Lookup of {} in {} source failed: {}", hash, source.name(), e);
                    outcome = VerificationOutcome::from_error(e);
                }
            }
        }
        outcome
    }
}

fn sample_certificate(hash: CertificateHash) -> CertificateView {
    CertificateView {
        student_name: "Sample Student".into(),
        course_name: "Introduction to Blockchain".into(),
        completion_date: Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_default(),
        instructor_name: "Sample Instructor".into(),
        certificate_hash: hash,
    }
}
