// src/services/certificate_registry.rs
//! Certificate Registry Service
//!
//! Issues, looks up and lists course-completion certificates held in the
//! local `certificates` collection. The registry is the only writer of that
//! collection.

use crate::error::{CertificateError, CertificateResult};
use crate::models::certificate::{
    Certificate, CertificateHash, CertificateInput, CertificateView, CERTIFICATES,
};
use crate::services::verification_gateway::CertificateSource;
use crate::storage::document_store::{DocumentStore, Filter, Operation};
use crate::utils::crypto::compute_certificate_hash;
use async_trait::async_trait;
use log::info;
use std::sync::{Arc, Mutex, PoisonError};

/// What to do when a certificate already exists for a student/course pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IssuancePolicy {
    /// Return the existing record unchanged.
    #[default]
    Idempotent,
    /// Fail with [`CertificateError::DuplicateIssuance`].
    Strict,
}

/// Service for issuing and retrieving locally stored certificates
pub struct CertificateRegistry {
    /// Store holding the `certificates` collection
    store: Arc<DocumentStore>,

    /// Duplicate handling on issuance
    policy: IssuancePolicy,

    /// Makes the duplicate check and the insert one step
    issue_lock: Mutex<()>,
}

impl CertificateRegistry {
    /// Creates a registry with the idempotent issuance policy
    pub fn new(store: Arc<DocumentStore>) -> Self {
        CertificateRegistry {
            store,
            policy: IssuancePolicy::default(),
            issue_lock: Mutex::new(()),
        }
    }

    pub fn with_policy(mut self, policy: IssuancePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Issues a certificate for `input`
    ///
    /// # Behavior
    /// - If a certificate exists for `(student_id, course_id)`, returns it
    ///   unchanged, or fails under [`IssuancePolicy::Strict`]
    /// - Otherwise computes the content address from `input` (including the
    ///   completion date exactly as supplied), inserts and returns the record
    pub fn issue(&self, input: CertificateInput) -> CertificateResult<Certificate> {
        let _guard = self.issue_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let existing: Vec<Certificate> = self.store.query(
            &Filter::new()
                .field("studentId", input.student_id.as_str())
                .field("courseId", input.course_id.as_str()),
        )?;
        if let Some(certificate) = existing.into_iter().next() {
            return match self.policy {
                IssuancePolicy::Idempotent => {
                    info!(
                        "Certificate {} already issued to {} for {}",
                        certificate.certificate_hash, certificate.student_id, certificate.course_id
                    );
                    Ok(certificate)
                }
                IssuancePolicy::Strict => Err(CertificateError::DuplicateIssuance {
                    student_id: input.student_id,
                    course_id: input.course_id,
                }),
            };
        }

        let certificate_hash = compute_certificate_hash(&input);
        let certificate = Certificate::new(input, certificate_hash);
        let stored = self
            .store
            .execute(Operation::Insert, certificate)?
            .ok_or_else(|| CertificateError::corruption(CERTIFICATES, "insert returned no record"))?;

        info!(
            "Issued certificate {} (id {}) to {} for {}",
            stored.certificate_hash, stored.id, stored.student_id, stored.course_id
        );
        Ok(stored)
    }

    /// Finds the certificate stored under `hash`
    pub fn lookup_by_hash(&self, hash: &CertificateHash) -> CertificateResult<Option<Certificate>> {
        let matches: Vec<Certificate> = self
            .store
            .query(&Filter::new().field("certificateHash", hash.to_string()))?;
        Ok(matches.into_iter().next())
    }

    /// All certificates issued to a student
    pub fn list_by_student(&self, student_id: &str) -> CertificateResult<Vec<Certificate>> {
        self.store.query(&Filter::new().field("studentId", student_id))
    }

    /// All certificates issued for a course
    pub fn list_by_course(&self, course_id: &str) -> CertificateResult<Vec<Certificate>> {
        self.store.query(&Filter::new().field("courseId", course_id))
    }
}

#[async_trait]
impl CertificateSource for CertificateRegistry {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn find(&self, hash: &CertificateHash) -> CertificateResult<Option<CertificateView>> {
        Ok(self.lookup_by_hash(hash)?.map(|certificate| certificate.view()))
    }
}
