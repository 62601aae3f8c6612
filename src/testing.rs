// src/testing.rs
//! In-memory stand-ins for the ledger contract, shared by test modules.

use crate::contracts::certificate_contract::LedgerContract;
use crate::error::{CertificateError, CertificateResult};
use crate::models::certificate::LedgerCertificate;
use crate::utils::crypto::hash_data;
use async_trait::async_trait;
use ethers::types::{H256, U256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// How the in-memory ledger answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerBehavior {
    Healthy,
    /// Every call fails with a connectivity error.
    Offline,
    /// Every call sleeps before answering.
    Slow(Duration),
}

/// Contract double recording how often it was called.
pub struct InMemoryLedger {
    certificates: Mutex<HashMap<H256, LedgerCertificate>>,
    calls: AtomicUsize,
    behavior: LedgerBehavior,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::with_behavior(LedgerBehavior::Healthy)
    }

    pub fn with_behavior(behavior: LedgerBehavior) -> Self {
        InMemoryLedger {
            certificates: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            behavior,
        }
    }

    /// Records a certificate directly, bypassing call accounting.
    pub fn seed(&self, hash: H256, certificate: LedgerCertificate) {
        self.certificates.lock().unwrap().insert(hash, certificate);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> CertificateResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            LedgerBehavior::Healthy => Ok(()),
            LedgerBehavior::Offline => Err(CertificateError::Connectivity(
                "connection refused".into(),
            )),
            LedgerBehavior::Slow(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }

    fn lookup(&self, hash: H256) -> Option<LedgerCertificate> {
        self.certificates.lock().unwrap().get(&hash).cloned()
    }
}

#[async_trait]
impl LedgerContract for InMemoryLedger {
    async fn issue_certificate(
        &self,
        recipient_name: &str,
        course_name: &str,
        issuer_name: &str,
    ) -> CertificateResult<H256> {
        self.enter().await?;
        let mut certificates = self.certificates.lock().unwrap();
        let key = format!(
            "{recipient_name}|{course_name}|{issuer_name}|{}",
            certificates.len()
        );
        let hash = H256::from(hash_data(key.as_bytes()));
        certificates.insert(
            hash,
            LedgerCertificate {
                recipient_name: recipient_name.into(),
                course_name: course_name.into(),
                issue_date: 1_704_067_200,
                issuer_name: issuer_name.into(),
                is_valid: true,
            },
        );
        Ok(H256::from(hash_data(hash.as_bytes())))
    }

    async fn verify_certificate(&self, hash: H256) -> CertificateResult<bool> {
        self.enter().await?;
        Ok(self.lookup(hash).is_some_and(|c| c.is_valid))
    }

    async fn is_valid_certificate(&self, hash: H256) -> CertificateResult<bool> {
        self.verify_certificate(hash).await
    }

    async fn get_certificate(&self, hash: H256) -> CertificateResult<LedgerCertificate> {
        self.enter().await?;
        self.lookup(hash)
            .ok_or_else(|| CertificateError::Rejected("execution reverted: Certificate does not exist".into()))
    }

    async fn total_certificates(&self) -> CertificateResult<U256> {
        self.enter().await?;
        Ok(U256::from(self.certificates.lock().unwrap().len()))
    }
}
