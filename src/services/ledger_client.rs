// src/services/ledger_client.rs
//! Ledger client service.
//!
//! Adapts the local certificate model to the external certificate registry
//! contract. Hash arguments are validated locally before any contract call,
//! and every call is bounded by a timeout.

use crate::contracts::certificate_contract::LedgerContract;
use crate::error::{CertificateError, CertificateResult};
use crate::models::certificate::{CertificateHash, CertificateView, LedgerCertificate};
use crate::services::verification_gateway::CertificateSource;
use async_trait::async_trait;
use ethers::types::{H256, U256};
use log::{info, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Default deadline for view calls.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);
/// Default deadline for a transaction to be confirmed.
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Read/write facade over the certificate registry contract.
///
/// The client owns no ledger state. Without a contract (no provider
/// configured) every call fails with [`CertificateError::Connectivity`].
pub struct LedgerClient {
    contract: Option<Arc<dyn LedgerContract>>,
    call_timeout: Duration,
    confirmation_timeout: Duration,
}

impl LedgerClient {
    pub fn new(contract: Arc<dyn LedgerContract>) -> Self {
        LedgerClient {
            contract: Some(contract),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
        }
    }

    /// Client with no ledger behind it.
    pub fn unavailable() -> Self {
        LedgerClient {
            contract: None,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, call_timeout: Duration, confirmation_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self.confirmation_timeout = confirmation_timeout;
        self
    }

    pub fn is_available(&self) -> bool {
        self.contract.is_some()
    }

    /// Issues a certificate on the ledger and waits for confirmation.
    ///
    /// # Returns
    /// Hash of the confirmed transaction
    ///
    /// # Errors
    /// - `Validation` if any name is blank
    /// - `Connectivity` if no provider or wallet is available
    /// - `Timeout` if confirmation takes longer than the confirmation timeout
    pub async fn issue_on_ledger(
        &self,
        recipient_name: &str,
        course_name: &str,
        issuer_name: &str,
    ) -> CertificateResult<H256> {
        for (field, value) in [
            ("recipientName", recipient_name),
            ("courseName", course_name),
            ("issuerName", issuer_name),
        ] {
            if value.trim().is_empty() {
                return Err(CertificateError::Validation(format!("`{field}` must not be empty")));
            }
        }

        let contract = self.contract()?;
        let tx_hash = self
            .bounded(
                self.confirmation_timeout,
                "issueCertificate",
                contract.issue_certificate(recipient_name, course_name, issuer_name),
            )
            .await?;
        info!("Certificate for {} issued on ledger in tx 0x{:x}", recipient_name, tx_hash);
        Ok(tx_hash)
    }

    /// Whether the ledger considers `hash` a valid certificate (`verifyCertificate`).
    pub async fn verify_on_ledger(&self, hash: &str) -> CertificateResult<bool> {
        let hash: CertificateHash = hash.parse()?;
        self.verify(&hash).await
    }

    /// Whether `hash` is valid according to `isValidCertificate`.
    pub async fn is_valid_on_ledger(&self, hash: &str) -> CertificateResult<bool> {
        let hash: CertificateHash = hash.parse()?;
        let contract = self.contract()?;
        self.bounded(
            self.call_timeout,
            "isValidCertificate",
            contract.is_valid_certificate(hash.as_h256()),
        )
        .await
    }

    /// Full ledger record for `hash`.
    pub async fn fetch_on_ledger(&self, hash: &str) -> CertificateResult<LedgerCertificate> {
        let hash: CertificateHash = hash.parse()?;
        self.fetch(&hash).await
    }

    /// Number of certificates the contract has issued.
    pub async fn total_issued(&self) -> CertificateResult<u64> {
        let contract = self.contract()?;
        let total = self
            .bounded(self.call_timeout, "totalCertificates", contract.total_certificates())
            .await?;
        if total > U256::from(u64::MAX) {
            return Err(CertificateError::Rejected(format!(
                "certificate count {total} out of range"
            )));
        }
        Ok(total.as_u64())
    }

    async fn verify(&self, hash: &CertificateHash) -> CertificateResult<bool> {
        let contract = self.contract()?;
        self.bounded(
            self.call_timeout,
            "verifyCertificate",
            contract.verify_certificate(hash.as_h256()),
        )
        .await
    }

    async fn fetch(&self, hash: &CertificateHash) -> CertificateResult<LedgerCertificate> {
        let contract = self.contract()?;
        self.bounded(
            self.call_timeout,
            "getCertificate",
            contract.get_certificate(hash.as_h256()),
        )
        .await
    }

    fn contract(&self) -> CertificateResult<&Arc<dyn LedgerContract>> {
        self.contract.as_ref().ok_or_else(|| {
            CertificateError::Connectivity("no ledger provider configured".into())
        })
    }

    async fn bounded<T>(
        &self,
        limit: Duration,
        call: &str,
        fut: impl Future<Output = CertificateResult<T>>,
    ) -> CertificateResult<T> {
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Ledger call {} timed out after {:?}", call, limit);
                Err(CertificateError::Timeout(limit))
            }
        }
    }
}

#[async_trait]
impl CertificateSource for LedgerClient {
    fn name(&self) -> &'static str {
        "ledger"
    }

    async fn find(&self, hash: &CertificateHash) -> CertificateResult<Option<CertificateView>> {
        if !self.verify(hash).await? {
            return Ok(None);
        }
        let record = self.fetch(hash).await?;
        Ok(Some(CertificateView::from_ledger(*hash, &record)))
    }
}
