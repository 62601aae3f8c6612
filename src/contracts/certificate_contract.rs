// src/contracts/certificate_contract.rs
//! Certificate registry smart contract interface.
//!
//! [`LedgerContract`] is the narrow read/write surface of the external
//! registry contract. [`CertificateContract`] implements it over an ethers
//! provider; tests substitute an in-memory ledger.

use crate::blockchain::ledger_connection::{LedgerConnection, SigningClient};
use crate::error::{CertificateError, CertificateResult};
use crate::models::certificate::LedgerCertificate;
use async_trait::async_trait;
use ethers::abi::{parse_abi, AbiError};
use ethers::contract::{Contract, ContractError};
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{Address, H256, U256};

/// Human-readable ABI of the certificate registry contract.
pub const CERTIFICATE_REGISTRY_ABI: &[&str] = &[
    "function issueCertificate(string recipientName, string courseName, string issuerName) returns (bytes32)",
    "function verifyCertificate(bytes32 certificateHash) view returns (bool)",
    "function isValidCertificate(bytes32 certificateHash) view returns (bool)",
    "function getCertificate(bytes32 certificateHash) view returns (string recipientName, string courseName, uint256 issueDate, string issuerName, bool isValid)",
    "function totalCertificates() view returns (uint256)",
];

/// Read/write surface of the certificate registry contract.
#[async_trait]
pub trait LedgerContract: Send + Sync {
    /// Submits `issueCertificate` and waits for it to be mined.
    ///
    /// # Returns
    /// Hash of the confirmed transaction
    async fn issue_certificate(
        &self,
        recipient_name: &str,
        course_name: &str,
        issuer_name: &str,
    ) -> CertificateResult<H256>;

    /// `verifyCertificate` view call.
    async fn verify_certificate(&self, hash: H256) -> CertificateResult<bool>;

    /// `isValidCertificate` view call.
    async fn is_valid_certificate(&self, hash: H256) -> CertificateResult<bool>;

    /// `getCertificate` view call.
    async fn get_certificate(&self, hash: H256) -> CertificateResult<LedgerCertificate>;

    /// `totalCertificates` view call.
    async fn total_certificates(&self) -> CertificateResult<U256>;
}

/// Certificate registry contract reached over JSON-RPC.
pub struct CertificateContract {
    /// Instance bound to the read-only provider
    reader: Contract<Provider<Http>>,
    /// Instance bound to the signing client, absent without a wallet
    writer: Option<Contract<SigningClient>>,
}

impl CertificateContract {
    /// Binds the registry ABI at `address` on `connection`.
    pub fn new(connection: &LedgerConnection, address: Address) -> CertificateResult<Self> {
        let abi = parse_abi(CERTIFICATE_REGISTRY_ABI)
            .map_err(|e| CertificateError::Validation(format!("certificate registry ABI: {e}")))?;
        let reader = Contract::new(address, abi.clone(), connection.provider());
        let writer = connection
            .signer()
            .map(|signer| Contract::new(address, abi, signer));
        Ok(CertificateContract { reader, writer })
    }
}

#[async_trait]
impl LedgerContract for CertificateContract {
    async fn issue_certificate(
        &self,
        recipient_name: &str,
        course_name: &str,
        issuer_name: &str,
    ) -> CertificateResult<H256> {
        let writer = self.writer.as_ref().ok_or_else(|| {
            CertificateError::Connectivity("no wallet configured for ledger writes".into())
        })?;

        let call = writer
            .method::<_, H256>(
                "issueCertificate",
                (
                    recipient_name.to_string(),
                    course_name.to_string(),
                    issuer_name.to_string(),
                ),
            )
            .map_err(abi_error)?;
        let pending = call.send().await.map_err(contract_error)?;
        let receipt = pending
            .await
            .map_err(|e| CertificateError::Connectivity(e.to_string()))?
            .ok_or_else(|| {
                CertificateError::Connectivity("transaction dropped before confirmation".into())
            })?;
        Ok(receipt.transaction_hash)
    }

    async fn verify_certificate(&self, hash: H256) -> CertificateResult<bool> {
        self.reader
            .method::<_, bool>("verifyCertificate", hash)
            .map_err(abi_error)?
            .call()
            .await
            .map_err(contract_error)
    }

    async fn is_valid_certificate(&self, hash: H256) -> CertificateResult<bool> {
        self.reader
            .method::<_, bool>("isValidCertificate", hash)
            .map_err(abi_error)?
            .call()
            .await
            .map_err(contract_error)
    }

    async fn get_certificate(&self, hash: H256) -> CertificateResult<LedgerCertificate> {
        let (recipient_name, course_name, issue_date, issuer_name, is_valid) = self
            .reader
            .method::<_, (String, String, U256, String, bool)>("getCertificate", hash)
            .map_err(abi_error)?
            .call()
            .await
            .map_err(contract_error)?;

        Ok(LedgerCertificate {
            recipient_name,
            course_name,
            issue_date: issue_date.min(U256::from(u64::MAX)).as_u64(),
            issuer_name,
            is_valid,
        })
    }

    async fn total_certificates(&self) -> CertificateResult<U256> {
        self.reader
            .method::<_, U256>("totalCertificates", ())
            .map_err(abi_error)?
            .call()
            .await
            .map_err(contract_error)
    }
}

fn abi_error(e: AbiError) -> CertificateError {
    CertificateError::Validation(format!("contract call encoding: {e}"))
}

/// Reverts are answers from the contract; everything else is transport.
fn contract_error<M: Middleware>(e: ContractError<M>) -> CertificateError {
    if e.is_revert() {
        CertificateError::Rejected(e.to_string())
    } else {
        CertificateError::Connectivity(e.to_string())
    }
}
