// src/blockchain/ledger_connection.rs
//! JSON-RPC connection to the chain hosting the certificate registry contract.
//!
//! Holds a read-only provider and, when a private key is configured, a
//! signing middleware for state-changing calls.

use crate::error::{CertificateError, CertificateResult};
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use log::info;
use std::sync::Arc;

/// Provider plus signer used for transactions.
pub type SigningClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Connection to an EVM JSON-RPC endpoint.
#[derive(Clone)]
pub struct LedgerConnection {
    /// RPC provider for read-only calls
    provider: Arc<Provider<Http>>,
    /// Signing client for transactions, absent without a private key
    signer: Option<Arc<SigningClient>>,
}

impl LedgerConnection {
    /// Connects to `rpc_url`.
    ///
    /// # Arguments
    /// * `rpc_url` - JSON-RPC endpoint URL
    /// * `private_key` - Hex-encoded private key (with or without 0x prefix);
    ///   without one the connection is read-only
    ///
    /// # Errors
    /// - `Connectivity` if the URL is malformed or the chain ID cannot be fetched
    /// - `Validation` if the private key is invalid
    pub async fn connect(rpc_url: &str, private_key: Option<&str>) -> CertificateResult<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| CertificateError::Connectivity(format!("invalid RPC URL `{rpc_url}`: {e}")))?;

        let signer = match private_key {
            Some(key) => {
                let chain_id = provider
                    .get_chainid()
                    .await
                    .map_err(|e| CertificateError::Connectivity(e.to_string()))?
                    .as_u64();
                let wallet = key
                    .trim_start_matches("0x")
                    .parse::<LocalWallet>()
                    .map_err(|e| CertificateError::Validation(format!("invalid private key: {e}")))?
                    .with_chain_id(chain_id);
                info!("Ledger signer {:?} on chain {}", wallet.address(), chain_id);
                Some(Arc::new(SignerMiddleware::new(provider.clone(), wallet)))
            }
            None => None,
        };

        Ok(LedgerConnection {
            provider: Arc::new(provider),
            signer,
        })
    }

    /// Read-only provider.
    pub fn provider(&self) -> Arc<Provider<Http>> {
        self.provider.clone()
    }

    /// Signing client, if a wallet is configured.
    pub fn signer(&self) -> Option<Arc<SigningClient>> {
        self.signer.clone()
    }

    /// Address of the configured wallet.
    pub fn address(&self) -> Option<Address> {
        self.signer.as_ref().map(|signer| signer.address())
    }
}
