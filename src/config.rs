// src/config.rs
//! Process configuration.
//!
//! Layered as built-in defaults, then an optional `certify.{toml,json,yaml}`
//! file in the working directory, then `CERTIFY_*` environment variables
//! (for example `CERTIFY_RPC_URL`). `main` loads a `.env` file first, so
//! variables placed there take part in the last layer.

use crate::error::CertificateResult;
use crate::models::certificate::CertificateHash;
use crate::services::certificate_registry::IssuancePolicy;
use crate::services::verification_gateway::SAMPLE_CERTIFICATE_HASH;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Runtime settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Directory holding one JSON file per collection
    pub storage_dir: PathBuf,
    /// Address the HTTP API listens on
    pub bind_address: String,
    /// JSON-RPC endpoint of the ledger; the ledger is unavailable without it
    pub rpc_url: Option<String>,
    /// Address of the certificate registry contract
    pub contract_address: Option<String>,
    /// Wallet key for ledger writes; reads work without it
    pub private_key: Option<String>,
    pub ledger_timeout_secs: u64,
    pub confirmation_timeout_secs: u64,
    /// Reserved demo identifier; empty disables it
    pub sample_certificate_hash: String,
    /// Reject duplicate issuance instead of returning the existing record
    pub strict_issuance: bool,
}

impl Settings {
    /// Loads defaults, the optional config file and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_builder(
            Self::defaults()?
                .add_source(File::with_name("certify").required(false))
                .add_source(Environment::with_prefix("CERTIFY")),
        )
    }

    /// Builder pre-populated with the default of every key.
    pub fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("storage_dir", "data")?
            .set_default("bind_address", "127.0.0.1:3000")?
            .set_default("ledger_timeout_secs", 10)?
            .set_default("confirmation_timeout_secs", 120)?
            .set_default("sample_certificate_hash", SAMPLE_CERTIFICATE_HASH)?
            .set_default("strict_issuance", false)
    }

    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        builder.build()?.try_deserialize()
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, AddrParseError> {
        self.bind_address.parse()
    }

    pub fn ledger_timeout(&self) -> Duration {
        Duration::from_secs(self.ledger_timeout_secs)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    pub fn issuance_policy(&self) -> IssuancePolicy {
        if self.strict_issuance {
            IssuancePolicy::Strict
        } else {
            IssuancePolicy::Idempotent
        }
    }

    /// Parsed sample identifier, `None` when disabled.
    pub fn sample_hash(&self) -> CertificateResult<Option<CertificateHash>> {
        let raw = self.sample_certificate_hash.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse().map(Some)
    }

    /// RPC endpoint and contract address, when both are configured.
    pub fn ledger_endpoint(&self) -> Option<(&str, &str)> {
        match (self.rpc_url.as_deref(), self.contract_address.as_deref()) {
            (Some(rpc), Some(address)) if !rpc.is_empty() && !address.is_empty() => {
                Some((rpc, address))
            }
            _ => None,
        }
    }
}
