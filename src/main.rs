// src/main.rs

//! # Certificate Ledger - Main Entry Point
//!
//! Wires the certificate record-keeping services together and starts the API
//! server.
//!
//! ## Architecture Overview
//! 1. **Storage Layer**: `DocumentStore` over one JSON file per collection
//! 2. **Registry**: `CertificateRegistry` issuing content-addressed certificates,
//!    and `CourseProgressService` issuing them when a course is completed
//! 3. **Blockchain Layer**: `LedgerClient` over the certificate registry contract
//! 4. **Verification**: `VerificationGateway`, local first, ledger second
//! 5. **API**: axum server exposing all of the above
//!
//! ## Configuration
//! See [`config::Settings`]. The ledger is optional: without
//! `CERTIFY_RPC_URL` and `CERTIFY_CONTRACT_ADDRESS` ledger calls fail with a
//! connectivity error and verification of unknown certificates is `UNKNOWN`.

use crate::blockchain::ledger_connection::LedgerConnection;
use crate::config::Settings;
use crate::contracts::certificate_contract::CertificateContract;
use crate::models::certificate::CERTIFICATES;
use crate::models::enrollment::ENROLLMENTS;
use crate::services::api_server::ApiServer;
use crate::services::certificate_registry::CertificateRegistry;
use crate::services::course_progress::CourseProgressService;
use crate::services::ledger_client::LedgerClient;
use crate::services::verification_gateway::VerificationGateway;
use crate::storage::backend::FileStorage;
use crate::storage::document_store::DocumentStore;
use anyhow::Context;
use dotenv::dotenv;
use ethers::types::Address;
use log::{info, warn};
use std::sync::Arc;

// Module declarations (organized by functional domain)
mod blockchain;    // JSON-RPC connectivity
mod config;        // Layered settings
mod contracts;     // Certificate registry contract interface
mod error;         // Error taxonomy
mod models;        // Data structures
mod services;      // Business logic and API
mod storage;       // Local document store
mod utils;         // Hashing and serialization helpers

#[cfg(test)]
mod testing;

/// Main application entry point
///
/// # Initialization Sequence
/// 1. Load `.env`, logging and settings
/// 2. Open the local store and seed its collections
/// 3. Connect to the ledger, if configured
/// 4. Build the services and start the API server
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let settings = Settings::load().context("failed to load settings")?;

    let storage = FileStorage::open(&settings.storage_dir)
        .with_context(|| format!("failed to open storage at {}", settings.storage_dir.display()))?;
    let store = Arc::new(DocumentStore::new(Arc::new(storage)));
    store.initialize(&[CERTIFICATES, ENROLLMENTS])?;

    let registry = Arc::new(
        CertificateRegistry::new(store.clone()).with_policy(settings.issuance_policy()),
    );
    let progress = Arc::new(CourseProgressService::new(store, registry.clone()));

    let ledger = Arc::new(
        connect_ledger(&settings)
            .await
            .with_timeouts(settings.ledger_timeout(), settings.confirmation_timeout()),
    );

    let gateway = Arc::new(
        VerificationGateway::new(registry.clone(), ledger.clone())
            .with_sample(settings.sample_hash()?),
    );

    let addr = settings.bind_addr().context("invalid bind_address")?;
    ApiServer::new(registry, progress, ledger, gateway).run(addr).await?;
    Ok(())
}

/// Builds the ledger client, degrading to an unavailable ledger on any failure.
async fn connect_ledger(settings: &Settings) -> LedgerClient {
    let Some((rpc_url, contract_address)) = settings.ledger_endpoint() else {
        warn!("No ledger configured; ledger calls will fail with a connectivity error");
        return LedgerClient::unavailable();
    };

    let address: Address = match contract_address.parse() {
        Ok(address) => address,
        Err(e) => {
            warn!("Invalid contract address {}: {}", contract_address, e);
            return LedgerClient::unavailable();
        }
    };

    let contract = LedgerConnection::connect(rpc_url, settings.private_key.as_deref())
        .await
        .and_then(|connection| CertificateContract::new(&connection, address));
    match contract {
        Ok(contract) => {
            info!("Ledger contract {:?} via {}", address, rpc_url);
            LedgerClient::new(Arc::new(contract))
        }
        Err(e) => {
            warn!("Ledger unavailable: {}", e);
            LedgerClient::unavailable()
        }
    }
}
