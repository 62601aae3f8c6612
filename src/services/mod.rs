// src/services/mod.rs
//! Business logic and API.

pub mod api_server;
pub mod certificate_registry;
pub mod course_progress;
pub mod ledger_client;
pub mod verification_gateway;
