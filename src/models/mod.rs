// src/models/mod.rs
//! Data structures shared by the store, the registry, the ledger and the gateway.

pub mod certificate;
pub mod enrollment;
