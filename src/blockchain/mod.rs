// src/blockchain/mod.rs
//! Chain connectivity.

pub mod ledger_connection;
