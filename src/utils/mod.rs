// src/utils/mod.rs
//! Helper functions: hashing and JSON serialization.

pub mod crypto;
pub mod serialization;
