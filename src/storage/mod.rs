// src/storage/mod.rs
//! Local persistence: byte-oriented backends and the collection store on top.

pub mod backend;
pub mod document_store;
