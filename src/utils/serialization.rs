// src/utils/serialization.rs
//! JSON encoding of persisted collections.
//!
//! A collection is stored as one JSON array of objects. Failures reading it
//! back are reported as [`CertificateError::StorageCorruption`]; failures
//! writing it are reported as [`CertificateError::Schema`].

use crate::error::{CertificateError, CertificateResult};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// A persisted record in its untyped form.
pub type RawRecord = Map<String, Value>;

/// Parses a stored collection into its elements.
///
/// # Errors
/// `StorageCorruption` if `raw` is not a JSON array of objects.
pub fn parse_collection(collection: &str, raw: &str) -> CertificateResult<Vec<RawRecord>> {
    let values: Vec<Value> =
        serde_json::from_str(raw).map_err(|e| CertificateError::corruption(collection, e))?;
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| match value {
            Value::Object(record) => Ok(record),
            other => Err(CertificateError::corruption(
                collection,
                format!("element {index} is not an object: {other}"),
            )),
        })
        .collect()
}

/// Decodes one stored element into its record type.
///
/// # Errors
/// `StorageCorruption` if the element does not match the record's shape.
pub fn decode_record<R: DeserializeOwned>(collection: &str, record: &RawRecord) -> CertificateResult<R> {
    serde_json::from_value(Value::Object(record.clone()))
        .map_err(|e| CertificateError::corruption(collection, e))
}

/// Renders a collection for storage.
pub fn render_collection<'a>(
    collection: &str,
    records: impl IntoIterator<Item = &'a RawRecord>,
) -> CertificateResult<String> {
    let records: Vec<&RawRecord> = records.into_iter().collect();
    serde_json::to_string(&records).map_err(|e| CertificateError::Schema {
        collection: collection.to_string(),
        reason: e.to_string(),
    })
}
