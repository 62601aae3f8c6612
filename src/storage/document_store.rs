// src/storage/document_store.rs
//! Collection-oriented document store.
//!
//! Each collection is persisted as one JSON array under a backend key equal to
//! the collection name. Every record carries an integer `id`, assigned on
//! insert as `max(existing ids) + 1`. Reads never partially succeed: every
//! stored element is decoded before a call filters or writes anything, and a
//! value that cannot be decoded fails the call with
//! [`CertificateError::StorageCorruption`].
//!
//! Collections are bound to Rust types through [`Record`]; the store itself
//! stays generic and only interprets the `id` field.

use crate::error::{CertificateError, CertificateResult};
use crate::storage::backend::{MemoryStorage, StorageBackend};
use crate::utils::serialization::{decode_record, parse_collection, render_collection, RawRecord};
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};

/// A record type bound to one collection.
pub trait Record: Serialize + DeserializeOwned + Clone {
    /// Name of the collection holding records of this type.
    const COLLECTION: &'static str;

    fn id(&self) -> u64;

    fn set_id(&mut self, id: u64);

    /// Schema check run before every write.
    fn validate(&self) -> CertificateResult<()> {
        Ok(())
    }
}

/// Write operations accepted by [`DocumentStore::execute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Insert,
    Update,
}

/// Exact-equality filter over record fields.
///
/// A record matches when every field in the filter is present on the record
/// with an equal JSON value. The empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    fields: RawRecord,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `field == value` condition, using the persisted field name.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    fn matches(&self, record: &RawRecord) -> bool {
        self.fields
            .iter()
            .all(|(name, value)| record.get(name) == Some(value))
    }
}

/// A loaded element: the persisted map, kept for merges and rewrites, and
/// its decoded form.
struct Stored<R> {
    raw: RawRecord,
    record: R,
}

/// Generic document store over a [`StorageBackend`].
///
/// Read-modify-write cycles are serialized by a store-wide lock, so writers
/// sharing one `DocumentStore` never lose each other's inserts. Separate
/// processes sharing the same backing directory are not coordinated.
pub struct DocumentStore {
    backend: Arc<dyn StorageBackend>,
    write_lock: Mutex<()>,
}

impl DocumentStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        DocumentStore {
            backend,
            write_lock: Mutex::new(()),
        }
    }

    /// Store over a fresh [`MemoryStorage`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Creates each named collection as an empty array unless it already exists.
    pub fn initialize(&self, collections: &[&str]) -> CertificateResult<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        for name in collections {
            if self.backend.get_item(name)?.is_none() {
                info!("Initializing {} collection", name);
                self.backend.set_item(name, "[]")?;
            }
        }
        Ok(())
    }

    /// Returns every record of `R::COLLECTION` matching `filter`, in insertion order.
    ///
    /// A collection that was never written is empty.
    pub fn query<R: Record>(&self, filter: &Filter) -> CertificateResult<Vec<R>> {
        let matched: Vec<R> = self
            .load::<R>()?
            .into_iter()
            .filter(|stored| filter.matches(&stored.raw))
            .map(|stored| stored.record)
            .collect();
        debug!(
            "Query on {} matched {} record(s) with filter {:?}",
            R::COLLECTION,
            matched.len(),
            filter.fields
        );
        Ok(matched)
    }

    /// Applies a write to `R::COLLECTION` and persists the whole collection.
    ///
    /// - `Insert` assigns the next id and always returns the stored record.
    /// - `Update` shallow-merges `data` over the record with the same id and
    ///   returns the merged record, or `None` when no such record exists.
    pub fn execute<R: Record>(&self, op: Operation, mut data: R) -> CertificateResult<Option<R>> {
        data.validate()?;

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut records = self.load::<R>()?;

        match op {
            Operation::Insert => {
                let next_id = records
                    .iter()
                    .map(|stored| stored.record.id())
                    .max()
                    .unwrap_or(0)
                    .checked_add(1)
                    .ok_or_else(|| CertificateError::corruption(R::COLLECTION, "id space exhausted"))?;
                data.set_id(next_id);
                records.push(Stored {
                    raw: encode(&data)?,
                    record: data.clone(),
                });
                self.persist(R::COLLECTION, &records)?;
                debug!("Inserted record {} into {}", next_id, R::COLLECTION);
                Ok(Some(data))
            }
            Operation::Update => {
                let Some(index) = records
                    .iter()
                    .position(|stored| stored.record.id() == data.id())
                else {
                    debug!("No record {} in {} to update", data.id(), R::COLLECTION);
                    return Ok(None);
                };

                let mut merged = records[index].raw.clone();
                merged.extend(encode(&data)?);
                let updated: R = serde_json::from_value(Value::Object(merged.clone()))
                    .map_err(|e| schema_error(R::COLLECTION, e))?;
                updated.validate()?;

                records[index] = Stored {
                    raw: merged,
                    record: updated.clone(),
                };
                self.persist(R::COLLECTION, &records)?;
                debug!("Updated record {} in {}", updated.id(), R::COLLECTION);
                Ok(Some(updated))
            }
        }
    }

    /// Loads and decodes every element of `R::COLLECTION`.
    fn load<R: Record>(&self) -> CertificateResult<Vec<Stored<R>>> {
        let collection = R::COLLECTION;
        let Some(raw) = self.backend.get_item(collection)? else {
            return Ok(Vec::new());
        };

        parse_collection(collection, &raw)?
            .into_iter()
            .enumerate()
            .map(|(index, raw)| {
                if raw.get("id").and_then(Value::as_u64).is_none() {
                    return Err(CertificateError::corruption(
                        collection,
                        format!("element {index} has no integer `id`"),
                    ));
                }
                let record = decode_record(collection, &raw)?;
                Ok(Stored { raw, record })
            })
            .collect()
    }

    fn persist<R>(&self, collection: &str, records: &[Stored<R>]) -> CertificateResult<()> {
        let json = render_collection(collection, records.iter().map(|stored| &stored.raw))?;
        self.backend.set_item(collection, &json)
    }
}

fn encode<R: Record>(record: &R) -> CertificateResult<RawRecord> {
    match serde_json::to_value(record) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(schema_error(R::COLLECTION, "records must serialize to JSON objects")),
        Err(e) => Err(schema_error(R::COLLECTION, e)),
    }
}

fn schema_error(collection: &str, reason: impl ToString) -> CertificateError {
    CertificateError::Schema {
        collection: collection.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Enrollment {
        #[serde(default)]
        id: u64,
        user_id: String,
        course_id: String,
        progress: u32,
    }

    impl Record for Enrollment {
        const COLLECTION: &'static str = "user_courses";

        fn id(&self) -> u64 {
            self.id
        }

        fn set_id(&mut self, id: u64) {
            self.id = id;
        }

        fn validate(&self) -> CertificateResult<()> {
            if self.progress > 100 {
                return Err(schema_error(Self::COLLECTION, "progress is a percentage"));
            }
            Ok(())
        }
    }

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
    struct Event {
        #[serde(default)]
        id: u64,
        title: String,
    }

    impl Record for Event {
        const COLLECTION: &'static str = "events";

        fn id(&self) -> u64 {
            self.id
        }

        fn set_id(&mut self, id: u64) {
            self.id = id;
        }
    }

    fn enrollment(user_id: &str, course_id: &str) -> Enrollment {
        Enrollment {
            id: 0,
            user_id: user_id.into(),
            course_id: course_id.into(),
            progress: 0,
        }
    }

    fn store_with_backend() -> (DocumentStore, Arc<MemoryStorage>) {
        let backend = Arc::new(MemoryStorage::new());
        (DocumentStore::new(backend.clone()), backend)
    }

    #[test]
    fn test_insert_assigns_sequential_ids_per_collection() {
        let store = DocumentStore::in_memory();

        let ids: Vec<u64> = ["c1", "c2", "c3"]
            .iter()
            .map(|course| {
                store
                    .execute(Operation::Insert, enrollment("u1", course))
                    .unwrap()
                    .unwrap()
                    .id
            })
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let event = store
            .execute(Operation::Insert, Event { id: 0, title: "kickoff".into() })
            .unwrap()
            .unwrap();
        assert_eq!(event.id, 1);
    }

    #[test]
    fn test_insert_ignores_caller_supplied_id() {
        let store = DocumentStore::in_memory();
        let mut first = enrollment("u1", "c1");
        first.id = 42;

        let stored = store.execute(Operation::Insert, first).unwrap().unwrap();
        assert_eq!(stored.id, 1);
    }

    #[test]
    fn test_query_filters_on_every_field() {
        let store = DocumentStore::in_memory();
        for (user, course) in [("u1", "c1"), ("u1", "c2"), ("u2", "c1")] {
            store.execute(Operation::Insert, enrollment(user, course)).unwrap();
        }

        let by_user: Vec<Enrollment> = store.query(&Filter::new().field("userId", "u1")).unwrap();
        assert_eq!(by_user.len(), 2);
        assert!(by_user.iter().all(|e| e.user_id == "u1"));

        let exact: Vec<Enrollment> = store
            .query(&Filter::new().field("userId", "u2").field("courseId", "c1"))
            .unwrap();
        assert_eq!(exact.len(), 1);
        assert_eq!(exact[0].id, 3);

        let none: Vec<Enrollment> = store
            .query(&Filter::new().field("userId", "u2").field("courseId", "c2"))
            .unwrap();
        assert!(none.is_empty());

        // Values must match exactly, including their JSON type.
        let wrong_type: Vec<Enrollment> =
            store.query(&Filter::new().field("progress", "0")).unwrap();
        assert!(wrong_type.is_empty());
    }

    #[test]
    fn test_empty_filter_returns_collection_in_insertion_order() {
        let store = DocumentStore::in_memory();
        for course in ["c3", "c1", "c2"] {
            store.execute(Operation::Insert, enrollment("u1", course)).unwrap();
        }

        let all: Vec<Enrollment> = store.query(&Filter::new()).unwrap();
        let courses: Vec<&str> = all.iter().map(|e| e.course_id.as_str()).collect();
        assert_eq!(courses, vec!["c3", "c1", "c2"]);
    }

    #[test]
    fn test_missing_collection_is_empty() {
        let store = DocumentStore::in_memory();
        let events: Vec<Event> = store.query(&Filter::new()).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_update_merges_and_keeps_unknown_fields() {
        let (store, backend) = store_with_backend();
        backend
            .set_item(
                "user_courses",
                r#"[{"id":1,"userId":"u1","courseId":"c1","progress":10,"legacyFlag":true}]"#,
            )
            .unwrap();

        let mut patch = enrollment("u1", "c1");
        patch.id = 1;
        patch.progress = 80;
        let updated = store.execute(Operation::Update, patch).unwrap().unwrap();
        assert_eq!(updated.progress, 80);

        let raw: Vec<Value> =
            serde_json::from_str(&backend.get_item("user_courses").unwrap().unwrap()).unwrap();
        assert_eq!(raw[0]["progress"], 80);
        assert_eq!(raw[0]["legacyFlag"], true);
    }

    #[test]
    fn test_update_of_missing_record_returns_none() {
        let (store, backend) = store_with_backend();
        store.execute(Operation::Insert, enrollment("u1", "c1")).unwrap();
        let before = backend.get_item("user_courses").unwrap();

        let mut patch = enrollment("u1", "c1");
        patch.id = 99;
        assert_eq!(store.execute(Operation::Update, patch).unwrap(), None);
        assert_eq!(backend.get_item("user_courses").unwrap(), before);
    }

    #[test]
    fn test_write_rejects_records_failing_schema() {
        let (store, backend) = store_with_backend();
        let mut invalid = enrollment("u1", "c1");
        invalid.progress = 150;

        assert!(matches!(
            store.execute(Operation::Insert, invalid),
            Err(CertificateError::Schema { .. })
        ));
        assert_eq!(backend.get_item("user_courses").unwrap(), None);
    }

    #[test]
    fn test_corrupt_collections_fail_instead_of_reading_empty() {
        let (store, backend) = store_with_backend();

        for corrupt in [
            "{not json",
            r#"{"id":1}"#,
            r#"[{"userId":"u1"}]"#,
            r#"[{"id":1,"userId":5,"courseId":"c1","progress":0}]"#,
        ] {
            backend.set_item("user_courses", corrupt).unwrap();
            for filter in [Filter::new(), Filter::new().field("userId", "u1")] {
                let result: CertificateResult<Vec<Enrollment>> = store.query(&filter);
                assert!(
                    matches!(result, Err(CertificateError::StorageCorruption { .. })),
                    "{corrupt}"
                );
            }
            assert!(matches!(
                store.execute(Operation::Insert, enrollment("u1", "c1")),
                Err(CertificateError::StorageCorruption { .. })
            ));
            assert_eq!(backend.get_item("user_courses").unwrap().as_deref(), Some(corrupt));
        }
    }

    #[test]
    fn test_insert_fails_when_ids_are_exhausted() {
        let (store, backend) = store_with_backend();
        let full = format!(
            r#"[{{"id":{},"userId":"u1","courseId":"c1","progress":0}}]"#,
            u64::MAX
        );
        backend.set_item("user_courses", &full).unwrap();

        assert!(matches!(
            store.execute(Operation::Insert, enrollment("u2", "c2")),
            Err(CertificateError::StorageCorruption { .. })
        ));
        assert_eq!(backend.get_item("user_courses").unwrap(), Some(full));
    }

    #[test]
    fn test_initialize_keeps_existing_collections() {
        let (store, backend) = store_with_backend();
        store.execute(Operation::Insert, enrollment("u1", "c1")).unwrap();

        store.initialize(&["user_courses", "events"]).unwrap();

        assert_eq!(backend.get_item("events").unwrap().as_deref(), Some("[]"));
        let kept: Vec<Enrollment> = store.query(&Filter::new()).unwrap();
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_concurrent_inserts_are_not_lost() {
        let store = Arc::new(DocumentStore::in_memory());
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let store = store.clone();
                std::thread::spawn(move || {
                    store
                        .execute(Operation::Insert, enrollment("u1", &format!("c{n}")))
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut ids: Vec<u64> = store
            .query::<Enrollment>(&Filter::new())
            .unwrap()
            .iter()
            .map(|e| e.id)
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=8).collect::<Vec<u64>>());
    }
}
