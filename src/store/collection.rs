//! Resource collection
//!
//! Ordered records for one resource, guarded by an async mutex that is held
//! across read, mutate and persist. A mutation is built on a copy of the
//! records and only committed after the backend accepted it, so a failed
//! write leaves the collection untouched.

use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::schema::Schema;
use super::{Record, RecordId};
use crate::config::IdPolicy;
use crate::error::{ApiError, StorageError};
use crate::logger;
use crate::persist::{Change, SharedBackend};

struct State {
    records: Vec<Record>,
    /// Highest numeric id ever seen by this collection
    last_id: i64,
}

pub struct Collection {
    schema: Schema,
    /// Request path that addresses this collection, e.g. "/api/users"
    route: String,
    state: Mutex<State>,
    backend: SharedBackend,
}

impl Collection {
    /// Build from loaded records. Every record must carry a valid, unique id.
    pub fn new(
        schema: Schema,
        mount: &str,
        records: Vec<Record>,
        backend: SharedBackend,
    ) -> Result<Self, StorageError> {
        let mut last_id = 0;
        let mut seen = std::collections::HashSet::new();
        for record in &records {
            let id = record
                .get(&schema.id_field)
                .ok_or_else(|| {
                    StorageError::Corrupt(format!(
                        "{} record without {}",
                        schema.name, schema.id_field
                    ))
                })
                .and_then(|v| {
                    RecordId::from_value(v, schema.id_policy)
                        .map_err(|e| StorageError::Corrupt(format!("{}: {e}", schema.name)))
                })?;
            if let RecordId::Number(n) = id {
                last_id = last_id.max(n);
            }
            if !seen.insert(id.clone()) {
                return Err(StorageError::Corrupt(format!(
                    "{} has duplicate id {id}",
                    schema.name
                )));
            }
        }

        let route = format!("{}/{}", mount.trim_end_matches('/'), schema.name);
        Ok(Self {
            schema,
            route,
            state: Mutex::new(State { records, last_id }),
            backend,
        })
    }

    #[allow(clippy::missing_const_for_fn)]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    /// All records in insertion order, derived fields rendered
    pub async fn list(&self) -> Vec<Record> {
        let state = self.state.lock().await;
        state
            .records
            .iter()
            .map(|r| self.schema.present(r))
            .collect()
    }

    /// Stored records without derived fields
    pub async fn records(&self) -> Vec<Record> {
        self.state.lock().await.records.clone()
    }

    pub async fn get(&self, id: &RecordId) -> Result<Record, ApiError> {
        let state = self.state.lock().await;
        let index = self.position(&state.records, id)?;
        Ok(self.schema.present(&state.records[index]))
    }

    pub async fn insert(&self, record: Record) -> Result<Record, ApiError> {
        let mut inserted = self.insert_many(vec![record]).await?;
        inserted
            .pop()
            .ok_or_else(|| ApiError::Internal("insert produced no record".to_string()))
    }

    /// Validate every record first, then store them all in one write
    pub async fn insert_many(&self, records: Vec<Record>) -> Result<Vec<Record>, ApiError> {
        let mut state = self.state.lock().await;
        let mut next = state.records.clone();
        let mut last_id = state.last_id;
        let mut added = Vec::with_capacity(records.len());

        for record in records {
            let (id, record) = self.prepare_insert(record, &next, &mut last_id)?;
            next.push(record.clone());
            added.push((id, record));
        }

        let presented = added
            .iter()
            .map(|(_, record)| self.schema.present(record))
            .collect();
        self.persist(&Change::Insert(added), &next).await?;
        state.records = next;
        state.last_id = last_id;
        Ok(presented)
    }

    /// Replace the record wholesale; the identifier is preserved
    pub async fn update(&self, id: &RecordId, mut record: Record) -> Result<Record, ApiError> {
        let mut state = self.state.lock().await;
        let index = self.position(&state.records, id)?;

        self.schema.strip_derived(&mut record);
        self.schema.apply_defaults(&mut record);
        record.insert(self.schema.id_field.clone(), id.to_value());
        self.schema.check_required(&record)?;
        self.schema.check_unique(&record, &state.records, Some(index))?;
        self.schema.stamp_updated(&mut record, &state.records[index]);

        let mut next = state.records.clone();
        next[index] = record.clone();
        self.persist(&Change::Replace(id.clone(), record.clone()), &next)
            .await?;
        state.records = next;

        Ok(self.schema.present(&record))
    }

    /// Remove the record if present. Deleting a missing id is not an error.
    pub async fn delete(&self, id: &RecordId) -> Result<(), ApiError> {
        let mut state = self.state.lock().await;
        let Ok(index) = self.position(&state.records, id) else {
            return Ok(());
        };

        let mut next = state.records.clone();
        next.remove(index);
        self.persist(&Change::Delete(id.clone()), &next).await?;
        state.records = next;
        Ok(())
    }

    fn position(&self, records: &[Record], id: &RecordId) -> Result<usize, ApiError> {
        records
            .iter()
            .position(|r| self.id_of(r).as_ref() == Some(id))
            .ok_or_else(|| ApiError::NotFound(format!("{} not found", self.schema.label)))
    }

    fn id_of(&self, record: &Record) -> Option<RecordId> {
        record
            .get(&self.schema.id_field)
            .and_then(|v| RecordId::from_value(v, self.schema.id_policy).ok())
    }

    /// Apply schema rules and assign an identifier when none was supplied
    fn prepare_insert(
        &self,
        mut record: Record,
        existing: &[Record],
        last_id: &mut i64,
    ) -> Result<(RecordId, Record), ApiError> {
        self.schema.strip_derived(&mut record);
        self.schema.apply_defaults(&mut record);
        self.schema.check_required(&record)?;

        let id = match record.get(&self.schema.id_field) {
            None | Some(Value::Null) => self.next_id(last_id)?,
            Some(value) => {
                let id = RecordId::from_value(value, self.schema.id_policy)?;
                // i64::MAX would leave no room for generated ids; text ids must
                // be addressable as a raw path segment
                let addressable = match &id {
                    RecordId::Number(n) => *n < i64::MAX,
                    RecordId::Text(_) => id.is_path_safe(),
                };
                if !addressable {
                    return Err(ApiError::Validation(format!("Invalid id: {id}")));
                }
                if existing.iter().any(|r| self.id_of(r).as_ref() == Some(&id)) {
                    return Err(ApiError::Validation(format!("Duplicate id {id}")));
                }
                if let RecordId::Number(n) = id {
                    *last_id = (*last_id).max(n);
                }
                id
            }
        };
        record.insert(self.schema.id_field.clone(), id.to_value());

        self.schema.check_unique(&record, existing, None)?;
        self.schema.stamp_created(&mut record);
        Ok((id, record))
    }

    fn next_id(&self, last_id: &mut i64) -> Result<RecordId, ApiError> {
        match self.schema.id_policy {
            IdPolicy::Numeric => {
                let next = last_id.checked_add(1).ok_or_else(|| {
                    ApiError::Internal(format!("{} identifier space exhausted", self.schema.name))
                })?;
                *last_id = next;
                Ok(RecordId::Number(next))
            }
            IdPolicy::Text => Ok(RecordId::Text(Uuid::new_v4().to_string())),
        }
    }

    async fn persist(&self, change: &Change, records: &[Record]) -> Result<(), StorageError> {
        logger::log_debug(&format!(
            "Saving {} ({} records) to {}",
            self.schema.name,
            records.len(),
            self.backend.name()
        ));
        self.backend
            .apply(&self.schema.name, change, records)
            .await
            .inspect_err(|e| logger::log_error(&format!("Persisting {} failed: {e}", self.schema.name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DerivedField, ResourceConfig};
    use crate::persist::{FileBackend, MemoryBackend, Persistence};
    use serde_json::json;
    use std::sync::Arc;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn users_schema() -> Schema {
        let mut config = ResourceConfig::named("users");
        config.required = vec!["name".into()];
        config.unique = vec!["email".into()];
        Schema::from_config(&config)
    }

    fn users() -> Collection {
        Collection::new(users_schema(), "", vec![], Arc::new(MemoryBackend::new())).unwrap()
    }

    #[tokio::test]
    async fn test_insert_assigns_increasing_ids() {
        let users = users();
        let a = users.insert(record(json!({"name": "A"}))).await.unwrap();
        let b = users.insert(record(json!({"name": "B"}))).await.unwrap();
        assert_eq!(a["id"], json!(1));
        assert_eq!(b["id"], json!(2));

        // Deleting the newest id does not make it reusable
        users.delete(&RecordId::Number(2)).await.unwrap();
        let c = users.insert(record(json!({"name": "C"}))).await.unwrap();
        assert_eq!(c["id"], json!(3));
    }

    #[tokio::test]
    async fn test_supplied_id_kept_and_counter_follows() {
        let users = users();
        let a = users
            .insert(record(json!({"id": 10, "name": "A"})))
            .await
            .unwrap();
        assert_eq!(a["id"], json!(10));

        let b = users.insert(record(json!({"name": "B"}))).await.unwrap();
        assert_eq!(b["id"], json!(11));

        let err = users
            .insert(record(json!({"id": 10, "name": "C"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert_eq!(users.list().await.len(), 2);
    }

    #[tokio::test]
    async fn test_insert_validation() {
        let users = users();
        let err = users.insert(record(json!({"email": "a@x.com"}))).await;
        assert!(matches!(err, Err(ApiError::Validation(_))));

        users
            .insert(record(json!({"name": "A", "email": "a@x.com"})))
            .await
            .unwrap();
        let err = users
            .insert(record(json!({"name": "B", "email": "a@x.com"})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "email already exists");
    }

    #[tokio::test]
    async fn test_insert_many_is_all_or_nothing() {
        let users = users();
        let err = users
            .insert_many(vec![
                record(json!({"name": "A"})),
                record(json!({"email": "missing-name"})),
            ])
            .await;
        assert!(err.is_err());
        assert!(users.list().await.is_empty());

        let added = users
            .insert_many(vec![record(json!({"name": "A"})), record(json!({"name": "B"}))])
            .await
            .unwrap();
        assert_eq!(added.len(), 2);
        assert_eq!(added[1]["id"], json!(2));
    }

    #[tokio::test]
    async fn test_update_replaces_whole_record() {
        let users = users();
        users
            .insert(record(json!({"name": "A", "email": "a@x.com"})))
            .await
            .unwrap();
        users.insert(record(json!({"name": "B"}))).await.unwrap();

        let replacement = record(json!({"id": 1, "name": "Z"}));
        let updated = users
            .update(&RecordId::Number(1), record(json!({"name": "Z"})))
            .await
            .unwrap();
        assert_eq!(updated, replacement);

        let listed = users.list().await;
        assert_eq!(listed.len(), 2);
        assert_eq!(
            listed.iter().filter(|r| r["id"] == json!(1)).count(),
            1
        );
        assert_eq!(listed[0], replacement);
        assert!(!listed[0].contains_key("email"));
    }

    #[tokio::test]
    async fn test_update_keeps_path_id() {
        let users = users();
        users.insert(record(json!({"name": "A"}))).await.unwrap();
        let updated = users
            .update(&RecordId::Number(1), record(json!({"id": 99, "name": "B"})))
            .await
            .unwrap();
        assert_eq!(updated["id"], json!(1));
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let users = users();
        let err = users
            .update(&RecordId::Number(999), record(json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(ref m) if m == "User not found"));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let users = users();
        users.insert(record(json!({"name": "A"}))).await.unwrap();
        users.insert(record(json!({"name": "B"}))).await.unwrap();

        users.delete(&RecordId::Number(1)).await.unwrap();
        let after_first = users.list().await.len();
        users.delete(&RecordId::Number(1)).await.unwrap();
        assert_eq!(users.list().await.len(), after_first);
        assert_eq!(after_first, 1);

        users.delete(&RecordId::Number(5)).await.unwrap();
    }

    #[tokio::test]
    async fn test_supplied_id_at_max_rejected() {
        let users = users();
        let err = users
            .insert(record(json!({"id": i64::MAX, "name": "A"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        // The rejected id did not move the counter
        let next = users.insert(record(json!({"name": "B"}))).await.unwrap();
        assert_eq!(next["id"], json!(1));
    }

    #[tokio::test]
    async fn test_supplied_text_id_must_be_path_safe() {
        let mut config = ResourceConfig::named("notes");
        config.id_policy = IdPolicy::Text;
        let notes = Collection::new(
            Schema::from_config(&config),
            "",
            vec![],
            Arc::new(MemoryBackend::new()),
        )
        .unwrap();

        for bad in ["a b", "a/b", "50%", "x?y", "caf\u{e9}"] {
            let err = notes
                .insert(record(json!({"id": bad, "body": "x"})))
                .await
                .unwrap_err();
            assert!(matches!(err, ApiError::Validation(_)), "{bad}");
        }

        let ok = notes
            .insert(record(json!({"id": "note-1.v2_a~b", "body": "x"})))
            .await
            .unwrap();
        assert_eq!(ok["id"], json!("note-1.v2_a~b"));
    }

    #[tokio::test]
    async fn test_text_ids_generated() {
        let mut config = ResourceConfig::named("notes");
        config.id_field = "_id".into();
        config.id_policy = IdPolicy::Text;
        let notes = Collection::new(
            Schema::from_config(&config),
            "",
            vec![],
            Arc::new(MemoryBackend::new()),
        )
        .unwrap();

        let a = notes.insert(record(json!({"body": "x"}))).await.unwrap();
        let b = notes.insert(record(json!({"body": "y"}))).await.unwrap();
        let a_id = a["_id"].as_str().unwrap();
        assert!(Uuid::parse_str(a_id).is_ok());
        assert_ne!(a["_id"], b["_id"]);

        let fetched = notes
            .get(&RecordId::Text(a_id.to_string()))
            .await
            .unwrap();
        assert_eq!(fetched, a);
    }

    #[tokio::test]
    async fn test_derived_fields_not_persisted() {
        let mut config = ResourceConfig::named("people");
        config.derived = vec![DerivedField {
            name: "fullName".into(),
            template: "{firstName} {lastName}".into(),
        }];
        let backend = Arc::new(MemoryBackend::new());
        let people =
            Collection::new(Schema::from_config(&config), "", vec![], backend.clone()).unwrap();

        let shown = people
            .insert(record(json!({"firstName": "Jane", "lastName": "Doe"})))
            .await
            .unwrap();
        assert_eq!(shown["fullName"], json!("Jane Doe"));

        let stored = backend.load().await.unwrap();
        assert!(!stored["people"][0].contains_key("fullName"));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_collection_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(FileBackend::new(dir.path().join("gone").join("data.json")));
        let users = Collection::new(
            users_schema(),
            "",
            vec![record(json!({"id": 1, "name": "A"}))],
            backend,
        )
        .unwrap();

        let err = users.insert(record(json!({"name": "B"}))).await.unwrap_err();
        assert!(matches!(err, ApiError::Storage(_)));
        assert_eq!(users.list().await.len(), 1);

        let err = users.delete(&RecordId::Number(1)).await.unwrap_err();
        assert!(matches!(err, ApiError::Storage(_)));
        assert_eq!(users.list().await.len(), 1);
    }

    #[test]
    fn test_duplicate_ids_on_load_rejected() {
        let records = vec![
            record(json!({"id": 1, "name": "A"})),
            record(json!({"id": 1, "name": "B"})),
        ];
        let result = Collection::new(users_schema(), "", records, Arc::new(MemoryBackend::new()));
        assert!(matches!(result, Err(StorageError::Corrupt(_))));
    }

    #[test]
    fn test_route_includes_mount() {
        let users =
            Collection::new(users_schema(), "/api/", vec![], Arc::new(MemoryBackend::new()))
                .unwrap();
        assert_eq!(users.route(), "/api/users");
    }
}
