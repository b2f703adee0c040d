//! Resource store
//!
//! Records are plain JSON objects. A `Registry` owns one `Collection` per
//! configured resource and is handed to the router explicitly.

mod collection;
mod id;
mod schema;

use std::collections::BTreeMap;
use std::sync::Arc;

pub use collection::Collection;
pub use id::RecordId;
pub use schema::Schema;

use crate::config::ResourceConfig;
use crate::error::StorageError;
use crate::persist::SharedBackend;

/// One stored item: field name -> JSON value
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Every collection by resource name; the persisted unit
pub type Snapshot = BTreeMap<String, Vec<Record>>;

/// All served collections, in configuration order
pub struct Registry {
    collections: Vec<Arc<Collection>>,
}

impl Registry {
    /// Build collections for `resources` from a loaded snapshot. Resources
    /// missing from the snapshot start empty.
    pub fn build(
        resources: &[ResourceConfig],
        mut snapshot: Snapshot,
        backend: &SharedBackend,
    ) -> Result<Self, StorageError> {
        let collections = resources
            .iter()
            .map(|resource| {
                let schema = Schema::from_config(resource);
                let records = snapshot.remove(&schema.name).unwrap_or_default();
                Collection::new(schema, &resource.mount, records, Arc::clone(backend))
                    .map(Arc::new)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { collections })
    }

    pub fn collections(&self) -> &[Arc<Collection>] {
        &self.collections
    }

    /// Request paths of all collections, index-aligned with `collections()`
    pub fn routes(&self) -> Vec<&str> {
        self.collections.iter().map(|c| c.route()).collect()
    }

    /// Current stored state of every collection
    pub async fn snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot::new();
        for collection in &self.collections {
            snapshot.insert(collection.schema().name.clone(), collection.records().await);
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_resources;
    use crate::persist::MemoryBackend;
    use serde_json::json;

    #[tokio::test]
    async fn test_build_reconstructs_snapshot() {
        let mut snapshot = Snapshot::new();
        snapshot.insert(
            "users".into(),
            vec![json!({"id": 4, "name": "A", "email": "a@x.com"})
                .as_object()
                .cloned()
                .unwrap()],
        );
        let backend: SharedBackend = Arc::new(MemoryBackend::new());

        let registry = Registry::build(&default_resources(), snapshot.clone(), &backend).unwrap();
        assert_eq!(registry.routes(), vec!["/users", "/products"]);

        let rebuilt = registry.snapshot().await;
        assert_eq!(rebuilt["users"], snapshot["users"]);
        assert!(rebuilt["products"].is_empty());

        let users = &registry.collections()[0];
        let next = users
            .insert(json!({"name": "B", "email": "b@x.com"}).as_object().cloned().unwrap())
            .await
            .unwrap();
        assert_eq!(next["id"], json!(5));
    }
}
