// Redis document-store backend
//
// Layout per collection:
//   <namespace>:<resource>      hash   id -> record JSON
//   <namespace>:<resource>:ids  list   ids in insertion order
//
// Every operation touches single records; there is no cross-record transaction.
// A full save clears each collection's keys before rewriting them.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::collections::BTreeMap;

use super::{Change, Persistence};
use crate::config::ResourceConfig;
use crate::error::StorageError;
use crate::logger;
use crate::store::{Record, RecordId, Snapshot};

pub struct RedisBackend {
    conn: ConnectionManager,
    namespace: String,
    /// Collection name -> identifier field
    collections: BTreeMap<String, String>,
}

impl RedisBackend {
    /// Connect and verify the server answers
    pub async fn connect(
        url: &str,
        namespace: &str,
        resources: &[ResourceConfig],
    ) -> Result<Self, StorageError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        let collections = resources
            .iter()
            .map(|r| (r.name.trim_matches('/').to_string(), r.id_field.clone()))
            .collect();

        logger::log_info(&format!("Connected to redis at {url}"));
        Ok(Self {
            conn,
            namespace: namespace.to_string(),
            collections,
        })
    }

    fn records_key(&self, resource: &str) -> String {
        records_key(&self.namespace, resource)
    }

    fn order_key(&self, resource: &str) -> String {
        order_key(&self.namespace, resource)
    }

    /// Find-all for one collection, in insertion order
    async fn find_all(&self, resource: &str) -> Result<Vec<Record>, StorageError> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = redis::cmd("LRANGE")
            .arg(self.order_key(resource))
            .arg(0)
            .arg(-1)
            .query_async(&mut conn)
            .await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let docs: Vec<Option<String>> = redis::cmd("HMGET")
            .arg(self.records_key(resource))
            .arg(&ids)
            .query_async(&mut conn)
            .await?;

        let mut records = Vec::with_capacity(docs.len());
        for (id, doc) in ids.iter().zip(docs) {
            let Some(doc) = doc else {
                logger::log_warning(&format!(
                    "redis: {resource} order list names missing record {id}"
                ));
                continue;
            };
            let record: Record = serde_json::from_str(&doc)
                .map_err(|e| StorageError::Corrupt(format!("{resource}/{id}: {e}")))?;
            records.push(record);
        }
        Ok(records)
    }

    /// Insert-one. Re-inserting an existing id replaces the document without
    /// duplicating its position.
    async fn insert_one(
        &self,
        resource: &str,
        id: &RecordId,
        record: &Record,
    ) -> Result<(), StorageError> {
        let mut conn = self.conn.clone();
        let doc = serde_json::to_string(record)?;
        let added: i64 = redis::cmd("HSET")
            .arg(self.records_key(resource))
            .arg(id.to_string())
            .arg(doc)
            .query_async(&mut conn)
            .await?;
        if added > 0 {
            let _: i64 = redis::cmd("RPUSH")
                .arg(self.order_key(resource))
                .arg(id.to_string())
                .query_async(&mut conn)
                .await?;
        }
        Ok(())
    }

    async fn replace_one(
        &self,
        resource: &str,
        id: &RecordId,
        record: &Record,
    ) -> Result<(), StorageError> {
        let mut conn = self.conn.clone();
        let doc = serde_json::to_string(record)?;
        let _: i64 = redis::cmd("HSET")
            .arg(self.records_key(resource))
            .arg(id.to_string())
            .arg(doc)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn delete_one(&self, resource: &str, id: &RecordId) -> Result<(), StorageError> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("HDEL")
            .arg(self.records_key(resource))
            .arg(id.to_string())
            .query_async(&mut conn)
            .await?;
        let _: i64 = redis::cmd("LREM")
            .arg(self.order_key(resource))
            .arg(0)
            .arg(id.to_string())
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}

fn records_key(namespace: &str, resource: &str) -> String {
    format!("{namespace}:{resource}")
}

fn order_key(namespace: &str, resource: &str) -> String {
    format!("{namespace}:{resource}:ids")
}

#[async_trait]
impl Persistence for RedisBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn load(&self) -> Result<Snapshot, StorageError> {
        let mut snapshot = Snapshot::new();
        for resource in self.collections.keys() {
            let records = self.find_all(resource).await?;
            snapshot.insert(resource.clone(), records);
        }
        Ok(snapshot)
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        let mut conn = self.conn.clone();
        for (resource, records) in snapshot {
            let _: i64 = redis::cmd("DEL")
                .arg(self.records_key(resource))
                .arg(self.order_key(resource))
                .query_async(&mut conn)
                .await?;
            let id_field = self
                .collections
                .get(resource)
                .map_or("id", String::as_str);
            for record in records {
                let id = record
                    .get(id_field)
                    .and_then(RecordId::from_json)
                    .ok_or_else(|| {
                        StorageError::Corrupt(format!("{resource} record without {id_field}"))
                    })?;
                self.insert_one(resource, &id, record).await?;
            }
        }
        Ok(())
    }

    async fn apply(
        &self,
        resource: &str,
        change: &Change,
        _records: &[Record],
    ) -> Result<(), StorageError> {
        match change {
            Change::Insert(inserted) => {
                for (id, record) in inserted {
                    self.insert_one(resource, id, record).await?;
                }
                Ok(())
            }
            Change::Replace(id, record) => self.replace_one(resource, id, record).await,
            Change::Delete(id) => self.delete_one(resource, id).await,
        }
    }

    async fn ping(&self) -> Result<(), StorageError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
