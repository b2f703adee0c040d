//! Persistence adapters
//!
//! A backend loads the full snapshot once at startup and is told about every
//! mutation afterwards (write-through). Whole-snapshot backends ignore the
//! change detail and rewrite everything; record-oriented backends apply the
//! change one record at a time.

mod file;
mod memory;
mod redis_backend;

use async_trait::async_trait;
use std::sync::Arc;

pub use self::file::FileBackend;
pub use self::memory::MemoryBackend;
pub use self::redis_backend::RedisBackend;

use crate::config::{BackendKind, Config};
use crate::error::StorageError;
use crate::store::{Record, RecordId, Snapshot};

/// What a mutating operation did to one collection
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Insert(Vec<(RecordId, Record)>),
    Replace(RecordId, Record),
    Delete(RecordId),
}

#[async_trait]
pub trait Persistence: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Read every stored collection
    async fn load(&self) -> Result<Snapshot, StorageError>;

    /// Write a complete snapshot
    async fn save(&self, snapshot: &Snapshot) -> Result<(), StorageError>;

    /// Persist one mutation. `records` is the collection's full contents
    /// after the change.
    async fn apply(
        &self,
        resource: &str,
        change: &Change,
        records: &[Record],
    ) -> Result<(), StorageError>;

    /// Check the medium is reachable
    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

pub type SharedBackend = Arc<dyn Persistence>;

/// Open the configured backend. Connection failures are returned to the
/// caller, which treats them as fatal at startup.
pub async fn open(config: &Config) -> Result<SharedBackend, StorageError> {
    let backend: SharedBackend = match config.storage.backend {
        BackendKind::Memory => Arc::new(MemoryBackend::new()),
        BackendKind::File => Arc::new(FileBackend::new(&config.storage.path)),
        BackendKind::Redis => Arc::new(
            RedisBackend::connect(
                &config.storage.url,
                &config.storage.namespace,
                &config.resources,
            )
            .await?,
        ),
    };
    backend.ping().await?;
    Ok(backend)
}
