// In-memory backend: keeps the last written snapshot, nothing survives a restart

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{Change, Persistence};
use crate::error::StorageError;
use crate::store::{Record, Snapshot};

#[derive(Default)]
pub struct MemoryBackend {
    snapshot: Mutex<Snapshot>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Persistence for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn load(&self) -> Result<Snapshot, StorageError> {
        Ok(self.snapshot.lock().await.clone())
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        self.snapshot
            .lock()
            .await
            .extend(snapshot.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    async fn apply(
        &self,
        resource: &str,
        _change: &Change,
        records: &[Record],
    ) -> Result<(), StorageError> {
        self.snapshot
            .lock()
            .await
            .insert(resource.to_string(), records.to_vec());
        Ok(())
    }
}
