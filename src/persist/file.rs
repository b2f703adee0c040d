// File persistence backend
// Keeps the whole snapshot in one JSON file: {"users": [...], "products": [...]}

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

use super::{Change, Persistence};
use crate::error::StorageError;
use crate::logger;
use crate::store::{Record, Snapshot};

/// Snapshot file manager
pub struct FileBackend {
    /// Path to the snapshot file
    path: PathBuf,
    /// Last written snapshot. Held while writing so saves never interleave.
    state: Mutex<Snapshot>,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(Snapshot::new()),
        }
    }

    #[allow(clippy::missing_const_for_fn)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write to `<file>.tmp` then rename over the target, so readers see
    /// either the old file or the new one.
    async fn write_atomic(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        let content = serde_json::to_vec_pretty(snapshot)?;
        let tmp_path = self.tmp_path();

        fs::write(&tmp_path, content)
            .await
            .map_err(|source| StorageError::Io {
                action: "write",
                path: tmp_path.clone(),
                source,
            })?;

        if let Err(source) = fs::rename(&tmp_path, &self.path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io {
                action: "rename",
                path: self.path.clone(),
                source,
            });
        }
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl Persistence for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn load(&self) -> Result<Snapshot, StorageError> {
        let snapshot = match fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Snapshot::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                StorageError::Corrupt(format!("{}: {e}", self.path.display()))
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                logger::log_info(&format!(
                    "No snapshot at {}, starting empty",
                    self.path.display()
                ));
                Snapshot::new()
            }
            Err(source) => {
                return Err(StorageError::Io {
                    action: "read",
                    path: self.path.clone(),
                    source,
                })
            }
        };

        *self.state.lock().await = snapshot.clone();
        Ok(snapshot)
    }

    /// Collections absent from `snapshot` keep whatever was last loaded
    async fn save(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        next.extend(snapshot.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.write_atomic(&next).await?;
        *state = next;
        Ok(())
    }

    async fn apply(
        &self,
        resource: &str,
        _change: &Change,
        records: &[Record],
    ) -> Result<(), StorageError> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        next.insert(resource.to_string(), records.to_vec());
        self.write_atomic(&next).await?;
        *state = next;
        Ok(())
    }
}
