use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use super::{ComplianceStore, PersistenceError, StoredRecord};
use crate::domain::ComplianceRecord;

/// Result table kept in a single JSON document on local disk.
///
/// Every put rewrites the document through a sibling temp file and a rename, so readers never
/// observe a half-written table.
pub struct FileComplianceStore {
    path: PathBuf,
    table: Mutex<BTreeMap<String, StoredRecord>>,
}

impl FileComplianceStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let table = match tokio::fs::read(&path).await {
            Ok(raw) if raw.is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_slice(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), records = table.len(), "opened result table");

        Ok(Self {
            path,
            table: Mutex::new(table),
        })
    }

    async fn flush(&self, table: &BTreeMap<String, StoredRecord>) -> Result<(), PersistenceError> {
        let encoded = serde_json::to_vec_pretty(table)?;
        let tmp = self.path.with_extension("json.tmp");

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&encoded).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl ComplianceStore for FileComplianceStore {
    async fn put(&self, record: &ComplianceRecord) -> Result<(), PersistenceError> {
        let stored = StoredRecord::from(record);
        let mut table = self.table.lock().await;

        let previous = table.insert(stored.grid_id.clone(), stored);
        if let Err(e) = self.flush(&table).await {
            // keep memory in line with disk
            match previous {
                Some(prev) => table.insert(prev.grid_id.clone(), prev),
                None => table.remove(&record.grid_id),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn get(&self, grid_id: &str) -> Result<Option<StoredRecord>, PersistenceError> {
        Ok(self.table.lock().await.get(grid_id).cloned())
    }

    /// Create and remove a file next to the table, the same directory a flush renames into.
    async fn ping(&self) -> Result<(), PersistenceError> {
        let marker = self.path.with_extension("json.ping");
        tokio::fs::write(&marker, b"").await?;
        tokio::fs::remove_file(&marker).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
