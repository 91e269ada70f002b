use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::{ComplianceStore, PersistenceError, StoredRecord};
use crate::domain::ComplianceRecord;

/// Process-local result store
#[derive(Debug, Default)]
pub struct MemoryComplianceStore {
    items: RwLock<HashMap<String, StoredRecord>>,
}

impl MemoryComplianceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

#[async_trait]
impl ComplianceStore for MemoryComplianceStore {
    async fn put(&self, record: &ComplianceRecord) -> Result<(), PersistenceError> {
        let stored = StoredRecord::from(record);
        self.items.write().insert(stored.grid_id.clone(), stored);
        Ok(())
    }

    async fn get(&self, grid_id: &str) -> Result<Option<StoredRecord>, PersistenceError> {
        Ok(self.items.read().get(grid_id).cloned())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
