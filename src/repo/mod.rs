pub mod file;
pub mod memory;
pub mod record;

#[cfg(feature = "db")]
pub mod pg;

pub use file::FileComplianceStore;
pub use memory::MemoryComplianceStore;
pub use record::{PuDecimal, StoredRecord, StoredViolation};

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::config::{ResultsBackend, ResultsConfig};
use crate::domain::ComplianceRecord;

/// Result store write or read failure
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Result store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Result store encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[cfg(feature = "db")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Result store unavailable: {0}")]
    Unavailable(String),
}

/// Durable home of compliance verdicts, one item per grid id.
///
/// `put` replaces any existing item wholesale. Overlapping writers for the same grid id are
/// last-write-wins.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ComplianceStore: Send + Sync {
    async fn put(&self, record: &ComplianceRecord) -> Result<(), PersistenceError>;

    async fn get(&self, grid_id: &str) -> Result<Option<StoredRecord>, PersistenceError>;

    /// Check that the backing storage can still take writes. In-process stores are always
    /// reachable.
    async fn ping(&self) -> Result<(), PersistenceError> {
        Ok(())
    }

    fn name(&self) -> &'static str;
}

/// Build the configured result store. Called once at startup.
pub async fn connect(cfg: &ResultsConfig) -> Result<Arc<dyn ComplianceStore>> {
    let store: Arc<dyn ComplianceStore> = match cfg.backend {
        ResultsBackend::Memory => Arc::new(MemoryComplianceStore::new()),
        ResultsBackend::File => Arc::new(FileComplianceStore::open(&cfg.path).await?),
        #[cfg(feature = "db")]
        ResultsBackend::Postgres => {
            Arc::new(pg::PgComplianceStore::connect(&cfg.url, &cfg.table).await?)
        }
        #[cfg(not(feature = "db"))]
        ResultsBackend::Postgres => {
            anyhow::bail!("results.backend = \"postgres\" requires the 'db' feature")
        }
    };
    info!(store = store.name(), table = %cfg.table, "result store ready");
    Ok(store)
}
