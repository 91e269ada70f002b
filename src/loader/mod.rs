//! Fetches an uploaded grid model into invocation-scoped scratch space and parses it.

pub mod network;

pub use network::{NetworkModel, ParseError};

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::IngestEvent;
use crate::storage::{ObjectStore, TransferError};

/// Scratch filename used when the key has no usable final segment
pub const FALLBACK_FILE_NAME: &str = "model.json";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

pub struct ModelLoader {
    store: Arc<dyn ObjectStore>,
    scratch_root: Option<PathBuf>,
}

impl ModelLoader {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            scratch_root: None,
        }
    }

    /// Create scratch directories under `root` instead of the OS temp dir
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    pub async fn load(&self, event: &IngestEvent) -> Result<NetworkModel, LoadError> {
        let scratch = match &self.scratch_root {
            Some(root) => tempfile::Builder::new().prefix("gridcheck-").tempdir_in(root),
            None => tempfile::Builder::new().prefix("gridcheck-").tempdir(),
        }
        .map_err(TransferError::from)?;

        let local_path = scratch.path().join(scratch_file_name(&event.object_key));
        let bytes = self
            .store
            .fetch(&event.source_bucket, &event.object_key, &local_path)
            .await?;
        debug!(path = %local_path.display(), bytes, store = self.store.name(), "model downloaded");

        let raw = tokio::fs::read(&local_path).await.map_err(TransferError::from)?;
        let model = NetworkModel::parse(&raw, local_path)?.with_scratch(scratch);

        info!(
            buses = model.bus_count(),
            lines = model.line_count(),
            trafos = model.trafo_count(),
            "Network loaded"
        );
        Ok(model)
    }
}

/// Scratch filename for an object key: its final `/` segment, never a path.
pub fn scratch_file_name(object_key: &str) -> String {
    let last = object_key.rsplit('/').next().unwrap_or_default();
    if last.is_empty() || last == "." || last == ".." || last.contains('\\') || last.contains('\0') {
        FALLBACK_FILE_NAME.to_string()
    } else {
        last.to_string()
    }
}
