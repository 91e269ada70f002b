use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::config::{Config, StorageBackend};
use crate::loader::ModelLoader;
use crate::pipeline::{Pipeline, RunSettings};
use crate::power_flow::{ExternalProcessSolver, SolverAdapter};
use crate::repo;
use crate::storage::{HttpObjectStore, LocalObjectStore, ObjectStore};

/// Backends shared by every invocation. Built once at startup and never mutated afterwards.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    pub async fn new(cfg: &Config) -> Result<Self> {
        let objects: Arc<dyn ObjectStore> = match cfg.storage.backend {
            StorageBackend::Http => Arc::new(
                HttpObjectStore::new(&cfg.storage.endpoint)
                    .context("invalid storage.endpoint configuration")?,
            ),
            StorageBackend::Local => Arc::new(LocalObjectStore::new(&cfg.storage.local_root)),
        };

        let mut loader = ModelLoader::new(objects.clone());
        if let Some(root) = &cfg.storage.scratch_root {
            tokio::fs::create_dir_all(root).await?;
            loader = loader.with_scratch_root(root);
        }

        let solver = Arc::new(ExternalProcessSolver::new(
            cfg.solver.command.clone(),
            cfg.solver.args.clone(),
        ));
        let store = repo::connect(&cfg.results).await?;

        info!(
            objects = objects.name(),
            solver = %cfg.solver.command,
            results = store.name(),
            "backends initialized"
        );

        Ok(Self::from_pipeline(Pipeline::new(
            loader,
            SolverAdapter::new(solver),
            store,
            RunSettings::from(&cfg.compliance),
        )))
    }

    pub fn from_pipeline(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}
