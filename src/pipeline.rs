//! Per-event compliance run: load, solve, evaluate, persist.
//!
//! Only a diverged load flow is turned into a record. Every other failure is logged and handed
//! back to the caller unchanged so the delivering platform can retry or dead-letter the event.

use serde::Serialize;
use std::sync::Arc;
use strum::Display;
use thiserror::Error;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use crate::config::ComplianceConfig;
use crate::domain::{ComplianceRecord, ComplianceStatus, IngestEvent, VoltageBand};
use crate::evaluator::evaluate;
use crate::loader::{LoadError, ModelLoader, ParseError};
use crate::power_flow::{SolveOutcome, SolverAdapter, SolverError};
use crate::repo::{ComplianceStore, PersistenceError};
use crate::storage::TransferError;
use crate::telemetry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Stage {
    Started,
    Loaded,
    Solved,
    Evaluated,
    Persisted,
    Done,
    Failed,
}

/// A run that ended without a record. Display is the underlying error's message.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl From<LoadError> for PipelineError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::Transfer(e) => Self::Transfer(e),
            LoadError::Parse(e) => Self::Parse(e),
        }
    }
}

impl PipelineError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transfer(_) => "TransferError",
            Self::Parse(_) => "ParseError",
            Self::Solver(_) => "SolverError",
            Self::Persistence(_) => "PersistenceError",
        }
    }
}

/// Successful run summary reported to the invoking platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationResult {
    pub status: ComplianceStatus,
    pub file: String,
}

/// `{"statusCode": 200, "body": "{\"status\": ..., \"file\": ...}"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl InvocationResult {
    pub fn into_response(self) -> Result<InvocationResponse, serde_json::Error> {
        Ok(InvocationResponse {
            status_code: 200,
            body: serde_json::to_string(&self)?,
        })
    }
}

/// Fixed per-process settings applied to every run
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub band: VoltageBand,
    pub standard: String,
    pub processed_by: String,
}

impl From<&ComplianceConfig> for RunSettings {
    fn from(cfg: &ComplianceConfig) -> Self {
        Self {
            band: cfg.band(),
            standard: cfg.standard.clone(),
            processed_by: cfg.processed_by.clone(),
        }
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self::from(&ComplianceConfig::default())
    }
}

pub struct Pipeline {
    loader: ModelLoader,
    solver: SolverAdapter,
    store: Arc<dyn ComplianceStore>,
    settings: RunSettings,
}

impl Pipeline {
    pub fn new(
        loader: ModelLoader,
        solver: SolverAdapter,
        store: Arc<dyn ComplianceStore>,
        settings: RunSettings,
    ) -> Self {
        Self {
            loader,
            solver,
            store,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn ComplianceStore> {
        &self.store
    }

    /// Check one uploaded model and persist its verdict.
    pub async fn run(&self, event: IngestEvent) -> Result<InvocationResult, PipelineError> {
        let span = telemetry::check_span(Uuid::new_v4(), &event);
        let mut stage = Stage::Started;

        let result = self.execute(&event, &mut stage).instrument(span.clone()).await;

        let _entered = span.enter();
        match &result {
            Ok(outcome) => {
                stage = Stage::Done;
                info!(%stage, status = %outcome.status, "compliance check finished");
            }
            Err(e) => {
                error!(
                    severity = "CRITICAL",
                    failed_after = %stage,
                    stage = %Stage::Failed,
                    kind = e.kind(),
                    error = %e,
                    "Critical Failure"
                );
                #[cfg(feature = "metrics")]
                metrics::counter!("gridcheck_runs_total", "status" => "FAILED").increment(1);
            }
        }
        result
    }

    async fn execute(
        &self,
        event: &IngestEvent,
        stage: &mut Stage,
    ) -> Result<InvocationResult, PipelineError> {
        info!("Starting grid compliance check");

        let model = self.loader.load(event).await?;
        *stage = Stage::Loaded;

        let outcome = self.solver.solve(&model).await;
        drop(model);

        let record = match outcome {
            SolveOutcome::Converged { bus_voltages } => {
                *stage = Stage::Solved;
                let evaluation = evaluate(&bus_voltages, &self.settings.band);
                *stage = Stage::Evaluated;
                if evaluation.is_compliant() {
                    info!(buses = bus_voltages.len(), "Compliance result: all buses within band");
                } else {
                    warn!(
                        status = %evaluation.status,
                        violations = evaluation.violations.len(),
                        buses = bus_voltages.len(),
                        "Compliance result: voltage band violated"
                    );
                }
                ComplianceRecord::evaluated(
                    event.object_key.clone(),
                    evaluation.status,
                    evaluation.violations,
                    self.settings.processed_by.clone(),
                )
                .with_standard(self.settings.standard.clone())
            }
            SolveOutcome::Diverged { detail } => {
                *stage = Stage::Solved;
                error!(%detail, "Power flow divergence, recording ERROR verdict");
                ComplianceRecord::diverged(
                    event.object_key.clone(),
                    self.settings.processed_by.clone(),
                )
            }
            SolveOutcome::SolverError(e) => return Err(e.into()),
        };

        self.store.put(&record).await?;
        *stage = Stage::Persisted;

        #[cfg(feature = "metrics")]
        metrics::counter!("gridcheck_runs_total", "status" => record.status.as_ref().to_string())
            .increment(1);

        Ok(InvocationResult {
            status: record.status,
            file: record.grid_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BusVoltage, DIVERGENCE_STANDARD};
    use crate::power_flow::{MockLoadFlowSolver, SolverFailure};
    use crate::repo::{MemoryComplianceStore, MockComplianceStore};
    use crate::storage::LocalObjectStore;
    use std::path::Path;

    const KEY: &str = "scenarios/berlin_grid.json";

    fn objects_with_model() -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("grids").join(KEY);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, r#"{"bus": {"index": [0, 1, 2]}}"#).unwrap();
        root
    }

    fn solver_returning(
        result: Result<Vec<BusVoltage>, SolverFailure>,
    ) -> MockLoadFlowSolver {
        let mut solver = MockLoadFlowSolver::new();
        solver.expect_name().return_const("mock");
        solver.expect_run().times(1).return_once(move |_, _| result);
        solver
    }

    fn pipeline(
        objects: &Path,
        solver: MockLoadFlowSolver,
        store: Arc<dyn ComplianceStore>,
    ) -> Pipeline {
        Pipeline::new(
            ModelLoader::new(Arc::new(LocalObjectStore::new(objects))),
            SolverAdapter::new(Arc::new(solver)),
            store,
            RunSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_out_of_band_grid_fails() {
        let objects = objects_with_model();
        let store = Arc::new(MemoryComplianceStore::new());
        let solver = solver_returning(Ok(vec![
            BusVoltage::new(0, 1.00),
            BusVoltage::new(1, 0.85),
            BusVoltage::new(2, 1.12),
        ]));

        let result = pipeline(objects.path(), solver, store.clone())
            .run(IngestEvent::new("grids", KEY))
            .await
            .unwrap();

        assert_eq!(result, InvocationResult { status: ComplianceStatus::Fail, file: KEY.into() });
        let stored = store.get(KEY).await.unwrap().unwrap();
        assert_eq!(stored.status, ComplianceStatus::Fail);
        assert_eq!(stored.violations.len(), 2);
        assert_eq!(stored.violations[0].bus_id, 1);
        assert_eq!(stored.violations[0].voltage_pu.ten_thousandths(), 8500);
        assert_eq!(stored.violations[1].bus_id, 2);
        assert_eq!(stored.violations[1].voltage_pu.ten_thousandths(), 11200);
    }

    #[tokio::test]
    async fn test_in_band_grid_passes() {
        let objects = objects_with_model();
        let store = Arc::new(MemoryComplianceStore::new());
        let solver = solver_returning(Ok(vec![
            BusVoltage::new(0, 1.00),
            BusVoltage::new(1, 0.95),
            BusVoltage::new(2, 1.02),
        ]));

        let result = pipeline(objects.path(), solver, store.clone())
            .run(IngestEvent::new("grids", KEY))
            .await
            .unwrap();

        assert_eq!(result.status, ComplianceStatus::Pass);
        let stored = store.get(KEY).await.unwrap().unwrap();
        assert!(stored.violations.is_empty());
        assert_eq!(stored.compliance_standard, "VDE-AR-N 4110");
    }

    #[tokio::test]
    async fn test_divergence_records_error_once() {
        let objects = objects_with_model();
        let solver = solver_returning(Err(SolverFailure::NotConverged {
            detail: "10 iterations".into(),
        }));

        let mut store = MockComplianceStore::new();
        store
            .expect_put()
            .withf(|r| {
                r.status == ComplianceStatus::Error
                    && r.violations.is_empty()
                    && r.compliance_standard == DIVERGENCE_STANDARD
                    && r.grid_id == KEY
            })
            .times(1)
            .returning(|_| Ok(()));

        let result = pipeline(objects.path(), solver, Arc::new(store))
            .run(IngestEvent::new("grids", KEY))
            .await
            .unwrap();
        assert_eq!(result.status, ComplianceStatus::Error);
    }

    #[tokio::test]
    async fn test_solver_fault_persists_nothing() {
        let objects = objects_with_model();
        let solver = solver_returning(Err(SolverFailure::Fault {
            message: "KeyError: 'ext_grid'".into(),
        }));
        let mut store = MockComplianceStore::new();
        store.expect_put().never();

        let err = pipeline(objects.path(), solver, Arc::new(store))
            .run(IngestEvent::new("grids", KEY))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Solver(_)));
        assert_eq!(err.to_string(), "KeyError: 'ext_grid'");
    }

    #[tokio::test]
    async fn test_partial_solver_report_persists_nothing() {
        let objects = objects_with_model();
        let solver = solver_returning(Ok(vec![BusVoltage::new(0, 1.0), BusVoltage::new(1, 1.0)]));
        let mut store = MockComplianceStore::new();
        store.expect_put().never();

        let err = pipeline(objects.path(), solver, Arc::new(store))
            .run(IngestEvent::new("grids", KEY))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Solver(_)));
        assert!(err.to_string().contains("2 bus voltages for 3 buses"));
    }

    #[tokio::test]
    async fn test_missing_object_propagates_without_record() {
        let objects = tempfile::tempdir().unwrap();
        let mut solver = MockLoadFlowSolver::new();
        solver.expect_run().never();
        let mut store = MockComplianceStore::new();
        store.expect_put().never();

        let err = pipeline(objects.path(), solver, Arc::new(store))
            .run(IngestEvent::new("grids", KEY))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Transfer(TransferError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_unparseable_model_propagates_without_record() {
        let objects = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(objects.path().join("grids")).unwrap();
        std::fs::write(objects.path().join("grids/bad.json"), "[]").unwrap();
        let mut solver = MockLoadFlowSolver::new();
        solver.expect_run().never();
        let mut store = MockComplianceStore::new();
        store.expect_put().never();

        let err = pipeline(objects.path(), solver, Arc::new(store))
            .run(IngestEvent::new("grids", "bad.json"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ParseError");
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let objects = objects_with_model();
        let solver = solver_returning(Ok(vec![
            BusVoltage::new(0, 1.0),
            BusVoltage::new(1, 1.0),
            BusVoltage::new(2, 1.0),
        ]));
        let mut store = MockComplianceStore::new();
        store
            .expect_put()
            .times(1)
            .returning(|_| Err(PersistenceError::Unavailable("throttled".into())));

        let err = pipeline(objects.path(), solver, Arc::new(store))
            .run(IngestEvent::new("grids", KEY))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Persistence(_)));
    }

    #[test]
    fn test_response_envelope() {
        let response = InvocationResult {
            status: ComplianceStatus::Fail,
            file: KEY.into(),
        }
        .into_response()
        .unwrap();

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["statusCode"], 200);
        assert_eq!(
            json["body"],
            r#"{"status":"FAIL","file":"scenarios/berlin_grid.json"}"#
        );
    }
}
