//! Load flow solver boundary
//!
//! The numerical solve happens in an external engine. This module selects the method, runs the
//! engine off the async executor and classifies what comes back: a diverged load flow is a
//! result about the grid, every other failure is a fault of the run.

pub mod process;

pub use process::ExternalProcessSolver;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::{Display, EnumString};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::BusVoltage;
use crate::loader::NetworkModel;

/// Solution method requested from the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum Algorithm {
    #[strum(serialize = "nr")]
    NewtonRaphson,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolveOptions {
    pub algorithm: Algorithm,
}

impl SolveOptions {
    pub fn newton_raphson() -> Self {
        Self {
            algorithm: Algorithm::NewtonRaphson,
        }
    }
}

/// What a solver engine reports when it does not produce voltages
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverFailure {
    #[error("Load flow did not converge: {detail}")]
    NotConverged { detail: String },
    #[error("{message}")]
    Fault { message: String },
}

/// Unclassified solver fault, fatal to the run
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{0}")]
pub struct SolverError(pub String);

#[derive(Debug, Clone, PartialEq)]
pub enum SolveOutcome {
    Converged { bus_voltages: Vec<BusVoltage> },
    Diverged { detail: String },
    SolverError(SolverError),
}

/// Synchronous, CPU-bound load flow engine
#[cfg_attr(test, mockall::automock)]
pub trait LoadFlowSolver: Send + Sync {
    fn run(
        &self,
        model: &NetworkModel,
        options: &SolveOptions,
    ) -> Result<Vec<BusVoltage>, SolverFailure>;

    fn name(&self) -> &'static str;
}

pub struct SolverAdapter {
    solver: Arc<dyn LoadFlowSolver>,
}

impl SolverAdapter {
    pub fn new(solver: Arc<dyn LoadFlowSolver>) -> Self {
        Self { solver }
    }

    /// Run Newton-Raphson on the blocking pool and classify the result.
    pub async fn solve(&self, model: &NetworkModel) -> SolveOutcome {
        let solver = Arc::clone(&self.solver);
        let expected = model.bus_ids().to_vec();
        let model = model.clone();
        let options = SolveOptions::newton_raphson();
        debug!(solver = solver.name(), algorithm = %options.algorithm, "running load flow");

        let result = tokio::task::spawn_blocking(move || solver.run(&model, &options)).await;

        match result {
            Ok(Ok(bus_voltages)) => match check_coverage(&expected, &bus_voltages) {
                Ok(()) => SolveOutcome::Converged { bus_voltages },
                Err(e) => {
                    warn!(error = %e, "Solver report does not match the network");
                    SolveOutcome::SolverError(e)
                }
            },
            Ok(Err(SolverFailure::NotConverged { detail })) => {
                warn!(%detail, "Power flow divergence");
                SolveOutcome::Diverged { detail }
            }
            Ok(Err(SolverFailure::Fault { message })) => {
                SolveOutcome::SolverError(SolverError(message))
            }
            Err(join_err) => {
                SolveOutcome::SolverError(SolverError(format!("solver worker aborted: {join_err}")))
            }
        }
    }
}

/// A converged report must cover exactly the model's buses, in index order.
fn check_coverage(expected: &[u64], reported: &[BusVoltage]) -> Result<(), SolverError> {
    if reported.len() != expected.len() {
        return Err(SolverError(format!(
            "Malformed solver result: {} bus voltages for {} buses",
            reported.len(),
            expected.len()
        )));
    }
    match expected
        .iter()
        .zip(reported)
        .find(|(id, voltage)| **id != voltage.bus_id)
    {
        Some((id, voltage)) => Err(SolverError(format!(
            "Malformed solver result: expected bus {id}, got bus {}",
            voltage.bus_id
        ))),
        None => Ok(()),
    }
}
