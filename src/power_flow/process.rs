use serde::Deserialize;
use std::process::Command;
use tracing::debug;

use super::{LoadFlowSolver, SolveOptions, SolverFailure};
use crate::domain::BusVoltage;
use crate::loader::NetworkModel;

/// Runs an external load flow program once per model.
///
/// Invoked as `{command} {args..} --algorithm {alg} {model_path}`. The program exits 0 and prints
/// one JSON report on stdout:
///
/// ```json
/// {"converged": true, "bus_voltages": [[0, 1.0], [1, 0.97], [2, null]]}
/// {"converged": false, "message": "Power Flow nr did not converge after 10 iterations!"}
/// ```
///
/// Voltages are listed in the network's bus order; `null` marks an unsupplied bus.
#[derive(Debug, Clone)]
pub struct ExternalProcessSolver {
    command: String,
    args: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SolverReport {
    converged: bool,
    #[serde(default)]
    bus_voltages: Vec<(u64, Option<f64>)>,
    #[serde(default)]
    message: Option<String>,
}

impl ExternalProcessSolver {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    fn interpret(stdout: &[u8]) -> Result<Vec<BusVoltage>, SolverFailure> {
        let report: SolverReport = serde_json::from_slice(stdout).map_err(|e| SolverFailure::Fault {
            message: format!("unreadable solver report: {e}"),
        })?;

        if !report.converged {
            return Err(SolverFailure::NotConverged {
                detail: report
                    .message
                    .unwrap_or_else(|| "solver reported no convergence".to_string()),
            });
        }

        Ok(report
            .bus_voltages
            .into_iter()
            .map(|(bus_id, vm_pu)| BusVoltage::new(bus_id, vm_pu.unwrap_or(f64::NAN)))
            .collect())
    }
}

impl LoadFlowSolver for ExternalProcessSolver {
    fn run(
        &self,
        model: &NetworkModel,
        options: &SolveOptions,
    ) -> Result<Vec<BusVoltage>, SolverFailure> {
        debug!(command = %self.command, model = %model.path().display(), "spawning solver");

        let output = Command::new(&self.command)
            .args(&self.args)
            .arg("--algorithm")
            .arg(options.algorithm.to_string())
            .arg(model.path())
            .output()
            .map_err(|e| SolverFailure::Fault {
                message: format!("failed to start solver '{}': {e}", self.command),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SolverFailure::Fault {
                message: format!("solver exited with {}: {}", output.status, stderr.trim()),
            });
        }

        Self::interpret(&output.stdout)
    }

    fn name(&self) -> &'static str {
        "external-process"
    }
}
