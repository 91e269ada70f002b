use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Lower edge of the permitted voltage band (per-unit)
pub const VOLTAGE_MIN_PU: f64 = 0.90;
/// Upper edge of the permitted voltage band (per-unit)
pub const VOLTAGE_MAX_PU: f64 = 1.10;

/// Standard recorded for evaluated grids
pub const COMPLIANCE_STANDARD: &str = "VDE-AR-N 4110";
/// Standard recorded when the load flow did not converge
pub const DIVERGENCE_STANDARD: &str = "Divergence";
/// Default `processed_by` tag written with every record
pub const DEFAULT_PROCESSED_BY: &str = "gridcheck";

/// Number of fractional digits kept for persisted voltages
pub const VOLTAGE_DECIMALS: i32 = 4;

/// Solved voltage magnitude of a single bus
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BusVoltage {
    pub bus_id: u64,
    pub vm_pu: f64,
}

impl BusVoltage {
    pub fn new(bus_id: u64, vm_pu: f64) -> Self {
        Self { bus_id, vm_pu }
    }
}

/// Permitted steady-state voltage band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoltageBand {
    pub min_pu: f64,
    pub max_pu: f64,
}

impl VoltageBand {
    /// Band enforced by VDE-AR-N 4110 for medium-voltage connections
    pub const VDE_AR_N_4110: VoltageBand = VoltageBand {
        min_pu: VOLTAGE_MIN_PU,
        max_pu: VOLTAGE_MAX_PU,
    };

    /// Classify a voltage against the band. `None` means compliant.
    ///
    /// The undervoltage comparison runs first. NaN (an unsupplied bus) is never a violation.
    pub fn classify(&self, vm_pu: f64) -> Option<ViolationKind> {
        if vm_pu < self.min_pu {
            Some(ViolationKind::Undervoltage)
        } else if vm_pu > self.max_pu {
            Some(ViolationKind::Overvoltage)
        } else {
            None
        }
    }
}

impl Default for VoltageBand {
    fn default() -> Self {
        Self::VDE_AR_N_4110
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr)]
pub enum ViolationKind {
    Undervoltage,
    Overvoltage,
}

/// A bus whose voltage lies outside the permitted band
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    bus_id: u64,
    voltage_pu: f64,
    #[serde(rename = "type")]
    kind: ViolationKind,
}

impl Violation {
    /// Build a violation for `vm_pu`, or `None` when the voltage is inside the band.
    ///
    /// The kind is always derived from the unrounded voltage.
    pub fn detect(bus_id: u64, vm_pu: f64, band: &VoltageBand) -> Option<Self> {
        band.classify(vm_pu).map(|kind| Self {
            bus_id,
            voltage_pu: round_pu(vm_pu),
            kind,
        })
    }

    pub fn bus_id(&self) -> u64 {
        self.bus_id
    }

    pub fn voltage_pu(&self) -> f64 {
        self.voltage_pu
    }

    pub fn kind(&self) -> ViolationKind {
        self.kind
    }
}

/// Round a per-unit voltage to four fractional digits, ties to even.
pub fn round_pu(vm_pu: f64) -> f64 {
    let scale = 10f64.powi(VOLTAGE_DECIMALS);
    (vm_pu * scale).round_ties_even() / scale
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum ComplianceStatus {
    Pass,
    Fail,
    Error,
}

/// Verdict for one grid model, written once per invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceRecord {
    pub grid_id: String,
    pub timestamp: DateTime<Utc>,
    pub status: ComplianceStatus,
    pub compliance_standard: String,
    pub violations: Vec<Violation>,
    pub processed_by: String,
}

impl ComplianceRecord {
    /// Record for a grid whose load flow converged and was evaluated
    pub fn evaluated(
        grid_id: impl Into<String>,
        status: ComplianceStatus,
        violations: Vec<Violation>,
        processed_by: impl Into<String>,
    ) -> Self {
        Self {
            grid_id: grid_id.into(),
            timestamp: Utc::now(),
            status,
            compliance_standard: COMPLIANCE_STANDARD.to_string(),
            violations,
            processed_by: processed_by.into(),
        }
    }

    /// Record for a grid whose load flow diverged
    pub fn diverged(grid_id: impl Into<String>, processed_by: impl Into<String>) -> Self {
        Self {
            grid_id: grid_id.into(),
            timestamp: Utc::now(),
            status: ComplianceStatus::Error,
            compliance_standard: DIVERGENCE_STANDARD.to_string(),
            violations: Vec::new(),
            processed_by: processed_by.into(),
        }
    }

    pub fn with_standard(mut self, standard: impl Into<String>) -> Self {
        self.compliance_standard = standard.into();
        self
    }
}
