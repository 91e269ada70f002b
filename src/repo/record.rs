use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::domain::{ComplianceRecord, ComplianceStatus, ViolationKind, VOLTAGE_DECIMALS};

const PU_SCALE: i64 = 10_000;

/// Per-unit voltage as a fixed-precision decimal with four fractional digits.
///
/// Stored as an integer count of ten-thousandths so the persisted value never carries binary
/// floating point noise. Serializes as a JSON number whose text is the exact decimal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PuDecimal(i64);

impl PuDecimal {
    /// The one float to decimal conversion on the way into the store.
    pub fn from_f64(value: f64) -> Self {
        debug_assert_eq!(10i64.pow(VOLTAGE_DECIMALS as u32), PU_SCALE);
        Self((value * PU_SCALE as f64).round_ties_even() as i64)
    }

    pub fn ten_thousandths(&self) -> i64 {
        self.0
    }

    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / PU_SCALE as f64
    }
}

impl fmt::Display for PuDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:04}", abs / PU_SCALE as u64, abs % PU_SCALE as u64)
    }
}

impl Serialize for PuDecimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // units / 10^4 is the nearest double to the decimal, whose shortest repr is that decimal
        serializer.serialize_f64(self.to_f64())
    }
}

impl<'de> Deserialize<'de> for PuDecimal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        f64::deserialize(deserializer).map(Self::from_f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredViolation {
    pub bus_id: u64,
    pub voltage_pu: PuDecimal,
    #[serde(rename = "type")]
    pub kind: ViolationKind,
}

/// A compliance record in its persisted shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub grid_id: String,
    pub timestamp: String,
    pub status: ComplianceStatus,
    pub compliance_standard: String,
    pub violations: Vec<StoredViolation>,
    pub processed_by: String,
}

impl From<&ComplianceRecord> for StoredRecord {
    fn from(record: &ComplianceRecord) -> Self {
        Self {
            grid_id: record.grid_id.clone(),
            timestamp: record.timestamp.to_rfc3339(),
            status: record.status,
            compliance_standard: record.compliance_standard.clone(),
            violations: record
                .violations
                .iter()
                .map(|v| StoredViolation {
                    bus_id: v.bus_id(),
                    voltage_pu: PuDecimal::from_f64(v.voltage_pu()),
                    kind: v.kind(),
                })
                .collect(),
            processed_by: record.processed_by.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Violation, VoltageBand};
    use rstest::rstest;

    #[rstest]
    #[case(0.85, 8500, "0.8500")]
    #[case(1.12, 11200, "1.1200")]
    #[case(1.1234, 11234, "1.1234")]
    #[case(0.0001, 1, "0.0001")]
    fn test_decimal_conversion(#[case] value: f64, #[case] units: i64, #[case] text: &str) {
        let d = PuDecimal::from_f64(value);
        assert_eq!(d.ten_thousandths(), units);
        assert_eq!(d.to_string(), text);
    }

    #[test]
    fn test_decimal_json_text_is_exact() {
        let json = serde_json::to_string(&PuDecimal::from_f64(0.85)).unwrap();
        assert_eq!(json, "0.85");
        let json = serde_json::to_string(&PuDecimal::from_f64(1.1234)).unwrap();
        assert_eq!(json, "1.1234");

        let back: PuDecimal = serde_json::from_str("1.1234").unwrap();
        assert_eq!(back.ten_thousandths(), 11234);
    }

    #[test]
    fn test_stored_record_schema() {
        let band = VoltageBand::default();
        let record = ComplianceRecord::evaluated(
            "scenarios/berlin_grid.json",
            ComplianceStatus::Fail,
            vec![Violation::detect(1, 0.849_97, &band).unwrap()],
            "gridcheck",
        );

        let json = serde_json::to_value(StoredRecord::from(&record)).unwrap();
        assert_eq!(json["grid_id"], "scenarios/berlin_grid.json");
        assert_eq!(json["status"], "FAIL");
        assert_eq!(json["compliance_standard"], "VDE-AR-N 4110");
        assert_eq!(json["processed_by"], "gridcheck");
        assert_eq!(json["violations"][0]["bus_id"], 1);
        assert_eq!(json["violations"][0]["voltage_pu"], 0.85);
        assert_eq!(json["violations"][0]["type"], "Undervoltage");
        assert!(json["timestamp"].as_str().unwrap().contains('T'));
    }
}
