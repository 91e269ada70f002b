//! Voltage compliance rule.
//!
//! Pure over solved bus voltages: no solver, storage or clock access happens here.

use crate::domain::{BusVoltage, ComplianceStatus, Violation, VoltageBand};

/// Outcome of checking one solved network against a voltage band
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub status: ComplianceStatus,
    pub violations: Vec<Violation>,
}

impl Evaluation {
    pub fn is_compliant(&self) -> bool {
        self.status == ComplianceStatus::Pass
    }
}

/// Check every bus against `band`, keeping the solver's bus order.
pub fn evaluate(bus_voltages: &[BusVoltage], band: &VoltageBand) -> Evaluation {
    let violations: Vec<Violation> = bus_voltages
        .iter()
        .filter_map(|bus| Violation::detect(bus.bus_id, bus.vm_pu, band))
        .collect();

    let status = if violations.is_empty() {
        ComplianceStatus::Pass
    } else {
        ComplianceStatus::Fail
    };

    Evaluation { status, violations }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{round_pu, ViolationKind, VOLTAGE_MAX_PU, VOLTAGE_MIN_PU};
    use proptest::prelude::*;

    fn buses(values: &[(u64, f64)]) -> Vec<BusVoltage> {
        values.iter().map(|&(id, vm)| BusVoltage::new(id, vm)).collect()
    }

    #[test]
    fn test_mixed_violations_in_bus_order() {
        let eval = evaluate(
            &buses(&[(0, 1.00), (1, 0.85), (2, 1.12)]),
            &VoltageBand::VDE_AR_N_4110,
        );

        assert_eq!(eval.status, ComplianceStatus::Fail);
        assert_eq!(eval.violations.len(), 2);

        assert_eq!(eval.violations[0].bus_id(), 1);
        assert_eq!(eval.violations[0].voltage_pu(), 0.85);
        assert_eq!(eval.violations[0].kind(), ViolationKind::Undervoltage);

        assert_eq!(eval.violations[1].bus_id(), 2);
        assert_eq!(eval.violations[1].voltage_pu(), 1.12);
        assert_eq!(eval.violations[1].kind(), ViolationKind::Overvoltage);
    }

    #[test]
    fn test_all_within_band_passes() {
        let eval = evaluate(&buses(&[(0, 1.00), (1, 0.95)]), &VoltageBand::default());
        assert_eq!(eval.status, ComplianceStatus::Pass);
        assert!(eval.violations.is_empty());
        assert!(eval.is_compliant());
    }

    #[test]
    fn test_band_edges_are_compliant() {
        let eval = evaluate(
            &buses(&[(0, VOLTAGE_MIN_PU), (1, VOLTAGE_MAX_PU)]),
            &VoltageBand::default(),
        );
        assert!(eval.is_compliant());
    }

    #[test]
    fn test_native_order_is_kept_when_not_ascending() {
        let eval = evaluate(&buses(&[(7, 0.5), (3, 1.5)]), &VoltageBand::default());
        let ids: Vec<u64> = eval.violations.iter().map(|v| v.bus_id()).collect();
        assert_eq!(ids, vec![7, 3]);
    }

    #[test]
    fn test_empty_network_passes() {
        assert!(evaluate(&[], &VoltageBand::default()).is_compliant());
    }

    #[test]
    fn test_isolated_bus_is_ignored() {
        let eval = evaluate(&buses(&[(0, f64::NAN), (1, 1.0)]), &VoltageBand::default());
        assert!(eval.is_compliant());
    }

    #[test]
    fn test_custom_band() {
        let band = VoltageBand { min_pu: 0.95, max_pu: 1.05 };
        let eval = evaluate(&buses(&[(0, 0.94), (1, 1.0), (2, 1.06)]), &band);
        assert_eq!(eval.violations.len(), 2);
    }

    proptest! {
        #[test]
        fn prop_in_band_always_passes(values in prop::collection::vec(VOLTAGE_MIN_PU..=VOLTAGE_MAX_PU, 0..64)) {
            let input: Vec<BusVoltage> = values
                .iter()
                .enumerate()
                .map(|(i, &vm)| BusVoltage::new(i as u64, vm))
                .collect();
            let eval = evaluate(&input, &VoltageBand::default());
            prop_assert_eq!(eval.status, ComplianceStatus::Pass);
            prop_assert!(eval.violations.is_empty());
        }

        #[test]
        fn prop_one_violation_per_out_of_band_bus(values in prop::collection::vec(0.5f64..1.5, 1..64)) {
            let input: Vec<BusVoltage> = values
                .iter()
                .enumerate()
                .map(|(i, &vm)| BusVoltage::new(i as u64, vm))
                .collect();
            let band = VoltageBand::default();
            let out_of_band = values.iter().filter(|&&vm| band.classify(vm).is_some()).count();

            let eval = evaluate(&input, &band);
            prop_assert_eq!(eval.violations.len(), out_of_band);
            prop_assert_eq!(eval.status == ComplianceStatus::Fail, out_of_band > 0);

            for v in &eval.violations {
                let raw = values[v.bus_id() as usize];
                let expected = if raw < VOLTAGE_MIN_PU {
                    ViolationKind::Undervoltage
                } else {
                    ViolationKind::Overvoltage
                };
                prop_assert_eq!(v.kind(), expected);
            }
        }

        #[test]
        fn prop_rounding_is_idempotent(values in prop::collection::vec(0.5f64..1.5, 1..32)) {
            let raw: Vec<BusVoltage> = values
                .iter()
                .enumerate()
                .map(|(i, &vm)| BusVoltage::new(i as u64, vm))
                .collect();
            let rounded: Vec<BusVoltage> = raw
                .iter()
                .map(|b| BusVoltage::new(b.bus_id, round_pu(b.vm_pu)))
                .collect();
            let band = VoltageBand::default();

            let from_raw = evaluate(&raw, &band);
            let from_rounded = evaluate(&rounded, &band);

            // Only buses flagged in both runs are comparable: rounding can move a value onto a band edge.
            for v in &from_rounded.violations {
                if let Some(r) = from_raw.violations.iter().find(|r| r.bus_id() == v.bus_id()) {
                    prop_assert_eq!(r.voltage_pu(), v.voltage_pu());
                }
            }
            for v in &from_raw.violations {
                prop_assert_eq!(round_pu(v.voltage_pu()), v.voltage_pu());
            }
        }
    }
}
