//! Property tests for the estimation core
//!
//! Checks the invariants that must hold for arbitrary inputs, not just
//! scripted scenarios: OCV round-tripping, SOC clamping, and monotone
//! cycle accounting.

#![cfg(test)]

use proptest::prelude::*;

use celltwin_core::{
    model::{CellModel, EcmParams, ModelLifecycle, ModelStatus},
    ocv::OcvCurve,
    FilterConfig, HealthConfig, HealthEstimator, SocFilter,
};

/// Static model over the literature curve for filter properties
struct StaticModel {
    curve: OcvCurve,
    ecm: EcmParams,
}

impl StaticModel {
    fn new() -> Self {
        Self {
            curve: OcvCurve::literature(),
            ecm: EcmParams { r0: 0.05, r1: 0.03, c1: 2000.0 },
        }
    }
}

impl CellModel for StaticModel {
    fn ocv_from_soc(&self, soc: f32, temp_c: f32) -> f32 {
        self.curve.ocv_at(soc, temp_c)
    }
    fn soc_from_ocv(&self, ocv: f32, temp_c: f32) -> f32 {
        self.curve.soc_at(ocv, temp_c)
    }
    fn d_ocv_d_soc(&self, soc: f32, temp_c: f32) -> f32 {
        self.curve.slope_at(soc, temp_c)
    }
    fn ecm_params(&self) -> EcmParams {
        self.ecm
    }
    fn is_ready(&self) -> bool {
        true
    }
    fn status(&self) -> ModelStatus {
        ModelStatus {
            lifecycle: ModelLifecycle::Ready,
            fault: None,
            ocv_points: self.curve.len(),
            capacity_ah: 2.0,
            ecm: self.ecm,
            check_voltage: 0.0,
            check_soc: 0.5,
            check_age_s: None,
        }
    }
    fn request_check(&self, _profile_ma: &[f32], _dt_s: f32) {}
}

proptest! {
    /// soc_from_ocv inverts ocv_from_soc within 1e-3 across SOC and
    /// temperature
    #[test]
    fn ocv_round_trips(soc in 0.0f32..=1.0, temp_c in -10.0f32..=50.0) {
        let curve = OcvCurve::literature();
        let back = curve.soc_at(curve.ocv_at(soc, temp_c), temp_c);
        prop_assert!((back - soc).abs() < 1e-3, "soc {soc} -> {back}");
    }

    /// The filter's SOC stays in [0, 1] for arbitrary voltage/current
    /// sequences, including adversarial ones
    #[test]
    fn filter_soc_stays_bounded(
        readings in prop::collection::vec((2.5f32..=4.5, -60.0f32..=60.0), 1..120),
    ) {
        let model = StaticModel::new();
        let mut filter = SocFilter::new(FilterConfig::default(), model.ecm_params());

        for (voltage, current) in readings {
            let result = filter.update(&model, voltage, current, 2.0, 25.0);
            prop_assert!((0.0..=1.0).contains(&result.soc));
            prop_assert!(result.sigma_soc.is_finite());
        }
    }

    /// full_cycles and ah_throughput never decrease, for any SOC
    /// trajectory and current sign pattern
    #[test]
    fn cycle_accounting_is_monotone(
        steps in prop::collection::vec((0.0f32..=1.0, -10.0f32..=10.0), 1..150),
    ) {
        let mut est = HealthEstimator::new(HealthConfig::default());
        let mut last_cycles = 0.0f32;
        let mut last_ah = 0.0f32;

        for (soc, current) in steps {
            let result = est.update(soc, current, 0.062, 2.0);
            prop_assert!(result.full_cycles >= last_cycles);
            prop_assert!(result.ah_throughput >= last_ah);
            last_cycles = result.full_cycles;
            last_ah = result.ah_throughput;
        }
    }

    /// SOH floors at soh_eol - 5 no matter how hard the cell is cycled
    #[test]
    fn soh_respects_floor(
        steps in prop::collection::vec((0.0f32..=1.0, -50.0f32..=50.0), 1..150),
    ) {
        let config = HealthConfig::default().with_fade_per_cycle_pct(20.0);
        let mut est = HealthEstimator::new(config);

        for (soc, current) in steps {
            let result = est.update(soc, current, 0.062, 10.0);
            prop_assert!(result.soh >= 75.0);
            prop_assert!(result.soh_capacity >= 75.0);
            prop_assert!(result.soh_resistance >= 75.0);
        }
    }
}
