//! Common test utilities for the integration suite
//!
//! Provides a deterministic PRNG for repeatable noise injection and a
//! synthetic physics source that behaves like the real one (table
//! generation, coulomb-integrating cross-checks) without the solver.

#![allow(dead_code)]

use celltwin_core::{
    model::{EcmParams, ModelSource, SourceData},
    ocv::OcvCurve,
    TwinResult,
};

/// Deterministic xorshift PRNG for repeatable tests
pub struct TestRng {
    state: u32,
}

impl TestRng {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    pub fn next_u32(&mut self) -> u32 {
        // Xorshift algorithm
        self.state ^= self.state << 13;
        self.state ^= self.state >> 17;
        self.state ^= self.state << 5;
        self.state
    }

    pub fn next_f32(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 / 16_777_216.0
    }

    pub fn gen_range(&mut self, min: f32, max: f32) -> f32 {
        min + self.next_f32() * (max - min)
    }

    /// Approximately gaussian sample via the central limit of 12 uniforms
    pub fn gen_gaussian(&mut self, std_dev: f32) -> f32 {
        let mut sum = 0.0;
        for _ in 0..12 {
            sum += self.next_f32();
        }
        (sum - 6.0) * std_dev
    }
}

/// Synthetic physics source: literature curve, bench ECM values, and a
/// coulomb-integrating cross-check
pub struct SyntheticSource {
    pub ecm: EcmParams,
    pub load_delay_ms: u64,
}

impl SyntheticSource {
    pub fn new() -> Self {
        Self {
            ecm: EcmParams { r0: 0.05, r1: 0.03, c1: 2000.0 },
            load_delay_ms: 0,
        }
    }

    pub fn with_load_delay_ms(mut self, delay_ms: u64) -> Self {
        self.load_delay_ms = delay_ms;
        self
    }
}

impl ModelSource for SyntheticSource {
    fn load(&self, _capacity_ah: f32) -> TwinResult<SourceData> {
        if self.load_delay_ms > 0 {
            std::thread::sleep(std::time::Duration::from_millis(self.load_delay_ms));
        }
        Ok(SourceData {
            curve: OcvCurve::literature(),
            ecm: self.ecm,
        })
    }

    fn run_check(&self, profile_ma: &[f32], dt_s: f32, soc_hint: f32)
        -> TwinResult<(f32, f32)>
    {
        // Coulomb-integrate the profile from the hint, then read the curve
        let capacity_as = 2.0 * 3600.0;
        let mut soc = soc_hint;
        let mut mean_a = 0.0;
        for &ma in profile_ma {
            let amps = ma / 1000.0;
            soc = (soc - amps * dt_s / capacity_as).clamp(0.0, 1.0);
            mean_a += amps;
        }
        mean_a /= profile_ma.len().max(1) as f32;

        let curve = OcvCurve::literature();
        let voltage = curve.ocv_at(soc, 25.0) + mean_a * self.ecm.r0;
        Ok((voltage, soc))
    }
}
