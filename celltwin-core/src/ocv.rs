//! OCV-SOC Curve Table
//!
//! ## Physics Background
//!
//! The open-circuit voltage (OCV) of a lithium-ion cell is a monotone
//! function of its state of charge: an emptier cell rests at a lower
//! terminal voltage. The curve is flat through the mid range and steep at
//! both knees, so it is supplied as a sampled table from the external
//! physics model rather than a closed form.
//!
//! The estimation core uses the curve three ways:
//! - `ocv_at`: forward lookup inside the filter's observation model
//! - `soc_at`: inversion, to bootstrap SOC from a resting voltage and as
//!   the open-loop fallback before the filter exists
//! - `slope_at`: finite-difference dOCV/dSOC, the SOC entry of the
//!   observation Jacobian
//!
//! ## Temperature Correction
//!
//! OCV shifts slightly with cell temperature (entropy effect). The table is
//! referenced at 25 C and corrected linearly by
//! [`OCV_TEMP_COEFF_V_PER_C`](crate::constants::cell::OCV_TEMP_COEFF_V_PER_C);
//! the inversion applies the opposite shift before searching the table.
//!
//! ## Table Design
//!
//! Points are stored in bounded `heapless` vectors (no heap, fixed worst
//! case memory) and validated once at construction: monotone SOC axis,
//! non-decreasing voltage axis, finite entries. Lookups clamp out-of-range
//! inputs instead of erroring - a sensor glitch must degrade an estimate,
//! never abort a step.
//!
//! A built-in literature curve ([`OcvCurve::literature`]) backs degraded
//! mode when the physics source is unavailable.

use heapless::Vec;

use crate::{
    constants::cell::{
        LITERATURE_OCV_SOC, LITERATURE_OCV_V, OCV_REFERENCE_TEMP_C,
        OCV_SLOPE_DELTA, OCV_TEMP_COEFF_V_PER_C,
    },
    errors::{TwinError, TwinResult},
};

/// Maximum number of table points
///
/// Physics sources publish 101-point tables; 128 leaves headroom while
/// keeping the curve ~1 KB.
pub const MAX_OCV_POINTS: usize = 128;

/// Sampled, monotone OCV-SOC curve with temperature correction
#[derive(Debug, Clone, PartialEq)]
pub struct OcvCurve {
    /// SOC axis, strictly increasing
    soc: Vec<f32, MAX_OCV_POINTS>,
    /// Voltage axis, non-decreasing, same length
    ocv: Vec<f32, MAX_OCV_POINTS>,
}

impl OcvCurve {
    /// Build a curve from paired samples, validating shape and monotonicity
    pub fn from_points(soc: &[f32], ocv: &[f32]) -> TwinResult<Self> {
        if soc.len() != ocv.len() {
            return Err(TwinError::InvalidTable { reason: "axis lengths differ" });
        }
        if soc.len() < 2 {
            return Err(TwinError::InvalidTable { reason: "need at least two points" });
        }
        if soc.len() > MAX_OCV_POINTS {
            return Err(TwinError::InvalidTable { reason: "too many points" });
        }
        for (&s, &v) in soc.iter().zip(ocv.iter()) {
            if !s.is_finite() || !v.is_finite() {
                return Err(TwinError::InvalidTable { reason: "non-finite entry" });
            }
        }
        for pair in soc.windows(2) {
            if pair[1] <= pair[0] {
                return Err(TwinError::InvalidTable { reason: "soc axis not increasing" });
            }
        }
        for pair in ocv.windows(2) {
            if pair[1] < pair[0] {
                return Err(TwinError::InvalidTable { reason: "ocv axis decreasing" });
            }
        }

        let mut soc_vec = Vec::new();
        let mut ocv_vec = Vec::new();
        // Capacity checked above; extend cannot fail
        let _ = soc_vec.extend_from_slice(soc);
        let _ = ocv_vec.extend_from_slice(ocv);

        Ok(Self { soc: soc_vec, ocv: ocv_vec })
    }

    /// Built-in literature curve for degraded mode and tests
    pub fn literature() -> Self {
        let mut soc_vec = Vec::new();
        let mut ocv_vec = Vec::new();
        // Compiled-in table fits MAX_OCV_POINTS; extend cannot fail
        let _ = soc_vec.extend_from_slice(&LITERATURE_OCV_SOC);
        let _ = ocv_vec.extend_from_slice(&LITERATURE_OCV_V);
        Self { soc: soc_vec, ocv: ocv_vec }
    }

    /// Number of table points
    pub fn len(&self) -> usize {
        self.soc.len()
    }

    /// True when the table holds no points (never, post-construction)
    pub fn is_empty(&self) -> bool {
        self.soc.is_empty()
    }

    /// Open-circuit voltage at the given SOC and temperature
    ///
    /// SOC is clamped to the table range; temperature correction is linear
    /// about the 25 C reference.
    pub fn ocv_at(&self, soc: f32, temp_c: f32) -> f32 {
        let soc = soc.clamp(0.0, 1.0);
        let v25 = interp(&self.soc, &self.ocv, soc);
        v25 + OCV_TEMP_COEFF_V_PER_C * (temp_c - OCV_REFERENCE_TEMP_C)
    }

    /// SOC whose open-circuit voltage matches the given terminal voltage
    ///
    /// Inverse of [`ocv_at`](Self::ocv_at): undoes the temperature shift,
    /// then searches the voltage axis. Result clamped to [0, 1]. Only valid
    /// near rest - under load the IR drop biases the answer low.
    pub fn soc_at(&self, ocv: f32, temp_c: f32) -> f32 {
        let v25 = ocv - OCV_TEMP_COEFF_V_PER_C * (temp_c - OCV_REFERENCE_TEMP_C);
        interp(&self.ocv, &self.soc, v25).clamp(0.0, 1.0)
    }

    /// Finite-difference dOCV/dSOC for the observation Jacobian
    pub fn slope_at(&self, soc: f32, temp_c: f32) -> f32 {
        let hi = self.ocv_at((soc + OCV_SLOPE_DELTA).min(1.0), temp_c);
        let lo = self.ocv_at((soc - OCV_SLOPE_DELTA).max(0.0), temp_c);
        (hi - lo) / (2.0 * OCV_SLOPE_DELTA)
    }
}

/// Piecewise-linear interpolation over a non-decreasing axis
///
/// Out-of-range inputs clamp to the end values. Flat segments (possible on
/// the voltage axis) resolve to the segment start, which keeps the
/// inversion well-defined across OCV plateaus.
fn interp(xs: &[f32], ys: &[f32], x: f32) -> f32 {
    let n = xs.len();
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[n - 1] {
        return ys[n - 1];
    }

    // First index with xs[idx] >= x; x is interior so 1 <= idx <= n-1
    let idx = xs.partition_point(|&p| p < x);
    let (x0, x1) = (xs[idx - 1], xs[idx]);
    let (y0, y1) = (ys[idx - 1], ys[idx]);

    let span = x1 - x0;
    if span <= 0.0 {
        return y0;
    }
    y0 + (y1 - y0) * (x - x0) / span
}
