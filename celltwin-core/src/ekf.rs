//! Extended Kalman Filter for SOC Estimation
//!
//! ## Overview
//!
//! Two-state EKF over an equivalent-circuit cell model, fusing the coulomb
//! count with the terminal-voltage measurement each step. Coulomb counting
//! alone drifts with current-sense bias; voltage alone is useless under
//! load. The filter weighs both by their uncertainties and produces a SOC
//! estimate with an explicit 1-sigma error bar.
//!
//! ## State and Models
//!
//! ```text
//! State vector:  x = [SOC, V_RC]
//!     SOC   - state of charge, fraction [0, 1]
//!     V_RC  - RC polarization voltage (one-pair Thevenin model), volts
//!
//! Process model (discrete, timestep dt):
//!     SOC'  = SOC - eta * I * dt / Q_total
//!     V_RC' = exp(-dt/tau1) * V_RC + R1 * (1 - exp(-dt/tau1)) * I
//!
//! Observation model:
//!     V_hat = OCV(SOC) + I * R0 + V_RC
//! ```
//!
//! OCV(SOC) and the circuit parameters come from the [`CellModel`]; the
//! parameters are re-read every step so a background refresh takes effect
//! immediately.
//!
//! ## Filter Steps
//!
//! ```text
//! Prediction:   x' = f(x, I)              (nonlinear, SOC clamped)
//!               P' = F.P.Ft + Q           F = [[1, 0], [0, alpha]]
//! Update:       y  = z - h(x')            innovation
//!               S  = H.P'.Ht + R          scalar (one measurement)
//!               K  = P'.Ht / S
//!               x  = x' + K.y             SOC hard-clamped after
//!               P  = (I - K.H).P'         symmetrized
//! ```
//!
//! ## Numerical Stability
//!
//! - Covariance symmetrized after both propagation and update
//! - `tau1` floored so a degenerate RC pair cannot blow up the exponential
//! - The `S` division is safe because the measurement noise variance is
//!   validated strictly positive at configuration time
//! - SOC clamped to [0, 1] after prediction and after correction; the
//!   clamp is not fed back into the gain
//!
//! Invalid inputs (negative `dt`) are a caller contract violation: the
//! result is numerically undefined, never a panic or an error branch.

use libm::{expf, sqrtf};

use crate::{
    constants::cell::{
        BOOTSTRAP_COVARIANCE, COULOMBIC_EFFICIENCY, DEFAULT_CELL_CAPACITY_AH,
        INITIAL_COVARIANCE, INITIAL_SOC_GUESS, MEASUREMENT_NOISE_STD_V,
        PROCESS_NOISE, TAU1_FLOOR_S,
    },
    constants::SECONDS_PER_HOUR,
    errors::{TwinError, TwinResult},
    model::{CellModel, EcmParams},
};

use self::matrix::{add, make_symmetric, multiply, transpose, SquareMatrix, Vector};

/// SOC filter configuration
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Nominal cell capacity, ampere-hours
    pub capacity_ah: f32,
    /// Coulombic efficiency, fraction of charge recovered per round trip
    pub eta: f32,
    /// SOC guess used before the first voltage bootstrap
    pub initial_soc: f32,
    /// Initial covariance diagonal (SOC, V_RC)
    pub initial_covariance: [f32; 2],
    /// Covariance diagonal after a voltage bootstrap
    pub bootstrap_covariance: [f32; 2],
    /// Process noise covariance diagonal (SOC, V_RC)
    pub process_noise: [f32; 2],
    /// Terminal-voltage measurement noise standard deviation, volts
    pub measurement_noise_std: f32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            capacity_ah: DEFAULT_CELL_CAPACITY_AH,
            eta: COULOMBIC_EFFICIENCY,
            initial_soc: INITIAL_SOC_GUESS,
            initial_covariance: INITIAL_COVARIANCE,
            bootstrap_covariance: BOOTSTRAP_COVARIANCE,
            process_noise: PROCESS_NOISE,
            measurement_noise_std: MEASUREMENT_NOISE_STD_V,
        }
    }
}

impl FilterConfig {
    /// Set the nominal capacity
    pub fn with_capacity_ah(mut self, capacity_ah: f32) -> Self {
        self.capacity_ah = capacity_ah;
        self
    }

    /// Set the coulombic efficiency
    pub fn with_eta(mut self, eta: f32) -> Self {
        self.eta = eta;
        self
    }

    /// Set process noise (higher = less trust in the circuit model)
    pub fn with_process_noise(mut self, noise: [f32; 2]) -> Self {
        self.process_noise = noise;
        self
    }

    /// Set measurement noise standard deviation in volts
    pub fn with_measurement_noise_std(mut self, std_v: f32) -> Self {
        self.measurement_noise_std = std_v;
        self
    }

    /// Check the configuration invariants the filter math relies on
    pub fn validate(&self) -> TwinResult<()> {
        if !(self.capacity_ah > 0.0) {
            return Err(TwinError::InvalidConfig { reason: "capacity must be positive" });
        }
        if !(self.eta > 0.0 && self.eta <= 1.0) {
            return Err(TwinError::InvalidConfig { reason: "eta must be in (0, 1]" });
        }
        if !(self.measurement_noise_std > 0.0) {
            return Err(TwinError::InvalidConfig {
                reason: "measurement noise must be strictly positive",
            });
        }
        if self.process_noise.iter().any(|&q| !(q >= 0.0)) {
            return Err(TwinError::InvalidConfig { reason: "process noise must be non-negative" });
        }
        Ok(())
    }
}

/// Per-step filter output
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SocUpdate {
    /// Corrected state of charge, fraction
    pub soc: f32,
    /// Corrected RC polarization voltage, volts
    pub v_rc: f32,
    /// Terminal voltage predicted before correction, volts
    pub v_predicted: f32,
    /// Measurement minus prediction, volts
    pub innovation: f32,
    /// 1-sigma SOC uncertainty, fraction
    pub sigma_soc: f32,
    /// Open-circuit voltage at the predicted SOC, volts
    pub ocv: f32,
    /// Ohmic resistance used this step, ohms
    pub r0: f32,
    /// Polarization resistance used this step, ohms
    pub r1: f32,
}

/// Two-state SOC filter over a one-pair equivalent circuit
pub struct SocFilter {
    config: FilterConfig,
    /// Capacity in ampere-seconds, precomputed from the config
    capacity_as: f32,
    /// State [SOC, V_RC]
    x: Vector<2>,
    /// State covariance
    p: SquareMatrix<2>,
    /// Process noise (diagonal, from config)
    q: SquareMatrix<2>,
    /// Measurement noise variance
    r_meas: f32,
    /// Circuit parameters, refreshed from the model each step
    r0: f32,
    r1: f32,
    c1: f32,
    tau1: f32,
    /// Whether the voltage bootstrap has run
    initialized: bool,
}

impl SocFilter {
    /// Create a filter with the given configuration and starting parameters
    ///
    /// The configuration should be validated beforehand
    /// ([`FilterConfig::validate`]); the filter itself trusts it.
    pub fn new(config: FilterConfig, ecm: EcmParams) -> Self {
        let capacity_as = config.capacity_ah * SECONDS_PER_HOUR;
        let q = [
            [config.process_noise[0], 0.0],
            [0.0, config.process_noise[1]],
        ];
        let r_meas = config.measurement_noise_std * config.measurement_noise_std;
        let x = [config.initial_soc, 0.0];
        let p = [
            [config.initial_covariance[0], 0.0],
            [0.0, config.initial_covariance[1]],
        ];
        let tau1 = (ecm.r1 * ecm.c1).max(TAU1_FLOOR_S);

        Self {
            config,
            capacity_as,
            x,
            p,
            q,
            r_meas,
            r0: ecm.r0,
            r1: ecm.r1,
            c1: ecm.c1,
            tau1,
            initialized: false,
        }
    }

    /// Bootstrap SOC from a resting terminal voltage
    ///
    /// Inverts the OCV curve at the measured voltage, which is only
    /// accurate near rest (|I| small). Runs automatically on the first
    /// [`update`](Self::update); exposed for callers that know a better
    /// moment. Returns the bootstrapped SOC.
    pub fn initialize_from_voltage(
        &mut self,
        model: &dyn CellModel,
        v_terminal: f32,
        temp_c: f32,
    ) -> f32 {
        let soc = model.soc_from_ocv(v_terminal, temp_c);
        self.x = [soc, 0.0];
        self.p = [
            [self.config.bootstrap_covariance[0], 0.0],
            [0.0, self.config.bootstrap_covariance[1]],
        ];
        self.initialized = true;
        soc
    }

    /// Run one predict+update step
    ///
    /// `current_a` is signed, positive = discharge. `dt_s` must be
    /// positive; violating that is a caller contract breach with undefined
    /// numeric results.
    pub fn update(
        &mut self,
        model: &dyn CellModel,
        v_measured: f32,
        current_a: f32,
        dt_s: f32,
        temp_c: f32,
    ) -> SocUpdate {
        if !self.initialized {
            self.initialize_from_voltage(model, v_measured, temp_c);
        }

        // Circuit parameters may have been refreshed in the background
        let ecm = model.ecm_params();
        self.r0 = ecm.r0;
        self.r1 = ecm.r1;
        self.c1 = ecm.c1;
        self.tau1 = (self.r1 * self.c1).max(TAU1_FLOOR_S);

        // ---- Predict ----
        let alpha = expf(-dt_s / self.tau1);

        let soc_pred = (self.x[0] - self.config.eta * current_a * dt_s / self.capacity_as)
            .clamp(0.0, 1.0);
        let v_rc_pred = alpha * self.x[1] + self.r1 * (1.0 - alpha) * current_a;

        let f: SquareMatrix<2> = [[1.0, 0.0], [0.0, alpha]];

        // P' = F.P.Ft + Q
        let mut fp = [[0.0; 2]; 2];
        multiply(&f, &self.p, &mut fp);
        let mut ft = [[0.0; 2]; 2];
        transpose(&f, &mut ft);
        let mut fpft = [[0.0; 2]; 2];
        multiply(&fp, &ft, &mut fpft);
        let mut p_pred = [[0.0; 2]; 2];
        add(&fpft, &self.q, &mut p_pred);
        make_symmetric(&mut p_pred);

        // ---- Update ----
        let ocv = model.ocv_from_soc(soc_pred, temp_c);
        let v_hat = ocv + current_a * self.r0 + v_rc_pred;
        let innovation = v_measured - v_hat;

        // Observation Jacobian H = [dOCV/dSOC, 1]
        let h0 = model.d_ocv_d_soc(soc_pred, temp_c);

        // S = H.P'.Ht + R, scalar for the single voltage measurement;
        // r_meas > 0 keeps the division defined
        let s = h0 * (h0 * p_pred[0][0] + p_pred[0][1])
            + (h0 * p_pred[1][0] + p_pred[1][1])
            + self.r_meas;

        // K = P'.Ht / S
        let k = [
            (p_pred[0][0] * h0 + p_pred[0][1]) / s,
            (p_pred[1][0] * h0 + p_pred[1][1]) / s,
        ];

        self.x[0] = (soc_pred + k[0] * innovation).clamp(0.0, 1.0);
        self.x[1] = v_rc_pred + k[1] * innovation;

        // P = (I - K.H).P'
        let i_kh: SquareMatrix<2> = [
            [1.0 - k[0] * h0, -k[0]],
            [-k[1] * h0, 1.0 - k[1]],
        ];
        let mut p_new = [[0.0; 2]; 2];
        multiply(&i_kh, &p_pred, &mut p_new);
        make_symmetric(&mut p_new);
        self.p = p_new;

        let sigma_soc = sqrtf(self.p[0][0].max(0.0));

        SocUpdate {
            soc: self.x[0],
            v_rc: self.x[1],
            v_predicted: v_hat,
            innovation,
            sigma_soc,
            ocv,
            r0: self.r0,
            r1: self.r1,
        }
    }

    /// Current SOC estimate, fraction
    pub fn soc(&self) -> f32 {
        self.x[0]
    }

    /// Current RC polarization voltage estimate, volts
    pub fn v_rc(&self) -> f32 {
        self.x[1]
    }

    /// State covariance snapshot
    pub fn covariance(&self) -> SquareMatrix<2> {
        self.p
    }

    /// SOC uncertainty as +/- percentage points (1-sigma)
    pub fn uncertainty_pct(&self) -> f32 {
        sqrtf(self.p[0][0].max(0.0)) * 100.0
    }

    /// Whether the voltage bootstrap has run
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

/// Matrix operations for covariance propagation
///
/// Fixed-size linear algebra over stack arrays - no heap, deterministic
/// cost. Only what the two-state filter exercises.
pub mod matrix {
    /// Matrix type using const generics
    pub type Matrix<const R: usize, const C: usize> = [[f32; C]; R];

    /// Square matrix type
    pub type SquareMatrix<const N: usize> = Matrix<N, N>;

    /// Vector type
    pub type Vector<const N: usize> = [f32; N];

    /// Matrix multiplication: C = A x B
    pub fn multiply<const R: usize, const K: usize, const C: usize>(
        a: &Matrix<R, K>,
        b: &Matrix<K, C>,
        result: &mut Matrix<R, C>,
    ) {
        for i in 0..R {
            for j in 0..C {
                result[i][j] = 0.0;
                for k in 0..K {
                    result[i][j] += a[i][k] * b[k][j];
                }
            }
        }
    }

    /// Matrix transpose: B = At
    pub fn transpose<const R: usize, const C: usize>(
        a: &Matrix<R, C>,
        result: &mut Matrix<C, R>,
    ) {
        for i in 0..R {
            for j in 0..C {
                result[j][i] = a[i][j];
            }
        }
    }

    /// Matrix addition: C = A + B
    pub fn add<const R: usize, const C: usize>(
        a: &Matrix<R, C>,
        b: &Matrix<R, C>,
        result: &mut Matrix<R, C>,
    ) {
        for i in 0..R {
            for j in 0..C {
                result[i][j] = a[i][j] + b[i][j];
            }
        }
    }

    /// Make matrix symmetric: A = (A + At) / 2
    ///
    /// Keeps covariance matrices symmetric against f32 rounding drift.
    pub fn make_symmetric<const N: usize>(matrix: &mut SquareMatrix<N>) {
        for i in 0..N {
            for j in i + 1..N {
                let avg = (matrix[i][j] + matrix[j][i]) * 0.5;
                matrix[i][j] = avg;
                matrix[j][i] = avg;
            }
        }
    }

}
