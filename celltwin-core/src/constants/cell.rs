//! Electrical Cell Constants
//!
//! Cell-level characteristics used by the OCV curve and the SOC filter.
//! Literature values are for an NMC/graphite 21700 cell and serve as the
//! degraded-mode fallback when the external physics source is unavailable.

// ===== CELL RATINGS =====

/// Default nominal cell capacity in ampere-hours.
///
/// Typical 18650/21700 consumer cell rating. Always overridden by the
/// deployment config for the actual cell.
///
/// Source: manufacturer datasheets (2.0-5.0 Ah typical range)
pub const DEFAULT_CELL_CAPACITY_AH: f32 = 2.0;

/// Coulombic efficiency for Li-ion chemistry.
///
/// Fraction of charge recovered per charge/discharge round trip. Li-ion
/// cells are highly efficient; 0.98 is the conservative end of the
/// published range.
///
/// Source: Plett, "Battery Management Systems" Vol. 1
pub const COULOMBIC_EFFICIENCY: f32 = 0.98;

// ===== FALLBACK ECM PARAMETERS =====

/// Fresh-cell ohmic resistance in ohms.
///
/// Instantaneous voltage step per amp of load. Used until the physics
/// source publishes extracted values, and as the fresh-cell baseline for
/// resistance-growth tracking.
///
/// Source: NMC 21700 pulse-test literature values
pub const FALLBACK_R0_OHM: f32 = 0.062;

/// RC-branch polarization resistance in ohms.
///
/// Source: NMC 21700 pulse-test literature values
pub const FALLBACK_R1_OHM: f32 = 0.035;

/// RC-branch capacitance in farads.
///
/// Chosen so tau1 = R1*C1 is near the ~90 s polarization time constant
/// observed in pulse relaxation.
///
/// Source: NMC 21700 pulse-test literature values
pub const FALLBACK_C1_F: f32 = 2500.0;

/// Floor for the RC time constant in seconds.
///
/// Degenerate extracted parameters (R1*C1 -> 0) would make the branch
/// prediction singular; one second keeps the exponential well-conditioned
/// at sensor cadence.
pub const TAU1_FLOOR_S: f32 = 1.0;

// ===== OCV CURVE =====

/// OCV temperature coefficient in volts per degree Celsius.
///
/// NMC/graphite open-circuit voltage drops roughly 0.8 mV per degree of
/// warming around room temperature.
///
/// Source: NMC entropy-coefficient measurements
pub const OCV_TEMP_COEFF_V_PER_C: f32 = -0.0008;

/// Reference temperature for the OCV table in degrees Celsius.
pub const OCV_REFERENCE_TEMP_C: f32 = 25.0;

/// Step used for the finite-difference OCV slope.
///
/// Small enough to resolve the steep table knees, large enough to stay
/// above f32 rounding on adjacent table lookups.
pub const OCV_SLOPE_DELTA: f32 = 1e-4;

/// Literature OCV-SOC curve, SOC axis (strictly increasing, 21 points).
///
/// NMC/graphite quasi-static discharge curve. Used as the degraded-mode
/// table when the physics source fails and as the reference curve in
/// tests.
///
/// Source: published NMC/graphite half-cell data
pub const LITERATURE_OCV_SOC: [f32; 21] = [
    0.0, 0.05, 0.10, 0.15, 0.20, 0.25, 0.30, 0.35, 0.40, 0.45, 0.50,
    0.55, 0.60, 0.65, 0.70, 0.75, 0.80, 0.85, 0.90, 0.95, 1.0,
];

/// Literature OCV-SOC curve, voltage axis (non-decreasing, 21 points).
pub const LITERATURE_OCV_V: [f32; 21] = [
    3.000, 3.270, 3.490, 3.550, 3.590, 3.620, 3.660, 3.690, 3.720, 3.740,
    3.760, 3.780, 3.800, 3.830, 3.860, 3.890, 3.930, 3.970, 4.020, 4.100,
    4.200,
];

// ===== FILTER NOISE DEFAULTS =====

/// Default initial SOC guess before the first voltage bootstrap.
pub const INITIAL_SOC_GUESS: f32 = 0.9;

/// Initial state covariance diagonal (SOC, V_RC) before bootstrap.
pub const INITIAL_COVARIANCE: [f32; 2] = [0.01, 0.001];

/// Reduced state covariance diagonal after a voltage bootstrap.
///
/// Inverting the OCV curve at rest pins SOC far better than the blind
/// initial guess, so the filter starts more certain.
pub const BOOTSTRAP_COVARIANCE: [f32; 2] = [0.005, 0.001];

/// Process noise covariance diagonal (SOC, V_RC) per step.
///
/// Source: hand-tuned against bench discharge traces at 2 s cadence
pub const PROCESS_NOISE: [f32; 2] = [1e-5, 1e-6];

/// Terminal-voltage measurement noise standard deviation in volts.
///
/// Covers a typical 12-bit ADC front end plus sense-line pickup. Must stay
/// strictly positive: the Kalman gain divides by the innovation variance.
///
/// Source: ADC datasheet noise floor, with margin
pub const MEASUREMENT_NOISE_STD_V: f32 = 0.005;

/// SOC sigma reported by the open-loop fallback path.
///
/// OCV inversion under load is biased by the unseen IR drop; five SOC
/// percentage points reflects that honestly.
pub const OPEN_LOOP_SIGMA_SOC: f32 = 0.05;
