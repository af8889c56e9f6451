//! Degradation Model Constants
//!
//! Parameters of the capacity-fade and resistance-growth models behind the
//! SOH/RUL estimator. These are empirical placeholders from published cell
//! aging studies, not physical constants - the corresponding `HealthConfig`
//! fields exist so deployments can calibrate them per cell family.

// ===== CAPACITY FADE =====

/// Capacity-based SOH loss per equivalent full cycle, in percent.
///
/// Linear approximation of NMC 18650 aging, valid over the 100-80% SOH
/// window where the linear regime holds.
///
/// Source: published NMC cycle-aging data
pub const CAPACITY_FADE_PER_CYCLE_PCT: f32 = 0.04;

/// SOC delta below which a sample is treated as jitter, not movement.
///
/// Cycle counting flips direction only when |dSOC| exceeds this, so
/// measurement noise cannot trigger spurious half-cycle reversals.
pub const SOC_CYCLE_HYSTERESIS: f32 = 0.001;

// ===== RESISTANCE GROWTH =====

/// EMA smoothing factor for measured internal resistance.
///
/// 0.05 gives a ~20-sample effective window: slow enough to reject step
/// noise, fast enough to follow genuine growth over weeks.
pub const R0_EMA_ALPHA: f32 = 0.05;

/// Resistance readings at or below this are implausible and ignored, ohms.
///
/// A healthy pack lead alone exceeds 10 mOhm; smaller values indicate a
/// sense fault, not a healthier cell.
pub const R0_PLAUSIBLE_FLOOR_OHM: f32 = 0.01;

/// End-of-life resistance as a multiple of fresh-cell resistance.
///
/// Source: industry rule of thumb (2x new = end of life)
pub const R0_EOL_FACTOR: f32 = 2.0;

/// Percent of SOH mapped onto the full fresh-to-EOL resistance climb.
pub const RESISTANCE_SOH_SCALE_PCT: f32 = 20.0;

// ===== COMBINED SOH =====

/// Weight of capacity-based SOH in the combined estimate.
///
/// Capacity fade dominates usable runtime, so it carries most of the
/// blend. Empirical placeholder - configurable via `HealthConfig`.
pub const CAPACITY_WEIGHT: f32 = 0.70;

/// Weight of resistance-based SOH in the combined estimate.
pub const RESISTANCE_WEIGHT: f32 = 0.30;

/// End-of-life SOH threshold in percent.
///
/// Source: common automotive/consumer EOL definition (80% of rated)
pub const SOH_EOL_PCT: f32 = 80.0;

/// How far below EOL the reported SOH may fall, percent.
///
/// Values under `SOH_EOL_PCT - SOH_FLOOR_MARGIN_PCT` carry no additional
/// information and destabilize the RUL division, so SOH clamps there.
pub const SOH_FLOOR_MARGIN_PCT: f32 = 5.0;

// ===== RUL =====

/// Upper bound on reported remaining-useful-life in days.
///
/// With near-zero throughput the cycles-per-day divisor collapses and the
/// extrapolation becomes meaningless; ten years is the reporting horizon.
pub const MAX_RUL_DAYS: f32 = 3650.0;

/// Floor on the observed cycles-per-day rate used for RUL days.
pub const MIN_CYCLES_PER_DAY: f32 = 0.01;

/// Floor on the per-cycle fade rate used in the RUL division.
pub const MIN_FADE_PER_CYCLE_PCT: f32 = 0.001;

/// Cap on the time step fed into throughput accounting, seconds.
///
/// A stalled ingestion layer resuming after minutes would otherwise count
/// the gap as charge moved at the last-seen current.
pub const MAX_HEALTH_DT_S: f32 = 10.0;

// ===== TREND CLASSIFICATION =====

/// Samples in each of the old/new comparison windows.
pub const TREND_WINDOW: usize = 10;

/// Minimum history length before a trend is reported at all.
pub const TREND_MIN_HISTORY: usize = 20;

/// SOH drop between window means that counts as degrading, percent.
pub const TREND_THRESHOLD_PCT: f32 = 0.1;

/// Capacity of the SOH and resistance history buffers.
pub const HEALTH_HISTORY_LEN: usize = 200;
