//! Constants for the CellTwin Estimation Core
//!
//! Centralized, documented constants used throughout the estimator. All
//! numeric values live here with their purpose, source, and rationale.
//!
//! ## Organization
//!
//! - **Cell**: electrical cell characteristics, literature OCV table,
//!   fallback ECM parameters, filter noise defaults
//! - **Degradation**: capacity-fade and resistance-growth model parameters,
//!   end-of-life thresholds, RUL bounds
//! - **Orchestrator**: step cadence, buffer sizes, cross-check throttling
//!
//! ## Usage Guidelines
//!
//! 1. Always use these constants instead of magic numbers
//! 2. When adding new constants, document source and units
//! 3. Empirical placeholders (fade rate, SOH blend weights) are exposed as
//!    config defaults - treat them as tunable, not as physical truth

/// Electrical cell characteristics, literature tables, filter defaults.
pub mod cell;

/// Capacity-fade and resistance-growth model parameters.
pub mod degradation;

/// Orchestration cadence, buffer sizing, and throttling intervals.
pub mod orchestrator;

// Re-export commonly used constants for convenience
pub use cell::{
    DEFAULT_CELL_CAPACITY_AH, COULOMBIC_EFFICIENCY,
    FALLBACK_R0_OHM, FALLBACK_R1_OHM, FALLBACK_C1_F,
    OCV_TEMP_COEFF_V_PER_C, OCV_REFERENCE_TEMP_C, TAU1_FLOOR_S,
};

pub use degradation::{
    CAPACITY_FADE_PER_CYCLE_PCT, SOH_EOL_PCT, SOH_FLOOR_MARGIN_PCT,
    R0_EMA_ALPHA, R0_EOL_FACTOR, MAX_RUL_DAYS,
};

pub use orchestrator::{
    DEFAULT_STEP_INTERVAL_S, CHECK_INTERVAL_S, CURRENT_BUFFER_LEN,
    MIN_CHECK_SAMPLES,
};

/// Seconds per hour, for Ah <-> As conversions.
pub const SECONDS_PER_HOUR: f32 = 3600.0;

/// Seconds per day, for RUL day estimates.
pub const SECONDS_PER_DAY: f32 = 86_400.0;
