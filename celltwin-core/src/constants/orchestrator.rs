//! Orchestration Constants
//!
//! Cadence, buffer sizing, and throttling parameters for the twin
//! orchestrator.

/// Expected sensor reporting interval in seconds.
///
/// The ingestion layer delivers one reading roughly every two seconds;
/// buffer capacities below are sized around this cadence.
pub const DEFAULT_STEP_INTERVAL_S: f32 = 2.0;

/// Minimum interval between high-fidelity cross-check requests, seconds.
///
/// The check runs a full physics simulation on a background task and can
/// take tens of seconds; two minutes keeps at most one outstanding run on
/// a small board.
pub const CHECK_INTERVAL_S: f32 = 120.0;

/// Capacity of the rolling current-sample buffer.
///
/// 60 samples = ~2 minutes at the reference cadence, matching the check
/// interval so each cross-check sees the full window since the last one.
pub const CURRENT_BUFFER_LEN: usize = 60;

/// Minimum buffered current samples before a cross-check is requested.
///
/// A shorter profile gives the physics model nothing meaningful to
/// integrate.
pub const MIN_CHECK_SAMPLES: usize = 5;

/// Polling interval for bounded readiness waits, milliseconds.
pub const READY_POLL_INTERVAL_MS: u64 = 10;
