//! Error Types for the Estimation Core
//!
//! ## Design Philosophy
//!
//! The estimator hot paths never return errors: every `step` produces a
//! complete result record, and degraded confidence is expressed through the
//! numeric fields themselves (see the crate-level docs). `TwinError` covers
//! the construction and validation seams only:
//!
//! 1. **Small Size**: all payloads are inline `&'static str` reasons or
//!    plain integers - no String, no heap, deterministic memory usage.
//!
//! 2. **Copy Semantics**: errors implement Copy so they can be returned and
//!    stored (e.g. as a model fault snapshot) without move complications.
//!
//! 3. **Actionable Information**: each variant carries enough context to
//!    decide the response without further queries.
//!
//! ## Error Categories
//!
//! - `InvalidTable`: an OCV table failed monotonicity/shape validation
//! - `InvalidConfig`: a config struct failed its own validation
//! - `SourceFailed`: the external physics source could not produce data
//! - `NotReady`: a bounded wait for model readiness timed out

use thiserror_no_std::Error;

/// Result type for fallible core operations
pub type TwinResult<T> = Result<T, TwinError>;

/// Errors raised at construction and validation seams - kept small for
/// embedded use
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TwinError {
    /// OCV table failed shape or monotonicity validation
    #[error("OCV table invalid: {reason}")]
    InvalidTable {
        /// What the validation found
        reason: &'static str,
    },

    /// Configuration failed validation
    #[error("configuration invalid: {reason}")]
    InvalidConfig {
        /// Which constraint was violated
        reason: &'static str,
    },

    /// External physics source could not produce table or parameters
    #[error("model source failed: {reason}")]
    SourceFailed {
        /// Source-reported failure cause
        reason: &'static str,
    },

    /// Bounded wait for model readiness timed out
    #[error("model not ready after {waited_ms} ms")]
    NotReady {
        /// How long the caller waited before giving up
        waited_ms: u64,
    },
}

impl TwinError {
    /// Short static description, suitable for status snapshots
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidTable { reason } => reason,
            Self::InvalidConfig { reason } => reason,
            Self::SourceFailed { reason } => reason,
            Self::NotReady { .. } => "readiness wait timed out",
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TwinError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::InvalidTable { reason } =>
                defmt::write!(fmt, "OCV table invalid: {}", reason),
            Self::InvalidConfig { reason } =>
                defmt::write!(fmt, "config invalid: {}", reason),
            Self::SourceFailed { reason } =>
                defmt::write!(fmt, "model source failed: {}", reason),
            Self::NotReady { waited_ms } =>
                defmt::write!(fmt, "model not ready after {} ms", waited_ms),
        }
    }
}
