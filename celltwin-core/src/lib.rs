//! Estimation core for the CellTwin battery digital twin
//!
//! Fuses noisy terminal-voltage, current, and temperature readings into
//! continuous State-of-Charge, State-of-Health, and Remaining-Useful-Life
//! estimates at sensor-reporting rates.
//!
//! Key constraints:
//! - Filter and degradation math run on no_std targets (libm, no heap)
//! - One estimation step per sensor reading, sub-millisecond latency
//! - High-fidelity physics checks stay off the real-time path
//!
//! ```no_run
//! use celltwin_core::{BatteryTwin, TwinConfig, SharedCellModel};
//! # use celltwin_core::model::{ModelSource, SourceData};
//! # struct MySource;
//! # impl ModelSource for MySource {
//! #     fn load(&self, _: f32) -> celltwin_core::TwinResult<SourceData> { todo!() }
//! #     fn run_check(&self, _: &[f32], _: f32, _: f32) -> celltwin_core::TwinResult<(f32, f32)> { todo!() }
//! # }
//!
//! let model = SharedCellModel::new(MySource, 2.0);
//! model.initialize_async();
//!
//! let twin = BatteryTwin::new(model, TwinConfig::new(2.0));
//!
//! // One call per sensor reading: voltage [V], current [mA], temperature [C], dt [s]
//! let result = twin.step(3.72, 150.0, 25.0, 2.0);
//! println!("SOC {:.1}% +/- {:.2}", result.soc_pct, result.sigma_soc * 100.0);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod buffer;
pub mod constants;
pub mod ekf;
pub mod errors;
pub mod model;
pub mod ocv;
pub mod soh;

#[cfg(feature = "std")]
pub mod twin;

// Public API
pub use errors::{TwinError, TwinResult};
pub use ekf::{FilterConfig, SocFilter, SocUpdate};
pub use model::{CellModel, EcmParams, ModelLifecycle, ModelStatus};
pub use ocv::OcvCurve;
pub use soh::{HealthConfig, HealthEstimator, HealthTrend, HealthUpdate};

#[cfg(feature = "std")]
pub use model::{ModelSource, SharedCellModel, SourceData};
#[cfg(feature = "std")]
pub use twin::{BatteryTwin, StepResult, TwinConfig, TwinStatus};

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
