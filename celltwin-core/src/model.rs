//! Cell Model Interface and Shared Implementation
//!
//! ## Overview
//!
//! The estimation core consumes the physics of the cell through one narrow
//! interface, [`CellModel`]: an OCV-SOC curve, equivalent-circuit
//! parameters, a readiness gate, and a fire-and-forget high-fidelity check.
//! It never simulates electrochemistry itself - that work belongs to an
//! external [`ModelSource`] (a PDE solver, a calibration service, a canned
//! dataset) which produces tables and parameters on its own schedule.
//!
//! ## Concurrency Model
//!
//! [`SharedCellModel`] is the reference implementation for hosts with
//! threads. All mutable state lives in one mutex-guarded struct:
//!
//! ```text
//!  step path (reader, every 2 s)        background tasks (writers)
//!  ──────────────────────────────       ───────────────────────────
//!  ocv_from_soc / ecm_params ──┐        init thread: table + ECM
//!  soc_from_ocv / status ──────┼──▶ Mutex<ModelState> ◀── check thread:
//!  d_ocv_d_soc ────────────────┘        last (voltage, soc, instant)
//! ```
//!
//! Reads return owned snapshots; internal fields are never exposed by
//! reference. Check requests spawn a detached thread and return
//! immediately - a stale result is simply overwritten by the next run, and
//! failures are logged and swallowed so the foreground path can never be
//! blocked or crashed from the background.
//!
//! ## Degraded Mode
//!
//! The model is usable before and even without successful initialization:
//! the state starts on the built-in literature curve, and a failed source
//! load flips the lifecycle to [`ModelLifecycle::ReadyFallback`] rather
//! than reporting an error. Unavailability is a readiness state, not a
//! failure.

use crate::constants::cell::{FALLBACK_C1_F, FALLBACK_R0_OHM, FALLBACK_R1_OHM};

#[cfg(feature = "std")]
use crate::errors::TwinResult;
#[cfg(feature = "std")]
use crate::ocv::OcvCurve;
#[cfg(feature = "std")]
use std::{
    sync::{Arc, Mutex, MutexGuard},
    thread,
    time::{Duration, Instant},
};

/// Equivalent-circuit parameters: series resistance plus one RC pair
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EcmParams {
    /// Ohmic (instantaneous) resistance, ohms
    pub r0: f32,
    /// RC-branch polarization resistance, ohms
    pub r1: f32,
    /// RC-branch capacitance, farads
    pub c1: f32,
}

impl Default for EcmParams {
    fn default() -> Self {
        Self {
            r0: FALLBACK_R0_OHM,
            r1: FALLBACK_R1_OHM,
            c1: FALLBACK_C1_F,
        }
    }
}

/// Model lifecycle, observable through status snapshots
///
/// One-way progression: `NotStarted -> Initializing -> Ready` (or
/// `ReadyFallback` when the source failed and the literature table is
/// serving instead).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ModelLifecycle {
    /// Initialization not yet requested
    NotStarted,
    /// Background initialization in flight
    Initializing,
    /// Source data published, full accuracy
    Ready,
    /// Source failed; literature table serving in degraded mode
    ReadyFallback,
}

impl ModelLifecycle {
    /// True once estimators may be constructed against this model
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready | Self::ReadyFallback)
    }

    /// Stable lowercase tag for dashboards and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::ReadyFallback => "ready_fallback",
        }
    }
}

/// Owned status snapshot, safe to hand across threads and serialize
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ModelStatus {
    /// Current lifecycle state
    pub lifecycle: ModelLifecycle,
    /// Static reason when the source failed, if any
    pub fault: Option<&'static str>,
    /// Points in the active OCV table
    pub ocv_points: usize,
    /// Cell capacity the model was built for, Ah
    pub capacity_ah: f32,
    /// Active equivalent-circuit parameters
    pub ecm: EcmParams,
    /// Terminal voltage from the latest high-fidelity check, volts
    pub check_voltage: f32,
    /// SOC fraction from the latest high-fidelity check
    pub check_soc: f32,
    /// Age of the latest check result in seconds, None before the first
    pub check_age_s: Option<f32>,
}

/// Interface the estimation core consumes
///
/// Implementations must be internally synchronized: the filter reads on
/// every step while background tasks may be writing.
pub trait CellModel: Send + Sync {
    /// Open-circuit voltage at the given SOC and temperature
    ///
    /// Must be monotonically non-decreasing in SOC.
    fn ocv_from_soc(&self, soc: f32, temp_c: f32) -> f32;

    /// Inverse of [`ocv_from_soc`](Self::ocv_from_soc), clamped to [0, 1]
    fn soc_from_ocv(&self, ocv: f32, temp_c: f32) -> f32;

    /// Finite-difference dOCV/dSOC, consumed as the observation Jacobian
    fn d_ocv_d_soc(&self, soc: f32, temp_c: f32) -> f32;

    /// Latest equivalent-circuit parameters; cheap, called every step
    fn ecm_params(&self) -> EcmParams;

    /// Readiness gate for lazy estimator construction
    fn is_ready(&self) -> bool;

    /// Owned status snapshot
    fn status(&self) -> ModelStatus;

    /// Request one high-fidelity cross-check over a recent current profile
    ///
    /// Fire-and-forget: never blocks, returns nothing synchronously. The
    /// eventual result surfaces through [`status`](Self::status).
    fn request_check(&self, profile_ma: &[f32], dt_s: f32);
}

#[cfg(feature = "std")]
impl<T: CellModel + ?Sized> CellModel for Arc<T> {
    fn ocv_from_soc(&self, soc: f32, temp_c: f32) -> f32 {
        (**self).ocv_from_soc(soc, temp_c)
    }
    fn soc_from_ocv(&self, ocv: f32, temp_c: f32) -> f32 {
        (**self).soc_from_ocv(ocv, temp_c)
    }
    fn d_ocv_d_soc(&self, soc: f32, temp_c: f32) -> f32 {
        (**self).d_ocv_d_soc(soc, temp_c)
    }
    fn ecm_params(&self) -> EcmParams {
        (**self).ecm_params()
    }
    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
    fn status(&self) -> ModelStatus {
        (**self).status()
    }
    fn request_check(&self, profile_ma: &[f32], dt_s: f32) {
        (**self).request_check(profile_ma, dt_s)
    }
}

/// Table and parameters produced by a physics source
#[cfg(feature = "std")]
pub struct SourceData {
    /// OCV-SOC curve sampled by the source
    pub curve: OcvCurve,
    /// Extracted equivalent-circuit parameters
    pub ecm: EcmParams,
}

/// External physics engine behind the shared model
///
/// `load` runs once on the init thread and may take minutes; `run_check`
/// runs on a detached thread per request and returns the simulated
/// terminal voltage and SOC fraction for the given current profile.
#[cfg(feature = "std")]
pub trait ModelSource: Send + Sync + 'static {
    /// Produce the OCV table and ECM parameters for a cell of this capacity
    fn load(&self, capacity_ah: f32) -> TwinResult<SourceData>;

    /// Simulate the profile at high fidelity; returns (voltage, soc)
    fn run_check(&self, profile_ma: &[f32], dt_s: f32, soc_hint: f32)
        -> TwinResult<(f32, f32)>;
}

/// Everything mutable, guarded by one mutex
#[cfg(feature = "std")]
struct ModelState {
    curve: OcvCurve,
    ecm: EcmParams,
    lifecycle: ModelLifecycle,
    fault: Option<&'static str>,
    check_voltage: f32,
    check_soc: f32,
    last_check_at: Option<Instant>,
}

/// Shared, lock-guarded [`CellModel`] implementation for std hosts
#[cfg(feature = "std")]
#[derive(Clone)]
pub struct SharedCellModel {
    capacity_ah: f32,
    source: Arc<dyn ModelSource>,
    state: Arc<Mutex<ModelState>>,
}

#[cfg(feature = "std")]
fn lock_state(state: &Mutex<ModelState>) -> MutexGuard<'_, ModelState> {
    // Plain-data state: a poisoned lock is still internally consistent
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(feature = "std")]
impl SharedCellModel {
    /// Create a model backed by the given source
    ///
    /// Starts in degraded mode on the literature curve; call
    /// [`initialize_async`](Self::initialize_async) to load real data.
    pub fn new(source: impl ModelSource, capacity_ah: f32) -> Self {
        Self {
            capacity_ah,
            source: Arc::new(source),
            state: Arc::new(Mutex::new(ModelState {
                curve: OcvCurve::literature(),
                ecm: EcmParams::default(),
                lifecycle: ModelLifecycle::NotStarted,
                fault: None,
                check_voltage: 0.0,
                check_soc: 0.5,
                last_check_at: None,
            })),
        }
    }

    /// Start background initialization; returns the worker handle
    ///
    /// On source failure the model falls back to the literature table and
    /// still reports ready (as `ReadyFallback`).
    pub fn initialize_async(&self) -> thread::JoinHandle<()> {
        lock_state(&self.state).lifecycle = ModelLifecycle::Initializing;

        let source = Arc::clone(&self.source);
        let state = Arc::clone(&self.state);
        let capacity_ah = self.capacity_ah;

        thread::spawn(move || match source.load(capacity_ah) {
            Ok(data) => {
                let mut st = lock_state(&state);
                log::info!(
                    "cell model ready: {} OCV points, R0={:.4} ohm, R1={:.4} ohm",
                    data.curve.len(),
                    data.ecm.r0,
                    data.ecm.r1,
                );
                st.curve = data.curve;
                st.ecm = data.ecm;
                st.lifecycle = ModelLifecycle::Ready;
                st.fault = None;
            }
            Err(err) => {
                log::warn!("cell model source failed ({err}); serving literature table");
                let mut st = lock_state(&state);
                st.curve = OcvCurve::literature();
                st.ecm = EcmParams::default();
                st.lifecycle = ModelLifecycle::ReadyFallback;
                st.fault = Some(err.reason());
            }
        })
    }

    /// Block until ready or timeout; true on success
    pub fn wait_ready(&self, timeout: Duration) -> bool {
        use crate::constants::orchestrator::READY_POLL_INTERVAL_MS;

        let deadline = Instant::now() + timeout;
        loop {
            if self.is_ready() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(READY_POLL_INTERVAL_MS));
        }
    }
}

#[cfg(feature = "std")]
impl CellModel for SharedCellModel {
    fn ocv_from_soc(&self, soc: f32, temp_c: f32) -> f32 {
        lock_state(&self.state).curve.ocv_at(soc, temp_c)
    }

    fn soc_from_ocv(&self, ocv: f32, temp_c: f32) -> f32 {
        lock_state(&self.state).curve.soc_at(ocv, temp_c)
    }

    fn d_ocv_d_soc(&self, soc: f32, temp_c: f32) -> f32 {
        lock_state(&self.state).curve.slope_at(soc, temp_c)
    }

    fn ecm_params(&self) -> EcmParams {
        lock_state(&self.state).ecm
    }

    fn is_ready(&self) -> bool {
        lock_state(&self.state).lifecycle.is_ready()
    }

    fn status(&self) -> ModelStatus {
        let st = lock_state(&self.state);
        ModelStatus {
            lifecycle: st.lifecycle,
            fault: st.fault,
            ocv_points: st.curve.len(),
            capacity_ah: self.capacity_ah,
            ecm: st.ecm,
            check_voltage: st.check_voltage,
            check_soc: st.check_soc,
            check_age_s: st.last_check_at.map(|t| t.elapsed().as_secs_f32()),
        }
    }

    fn request_check(&self, profile_ma: &[f32], dt_s: f32) {
        if !self.is_ready() {
            return;
        }

        let profile: Vec<f32> = profile_ma.to_vec();
        let source = Arc::clone(&self.source);
        let state = Arc::clone(&self.state);

        thread::spawn(move || {
            let soc_hint = {
                let st = lock_state(&state);
                if st.check_soc > 0.0 { st.check_soc } else { 0.5 }
            };

            match source.run_check(&profile, dt_s, soc_hint) {
                Ok((voltage, soc)) => {
                    let mut st = lock_state(&state);
                    st.check_voltage = voltage;
                    st.check_soc = soc.clamp(0.0, 1.0);
                    st.last_check_at = Some(Instant::now());
                }
                // Swallowed: the last known check result just stays stale
                Err(err) => log::warn!("high-fidelity check failed: {err}"),
            }
        });
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::errors::TwinError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct GoodSource;

    impl ModelSource for GoodSource {
        fn load(&self, _capacity_ah: f32) -> TwinResult<SourceData> {
            Ok(SourceData {
                curve: OcvCurve::literature(),
                ecm: EcmParams { r0: 0.05, r1: 0.03, c1: 2000.0 },
            })
        }

        fn run_check(&self, profile_ma: &[f32], _dt_s: f32, soc_hint: f32)
            -> TwinResult<(f32, f32)>
        {
            let mean_ma = profile_ma.iter().sum::<f32>() / profile_ma.len() as f32;
            Ok((3.7 - mean_ma * 1e-5, soc_hint - 0.01))
        }
    }

    struct FailingSource;

    impl ModelSource for FailingSource {
        fn load(&self, _capacity_ah: f32) -> TwinResult<SourceData> {
            Err(TwinError::SourceFailed { reason: "solver unavailable" })
        }

        fn run_check(&self, _: &[f32], _: f32, _: f32) -> TwinResult<(f32, f32)> {
            Err(TwinError::SourceFailed { reason: "solver unavailable" })
        }
    }

    #[test]
    fn starts_not_ready_but_usable() {
        let model = SharedCellModel::new(GoodSource, 2.0);

        assert!(!model.is_ready());
        assert_eq!(model.status().lifecycle, ModelLifecycle::NotStarted);

        // Degraded-mode reads work before initialization
        let ocv = model.ocv_from_soc(0.5, 25.0);
        assert!(ocv > 3.0 && ocv < 4.3);
    }

    #[test]
    fn async_init_publishes_source_data() {
        let model = SharedCellModel::new(GoodSource, 2.0);
        model.initialize_async().join().unwrap();

        assert!(model.is_ready());
        let status = model.status();
        assert_eq!(status.lifecycle, ModelLifecycle::Ready);
        assert_eq!(status.fault, None);
        assert!((model.ecm_params().r0 - 0.05).abs() < 1e-6);
    }

    #[test]
    fn failed_init_falls_back_to_literature() {
        let model = SharedCellModel::new(FailingSource, 2.0);
        model.initialize_async().join().unwrap();

        // Ready in degraded mode, never an error
        assert!(model.is_ready());
        let status = model.status();
        assert_eq!(status.lifecycle, ModelLifecycle::ReadyFallback);
        assert_eq!(status.lifecycle.as_str(), "ready_fallback");
        assert_eq!(status.fault, Some("solver unavailable"));
        assert_eq!(status.ocv_points, 21);
    }

    #[test]
    fn check_updates_snapshot_eventually() {
        let model = SharedCellModel::new(GoodSource, 2.0);
        model.initialize_async().join().unwrap();

        model.request_check(&[1000.0, 1000.0, 1000.0], 2.0);

        // Detached worker; poll briefly for the published result
        let mut saw_result = false;
        for _ in 0..100 {
            if model.status().check_age_s.is_some() {
                saw_result = true;
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert!(saw_result);
        assert!((model.status().check_soc - 0.49).abs() < 1e-3);
    }

    #[test]
    fn failed_check_is_swallowed() {
        let model = SharedCellModel::new(GoodSource, 2.0);
        model.initialize_async().join().unwrap();

        // Swap in a failing check by driving the public path with a model
        // whose source errors on run_check
        let failing = SharedCellModel::new(FailingSource, 2.0);
        failing.initialize_async().join().unwrap();
        failing.request_check(&[100.0; 10], 2.0);

        thread::sleep(Duration::from_millis(50));
        // No result published, no panic, status still complete
        assert_eq!(failing.status().check_age_s, None);
    }

    #[test]
    fn check_ignored_before_ready() {
        let counter = Arc::new(AtomicUsize::new(0));

        struct CountingSource(Arc<AtomicUsize>);
        impl ModelSource for CountingSource {
            fn load(&self, _: f32) -> TwinResult<SourceData> {
                Ok(SourceData { curve: OcvCurve::literature(), ecm: EcmParams::default() })
            }
            fn run_check(&self, _: &[f32], _: f32, hint: f32) -> TwinResult<(f32, f32)> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok((3.7, hint))
            }
        }

        let model = SharedCellModel::new(CountingSource(Arc::clone(&counter)), 2.0);
        model.request_check(&[100.0; 10], 2.0);

        thread::sleep(Duration::from_millis(50));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn wait_ready_times_out_cleanly() {
        let model = SharedCellModel::new(GoodSource, 2.0);
        // Never initialized
        assert!(!model.wait_ready(Duration::from_millis(50)));
    }
}
