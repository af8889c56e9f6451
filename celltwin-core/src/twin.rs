//! Battery Twin Orchestrator
//!
//! ## Overview
//!
//! [`BatteryTwin`] wires the cell model, the SOC filter, and the health
//! estimator into one step-per-reading pipeline:
//!
//! ```text
//! (V, I, T, dt) ──▶ step ──▶ SocFilter ──▶ HealthEstimator ──▶ StepResult
//!                    │            ▲
//!                    │      CellModel (OCV table, ECM params)
//!                    │            ▲
//!                    └── throttled high-fidelity check requests
//! ```
//!
//! ## Lifecycle
//!
//! The estimator pair cannot exist before the model is ready - the filter
//! bootstraps itself by inverting the OCV curve. The twin therefore starts
//! on an open-loop estimation strategy and swaps in the filtered pair the
//! first time a step observes readiness. The transition is one-way and
//! happens inside the twin's lock, so concurrent steps from multiple
//! ingestion threads construct the pair exactly once.
//!
//! Until then, `step` still answers: the open-loop strategy inverts the
//! OCV curve directly and reports an honest, wide uncertainty. There is no
//! error variant - degraded confidence is visible only in the numbers.
//!
//! ## Cross-Check Throttling
//!
//! Every step appends the raw current sample to a rolling buffer. When the
//! configured interval has passed, enough samples are buffered, and the
//! model is ready, the twin fires one high-fidelity check request with the
//! buffered profile and stamps the throttle clock immediately - not when
//! the check completes - so a slow simulation can never pile up requests.
//! The latest completed check surfaces in every [`StepResult`]; it may lag
//! the current reading by the throttle interval or more.

use std::{
    sync::{Mutex, MutexGuard},
    thread,
    time::{Duration, Instant},
};

use crate::{
    buffer::HistoryBuffer,
    constants::cell::{DEFAULT_CELL_CAPACITY_AH, OPEN_LOOP_SIGMA_SOC},
    constants::orchestrator::{
        CHECK_INTERVAL_S, CURRENT_BUFFER_LEN, MIN_CHECK_SAMPLES,
        READY_POLL_INTERVAL_MS,
    },
    ekf::{FilterConfig, SocFilter, SocUpdate},
    errors::{TwinError, TwinResult},
    model::{CellModel, EcmParams, ModelLifecycle, ModelStatus},
    soh::{HealthConfig, HealthEstimator, HealthTrend},
};

/// Twin configuration
///
/// [`TwinConfig::new`] keeps the capacity consistent across the filter and
/// health sub-configs; the fresh-cell R0 baseline is taken from the model
/// at estimator construction time.
#[derive(Debug, Clone)]
pub struct TwinConfig {
    /// Nominal cell capacity, ampere-hours
    pub capacity_ah: f32,
    /// SOC filter configuration
    pub filter: FilterConfig,
    /// Health estimator configuration
    pub health: HealthConfig,
    /// Minimum seconds between high-fidelity check requests
    pub check_interval_s: f32,
    /// Minimum buffered current samples before a check is requested
    pub min_check_samples: usize,
}

impl TwinConfig {
    /// Configuration for a cell of the given capacity
    pub fn new(capacity_ah: f32) -> Self {
        Self {
            capacity_ah,
            filter: FilterConfig::default().with_capacity_ah(capacity_ah),
            health: HealthConfig::default().with_capacity_ah(capacity_ah),
            check_interval_s: CHECK_INTERVAL_S,
            min_check_samples: MIN_CHECK_SAMPLES,
        }
    }

    /// Override the check throttle interval
    pub fn with_check_interval_s(mut self, interval_s: f32) -> Self {
        self.check_interval_s = interval_s;
        self
    }

    /// Override the filter configuration
    pub fn with_filter(mut self, filter: FilterConfig) -> Self {
        self.filter = filter;
        self
    }

    /// Override the health configuration
    pub fn with_health(mut self, health: HealthConfig) -> Self {
        self.health = health;
        self
    }

    /// Check all nested configuration invariants
    pub fn validate(&self) -> TwinResult<()> {
        if !(self.check_interval_s >= 0.0) {
            return Err(TwinError::InvalidConfig {
                reason: "check interval must be non-negative",
            });
        }
        self.filter.validate()?;
        self.health.validate()
    }
}

impl Default for TwinConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_CAPACITY_AH)
    }
}

/// Flat per-step result record
///
/// The sole artifact the ingestion/dashboard layer reads; it never reaches
/// into estimator state directly. Always complete - startup and background
/// failures show up only in the numeric fields.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct StepResult {
    /// Filtered state of charge, fraction
    pub soc: f32,
    /// Filtered state of charge, percent
    pub soc_pct: f32,
    /// Open-circuit voltage at the estimated SOC, volts
    pub ocv: f32,
    /// Terminal voltage predicted by the filter, volts
    pub v_predicted: f32,
    /// Terminal voltage as measured, volts
    pub v_measured: f32,
    /// Measurement minus prediction, volts
    pub innovation: f32,
    /// 1-sigma SOC uncertainty, fraction
    pub sigma_soc: f32,
    /// Internal resistance used this step, ohms
    pub r0: f32,

    /// Combined state of health, percent
    pub soh: f32,
    /// Capacity-based state of health, percent
    pub soh_capacity: f32,
    /// Resistance-based state of health, percent
    pub soh_resistance: f32,
    /// Remaining useful life, cycles
    pub rul_cycles: f32,
    /// Remaining useful life, days (capped)
    pub rul_days: f32,
    /// Equivalent full cycles accumulated
    pub full_cycles: f32,
    /// Smoothed internal resistance, ohms
    pub r0_ema: f32,
    /// Cumulative charge throughput, ampere-hours
    pub ah_throughput: f32,

    /// Whether the cell model is ready
    pub model_ready: bool,
    /// Cell model lifecycle state
    pub model_lifecycle: ModelLifecycle,
    /// Terminal voltage from the latest high-fidelity check, volts
    pub check_voltage: f32,
    /// SOC from the latest high-fidelity check, percent
    pub check_soc_pct: f32,

    /// Monotonically increasing step counter
    pub step_count: u64,
    /// Seconds since the twin was created
    pub uptime_s: f32,
}

/// Twin status snapshot for dashboards
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct TwinStatus {
    /// Cell model status
    pub model: ModelStatus,
    /// Whether the filtered estimator pair has been constructed
    pub estimator_ready: bool,
    /// Steps processed so far
    pub step_count: u64,
    /// Seconds since the twin was created
    pub uptime_s: f32,
    /// Most recent step result, if any step has run
    pub last_result: Option<StepResult>,
}

/// SOC estimation strategy, selected by lifecycle state
///
/// Two explicit implementations of "estimate SOC" rather than a nullable
/// filter handle: open-loop OCV inversion before the model is ready,
/// filtered estimation after.
enum Estimator {
    /// Direct OCV inversion; no filtering, wide uncertainty
    OpenLoop,
    /// Full EKF + degradation tracking
    Filtered {
        filter: SocFilter,
        health: HealthEstimator,
    },
}

/// State mutated by `step`, all behind one lock
struct TwinInner {
    estimator: Estimator,
    /// Rolling raw current samples (mA) for check profiles
    currents_ma: HistoryBuffer<CURRENT_BUFFER_LEN>,
    /// When the last check request was fired
    last_check: Option<Instant>,
    step_count: u64,
    last_result: Option<StepResult>,
}

/// Battery digital twin orchestrator
///
/// One instance per physical cell; readings must arrive in temporal order.
/// `step` may be called from multiple ingestion threads - all shared state
/// lives behind the internal lock.
pub struct BatteryTwin<M: CellModel> {
    model: M,
    config: TwinConfig,
    inner: Mutex<TwinInner>,
    started_at: Instant,
}

impl<M: CellModel> BatteryTwin<M> {
    /// Create a twin over the given model
    ///
    /// The configuration should be validated beforehand
    /// ([`TwinConfig::validate`]); the twin itself trusts it.
    pub fn new(model: M, config: TwinConfig) -> Self {
        Self {
            model,
            config,
            inner: Mutex::new(TwinInner {
                estimator: Estimator::OpenLoop,
                currents_ma: HistoryBuffer::new(),
                last_check: None,
                step_count: 0,
                last_result: None,
            }),
            started_at: Instant::now(),
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, TwinInner> {
        // Plain-data state: a poisoned lock is still internally consistent
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Process one sensor reading
    ///
    /// `voltage_v` terminal voltage, `current_ma` signed milliamps
    /// (positive = discharge), `temperature_c` cell temperature, `dt_s`
    /// seconds since the previous reading.
    pub fn step(&self, voltage_v: f32, current_ma: f32, temperature_c: f32, dt_s: f32)
        -> StepResult
    {
        let current_a = current_ma / 1000.0;
        let mut inner = self.lock_inner();

        inner.currents_ma.push(current_ma);

        // One-way transition, guarded by the lock: concurrent steps racing
        // past the readiness flip still construct the pair exactly once
        if matches!(inner.estimator, Estimator::OpenLoop) && self.model.is_ready() {
            let ecm = self.model.ecm_params();
            let filter = SocFilter::new(self.config.filter.clone(), ecm);
            let health =
                HealthEstimator::new(self.config.health.clone().with_nominal_r0(ecm.r0));
            log::info!(
                "estimators initialised (R0={:.4} ohm, R1={:.4} ohm)",
                ecm.r0,
                ecm.r1,
            );
            inner.estimator = Estimator::Filtered { filter, health };
        }

        let (soc_update, health_update) = match &mut inner.estimator {
            Estimator::Filtered { filter, health } => {
                let u = filter.update(&self.model, voltage_v, current_a, dt_s, temperature_c);
                let h = health.update(u.soc, current_a, u.r0, dt_s);
                (u, Some(h))
            }
            Estimator::OpenLoop => {
                // No filter yet: invert the OCV curve directly and report
                // the honest open-loop uncertainty and literature circuit
                // values
                let soc = self.model.soc_from_ocv(voltage_v, temperature_c);
                let ocv = self.model.ocv_from_soc(soc, temperature_c);
                let ecm = EcmParams::default();
                let u = SocUpdate {
                    soc,
                    v_rc: 0.0,
                    v_predicted: voltage_v,
                    innovation: 0.0,
                    sigma_soc: OPEN_LOOP_SIGMA_SOC,
                    ocv,
                    r0: ecm.r0,
                    r1: ecm.r1,
                };
                (u, None)
            }
        };

        // Throttled, fire-and-forget cross-check request. The throttle
        // clock is stamped at request time, not completion, so a slow
        // check cannot pile up requests behind it.
        let now = Instant::now();
        let check_due = inner
            .last_check
            .map_or(true, |t| now.duration_since(t).as_secs_f32() > self.config.check_interval_s);
        if check_due
            && inner.currents_ma.len() >= self.config.min_check_samples
            && self.model.is_ready()
        {
            let profile: Vec<f32> = inner.currents_ma.iter().collect();
            self.model.request_check(&profile, dt_s);
            inner.last_check = Some(now);
        }

        inner.step_count += 1;

        let status = self.model.status();
        let result = StepResult {
            soc: soc_update.soc,
            soc_pct: soc_update.soc * 100.0,
            ocv: soc_update.ocv,
            v_predicted: soc_update.v_predicted,
            v_measured: voltage_v,
            innovation: soc_update.innovation,
            sigma_soc: soc_update.sigma_soc,
            r0: soc_update.r0,

            soh: health_update.map_or(100.0, |h| h.soh),
            soh_capacity: health_update.map_or(100.0, |h| h.soh_capacity),
            soh_resistance: health_update.map_or(100.0, |h| h.soh_resistance),
            rul_cycles: health_update.map_or(0.0, |h| h.rul_cycles),
            rul_days: health_update.map_or(0.0, |h| h.rul_days),
            full_cycles: health_update.map_or(0.0, |h| h.full_cycles),
            r0_ema: health_update.map_or(soc_update.r0, |h| h.r0_ema),
            ah_throughput: health_update.map_or(0.0, |h| h.ah_throughput),

            model_ready: status.lifecycle.is_ready(),
            model_lifecycle: status.lifecycle,
            check_voltage: status.check_voltage,
            check_soc_pct: status.check_soc * 100.0,

            step_count: inner.step_count,
            uptime_s: self.started_at.elapsed().as_secs_f32(),
        };

        inner.last_result = Some(result);
        result
    }

    /// Status snapshot for dashboards
    pub fn status(&self) -> TwinStatus {
        let inner = self.lock_inner();
        TwinStatus {
            model: self.model.status(),
            estimator_ready: matches!(inner.estimator, Estimator::Filtered { .. }),
            step_count: inner.step_count,
            uptime_s: self.started_at.elapsed().as_secs_f32(),
            last_result: inner.last_result,
        }
    }

    /// SOH trend over the recent history window
    ///
    /// `Unknown` until the filtered estimators exist and have history.
    pub fn trend(&self) -> HealthTrend {
        match &self.lock_inner().estimator {
            Estimator::Filtered { health, .. } => health.trend(),
            Estimator::OpenLoop => HealthTrend::Unknown,
        }
    }

    /// Block until the model is ready or the timeout expires
    pub fn wait_ready(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.model.is_ready() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(READY_POLL_INTERVAL_MS));
        }
    }

    /// The cell model this twin estimates against
    pub fn model(&self) -> &M {
        &self.model
    }
}
