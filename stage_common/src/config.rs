//! Configuration types for the stage control unit, loaded from TOML.
//!
//! Follows the load-then-validate convention: `StageConfig::validate` checks
//! parameter bounds before the control unit accepts the file. A config that
//! fails validation refuses start-up; nothing degrades silently.

use serde::{Deserialize, Serialize};

use crate::axis::AxisId;
use crate::calibration::AxisCalibration;

// ─── Bounds & Defaults ──────────────────────────────────────────────

/// Valid tick period range [ms].
pub const TICK_PERIOD_MS_MIN: u64 = 1;
pub const TICK_PERIOD_MS_MAX: u64 = 1000;
/// Default tick period: 10 ms (100 Hz).
pub const TICK_PERIOD_MS_DEFAULT: u64 = 10;

/// Default pause between accepted waypoints [ms].
pub const PAUSE_MS_DEFAULT: u64 = 100;

/// Default consecutive in-tolerance ticks required for convergence.
pub const SETTLING_CYCLES_DEFAULT: u32 = 10;
/// Default relaxed-tolerance multiplier.
pub const FALLBACK_MULTIPLIER_DEFAULT: f64 = 3.0;
/// Default near-target attempt budget before fallback acceptance.
pub const MAX_ATTEMPTS_DEFAULT: u32 = 120;

// ─── Per-Axis Controller ────────────────────────────────────────────

/// PI controller and sensor configuration for one axis.
///
/// An axis without a config entry is never commanded: the control unit
/// refuses to start any operation that requires it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AxisControllerConfig {
    /// Proportional gain [device units per raw count].
    pub kp: f64,
    /// Integral gain [device units per raw count-second].
    pub ki: f64,
    /// Output saturation limit [device units].
    pub u_max: f64,
    /// Flip the sign of the commanded output (motor wired in reverse).
    #[serde(default)]
    pub invert: bool,
    /// Sensor channel this controller reads its feedback from.
    pub sensor: AxisId,
    /// Error band [raw counts] inside which no output is produced and the
    /// integral is frozen.
    pub deadzone: f64,
    /// Sensor calibration for this axis.
    pub calibration: AxisCalibration,
}

impl AxisControllerConfig {
    pub fn validate(&self, axis: AxisId) -> Result<(), String> {
        if !(self.u_max > 0.0 && self.u_max.is_finite()) {
            return Err(format!("axis {axis}: u_max {} must be positive", self.u_max));
        }
        if !(self.kp >= 0.0 && self.kp.is_finite()) || !(self.ki >= 0.0 && self.ki.is_finite()) {
            return Err(format!(
                "axis {axis}: gains kp={} ki={} must be finite and non-negative",
                self.kp, self.ki
            ));
        }
        if !(self.deadzone >= 0.0 && self.deadzone.is_finite()) {
            return Err(format!(
                "axis {axis}: deadzone {} must be finite and non-negative",
                self.deadzone
            ));
        }
        if !(self.calibration.scale() > 0.0 && self.calibration.scale().is_finite()) {
            return Err(format!("axis {axis}: calibration slope must be non-zero"));
        }
        Ok(())
    }
}

// ─── Settling ───────────────────────────────────────────────────────

/// Settling / convergence policy.
///
/// The fallback multiplier and the attempt budget are tuned empirically per
/// rig, which is why they are configuration inputs rather than constants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SettlingConfig {
    /// Consecutive strict-tolerance ticks required for true convergence.
    #[serde(default = "default_settling_cycles")]
    pub cycles: u32,
    /// Relaxed tolerance = strict tolerance × this multiplier. Must be > 1.
    #[serde(default = "default_fallback_multiplier")]
    pub fallback_multiplier: f64,
    /// Near-target attempts allowed before fallback acceptance.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Strict tolerance [physical units] used when the caller does not
    /// supply one (position hold).
    pub default_tolerance: f64,
}

impl SettlingConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.cycles == 0 {
            return Err("settling.cycles must be at least 1".into());
        }
        if !(self.fallback_multiplier > 1.0 && self.fallback_multiplier.is_finite()) {
            return Err(format!(
                "settling.fallback_multiplier {} must be > 1",
                self.fallback_multiplier
            ));
        }
        if self.max_attempts <= self.cycles {
            return Err(format!(
                "settling.max_attempts {} must exceed settling.cycles {}",
                self.max_attempts, self.cycles
            ));
        }
        if !(self.default_tolerance > 0.0 && self.default_tolerance.is_finite()) {
            return Err(format!(
                "settling.default_tolerance {} must be positive",
                self.default_tolerance
            ));
        }
        Ok(())
    }
}

impl Default for SettlingConfig {
    fn default() -> Self {
        Self {
            cycles: SETTLING_CYCLES_DEFAULT,
            fallback_multiplier: FALLBACK_MULTIPLIER_DEFAULT,
            max_attempts: MAX_ATTEMPTS_DEFAULT,
            default_tolerance: 5.0,
        }
    }
}

// ─── Axis Lock ──────────────────────────────────────────────────────

/// Axis-lock and drift-correction thresholds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LockConfig {
    /// Waypoint coordinate difference [physical units] below which an axis
    /// is held idle for the segment. Sub-resolution of the sensor.
    pub epsilon: f64,
    /// Absolute error [physical units] past which a locked axis is pulled
    /// back before the waypoint is accepted.
    pub drift_threshold: f64,
}

impl LockConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.epsilon > 0.0 && self.epsilon.is_finite()) {
            return Err(format!("lock.epsilon {} must be positive", self.epsilon));
        }
        if !(self.drift_threshold > self.epsilon && self.drift_threshold.is_finite()) {
            return Err(format!(
                "lock.drift_threshold {} must exceed lock.epsilon {}",
                self.drift_threshold, self.epsilon
            ));
        }
        Ok(())
    }
}

// ─── Cycle ──────────────────────────────────────────────────────────

/// Cycle pacing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CycleConfig {
    /// Tick period [ms].
    #[serde(default = "default_tick_period")]
    pub period_ms: u64,
    /// Pause between accepted waypoints [ms] when the caller does not
    /// supply one.
    #[serde(default = "default_pause")]
    pub default_pause_ms: u64,
}

impl CycleConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.period_ms < TICK_PERIOD_MS_MIN || self.period_ms > TICK_PERIOD_MS_MAX {
            return Err(format!(
                "cycle.period_ms {} out of range [{TICK_PERIOD_MS_MIN}, {TICK_PERIOD_MS_MAX}]",
                self.period_ms
            ));
        }
        Ok(())
    }
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            period_ms: TICK_PERIOD_MS_DEFAULT,
            default_pause_ms: PAUSE_MS_DEFAULT,
        }
    }
}

// ─── Top Level ──────────────────────────────────────────────────────

/// Optional per-axis controller table.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AxesConfig {
    pub x: Option<AxisControllerConfig>,
    pub y: Option<AxisControllerConfig>,
}

impl AxesConfig {
    #[inline]
    pub fn get(&self, axis: AxisId) -> Option<&AxisControllerConfig> {
        match axis {
            AxisId::X => self.x.as_ref(),
            AxisId::Y => self.y.as_ref(),
        }
    }
}

/// Complete stage control configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StageConfig {
    #[serde(default)]
    pub cycle: CycleConfig,
    #[serde(default)]
    pub settling: SettlingConfig,
    pub lock: LockConfig,
    #[serde(default)]
    pub axes: AxesConfig,
}

impl StageConfig {
    /// Validate all parameter bounds. Called once at load time.
    pub fn validate(&self) -> Result<(), String> {
        self.cycle.validate()?;
        self.settling.validate()?;
        self.lock.validate()?;
        for axis in AxisId::ALL {
            if let Some(cfg) = self.axes.get(axis) {
                cfg.validate(axis)?;
            }
        }
        Ok(())
    }
}

fn default_settling_cycles() -> u32 {
    SETTLING_CYCLES_DEFAULT
}

fn default_fallback_multiplier() -> f64 {
    FALLBACK_MULTIPLIER_DEFAULT
}

fn default_max_attempts() -> u32 {
    MAX_ATTEMPTS_DEFAULT
}

fn default_tick_period() -> u64 {
    TICK_PERIOD_MS_DEFAULT
}

fn default_pause() -> u64 {
    PAUSE_MS_DEFAULT
}

// ─── Tests ──────────────────────────────────────────────────────────
