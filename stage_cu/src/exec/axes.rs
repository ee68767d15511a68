//! Per-axis runtime state and the single-axis control step shared by the
//! trajectory executor and the position-hold mode.

use std::time::Instant;

use stage_common::config::AxisControllerConfig;

use crate::control::pi::{PiGains, PiState, pi_compute};

/// Mutable per-axis state, owned exclusively by the active mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct AxisRuntime {
    /// PI accumulator.
    pub pi: PiState,
    /// Raw sensor target for the current setpoint.
    pub target_raw: f64,
    /// Current setpoint [physical units].
    pub target_phys: f64,
    /// Command issued on the previous tick, re-issued across sensor gaps.
    pub last_command: f64,
    /// When this axis last ran its control law. `None` right after a
    /// retarget, so the first step uses the nominal tick period.
    pub last_update: Option<Instant>,
    /// Most recent physical-domain error; kept for diagnostics and the
    /// locked-axis drift check.
    pub last_error_phys: Option<f64>,
}

/// Outcome of one active-axis step.
#[derive(Debug, Clone, Copy)]
pub struct AxisStepOutcome {
    /// Command for this axis [device units].
    pub command: f64,
    /// Fresh physical-domain error, `None` across a sensor gap.
    pub error_phys: Option<f64>,
}

/// Point an axis at a new setpoint, resetting all per-setpoint state.
pub fn retarget(rt: &mut AxisRuntime, cfg: &AxisControllerConfig, physical: f64) {
    rt.target_phys = physical;
    rt.target_raw = cfg.calibration.to_raw(physical);
    rt.pi.reset();
    rt.last_update = None;
    rt.last_error_phys = None;
    rt.last_command = 0.0;
}

/// Run one control step for an actively driven axis.
///
/// A missing reading re-issues the previous command and reports no fresh
/// error; the control state is untouched ("no new information").
pub fn step_active(
    rt: &mut AxisRuntime,
    cfg: &AxisControllerConfig,
    reading: Option<i32>,
    now: Instant,
    nominal_dt: f64,
) -> AxisStepOutcome {
    let Some(raw) = reading else {
        return AxisStepOutcome {
            command: rt.last_command,
            error_phys: None,
        };
    };
    let raw = f64::from(raw);
    let error_raw = rt.target_raw - raw;
    let error_phys = rt.target_phys - cfg.calibration.to_physical(raw);

    let dt = rt
        .last_update
        .map(|t| now.duration_since(t).as_secs_f64())
        .unwrap_or(nominal_dt);
    rt.last_update = Some(now);

    let gains = PiGains {
        kp: cfg.kp,
        ki: cfg.ki,
        u_max: cfg.u_max,
        invert: cfg.invert,
    };
    let command = pi_compute(&mut rt.pi, &gains, error_raw, cfg.deadzone, dt);
    rt.last_command = command;
    rt.last_error_phys = Some(error_phys);
    AxisStepOutcome {
        command,
        error_phys: Some(error_phys),
    }
}

/// Observe a locked axis: the error is tracked for diagnostics and the
/// drift check, but no control action is taken and the integral stays
/// frozen.
pub fn step_locked(
    rt: &mut AxisRuntime,
    cfg: &AxisControllerConfig,
    reading: Option<i32>,
) -> Option<f64> {
    rt.last_command = 0.0;
    let raw = f64::from(reading?);
    let error_phys = rt.target_phys - cfg.calibration.to_physical(raw);
    rt.last_error_phys = Some(error_phys);
    Some(error_phys)
}

// ─── Test Hardware Probe ────────────────────────────────────────────


// ─── Tests ──────────────────────────────────────────────────────────
