//! Per-axis PI law with deadzone, output saturation and anti-windup.
//!
//! The error is computed in raw sensor counts so the deadzone matches the
//! ADC semantics. Inside the deadzone the output is zero and the integral
//! is frozen; on saturation the just-applied integration step is subtracted
//! back out, so the accumulator stays bounded no matter how long the output
//! clips.

/// Internal state of the PI controller.
///
/// Reset whenever a new target is set or the trajectory advances a
/// waypoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct PiState {
    /// Integral accumulator [raw count · s].
    integral: f64,
}

impl PiState {
    /// Reset the accumulator to zero.
    #[inline]
    pub fn reset(&mut self) {
        self.integral = 0.0;
    }

    /// Current accumulator value (diagnostics and tests).
    #[inline]
    pub fn integral(&self) -> f64 {
        self.integral
    }
}

/// PI gains and limits for one axis.
#[derive(Debug, Clone, Copy)]
pub struct PiGains {
    /// Proportional gain.
    pub kp: f64,
    /// Integral gain.
    pub ki: f64,
    /// Output saturation limit [device units].
    pub u_max: f64,
    /// Flip the output sign (motor wired in reverse).
    pub invert: bool,
}

/// Compute one PI step.
///
/// # Arguments
/// - `state`: integral accumulator, carried across ticks.
/// - `gains`: gains and saturation limit.
/// - `error`: raw-domain position error (target − sensor).
/// - `deadzone`: raw error band producing no action and no integration.
/// - `dt`: elapsed time since this axis's previous update [s].
///
/// # Returns
/// Signed command in device units, |output| ≤ `u_max` always.
#[inline]
pub fn pi_compute(
    state: &mut PiState,
    gains: &PiGains,
    error: f64,
    deadzone: f64,
    dt: f64,
) -> f64 {
    if dt <= 0.0 {
        return 0.0;
    }

    if error.abs() <= deadzone {
        // No action inside the deadzone, and no integral creep either.
        return 0.0;
    }

    state.integral += error * dt;
    let mut output = gains.kp * error + gains.ki * state.integral;
    if gains.invert {
        output = -output;
    }

    let saturated = output.clamp(-gains.u_max, gains.u_max);
    if saturated != output {
        // Anti-windup by back-calculation: undo the step that produced the
        // clipped output instead of clamping the accumulator.
        state.integral -= error * dt;
    }
    saturated
}

// ─── Tests ──────────────────────────────────────────────────────────
