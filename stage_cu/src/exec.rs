//! Execution modes and the lifecycle facade.
//!
//! [`StageController`] owns the validated configuration and at most one
//! active mode. All hardware traffic and event emission flow through its
//! `tick`; controller parameters cannot change while a mode is active, so a
//! tick never sees a half-updated control law.

pub mod axes;
pub mod executor;
pub mod hold;

use std::time::{Duration, Instant};

use thiserror::Error;

use stage_common::axis::AxisId;
use stage_common::config::{AxisControllerConfig, StageConfig};
use stage_common::event::{EventBuf, StageEvent};
use stage_common::trajectory::Waypoint;

use crate::control::settling::SettlingParams;
use crate::exec::executor::{ExecState, TrajectoryExecutor, TrajectoryParams};
use crate::exec::hold::{HoldParams, HoldState, PositionHold};
use crate::hw::StageHardware;

/// Why a lifecycle call was refused. Reported once; nothing starts
/// partially.
#[derive(Debug, Error, PartialEq)]
pub enum StartError {
    /// The operation drives both axes and this one has no controller.
    #[error("axis {0} has no controller configured")]
    AxisNotConfigured(AxisId),
    /// Trajectories must contain at least one waypoint.
    #[error("trajectory contains no waypoints")]
    EmptyTrajectory,
    /// A trajectory or hold is already active.
    #[error("an operation is already active; stop it first")]
    Busy,
    /// Tolerance must be a positive, finite value.
    #[error("tolerance {0} is not a positive finite value")]
    InvalidTolerance(f64),
}

enum Mode {
    Idle,
    Trajectory(TrajectoryExecutor),
    Hold(PositionHold),
}

/// Lifecycle facade over the trajectory executor and the position hold.
pub struct StageController {
    config: StageConfig,
    mode: Mode,
}

impl StageController {
    /// The config must already have passed `StageConfig::validate`.
    pub fn new(config: StageConfig) -> Self {
        Self {
            config,
            mode: Mode::Idle,
        }
    }

    #[inline]
    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    /// Replace the configuration. Refused while a mode is active so the
    /// control law's parameters cannot tear across a tick.
    pub fn set_config(&mut self, config: StageConfig) -> Result<(), StartError> {
        if self.is_active() {
            return Err(StartError::Busy);
        }
        self.config = config;
        Ok(())
    }

    /// Whether any mode still wants ticks.
    pub fn is_active(&self) -> bool {
        match &self.mode {
            Mode::Idle => false,
            Mode::Trajectory(t) => t.is_active(),
            Mode::Hold(h) => h.is_active(),
        }
    }

    /// Trajectory state, if a trajectory is loaded.
    pub fn trajectory_state(&self) -> Option<ExecState> {
        match &self.mode {
            Mode::Trajectory(t) => Some(t.state()),
            _ => None,
        }
    }

    /// Hold state, if a hold is loaded.
    pub fn hold_state(&self) -> Option<HoldState> {
        match &self.mode {
            Mode::Hold(h) => Some(h.state()),
            _ => None,
        }
    }

    fn require_axes(&self) -> Result<[AxisControllerConfig; 2], StartError> {
        let x = self
            .config
            .axes
            .get(AxisId::X)
            .copied()
            .ok_or(StartError::AxisNotConfigured(AxisId::X))?;
        let y = self
            .config
            .axes
            .get(AxisId::Y)
            .copied()
            .ok_or(StartError::AxisNotConfigured(AxisId::Y))?;
        Ok([x, y])
    }

    /// Begin a trajectory. `tolerance` is the strict band in physical
    /// units; `pause` is the dwell between accepted waypoints.
    pub fn start_trajectory(
        &mut self,
        points: Vec<Waypoint>,
        tolerance: f64,
        pause: Duration,
        events: &mut EventBuf,
    ) -> Result<(), StartError> {
        if self.is_active() {
            return Err(StartError::Busy);
        }
        if points.is_empty() {
            return Err(StartError::EmptyTrajectory);
        }
        if !(tolerance > 0.0 && tolerance.is_finite()) {
            return Err(StartError::InvalidTolerance(tolerance));
        }
        let axis_cfg = self.require_axes()?;

        let params = TrajectoryParams {
            tolerance,
            fallback_multiplier: self.config.settling.fallback_multiplier,
            settling: SettlingParams {
                cycles: self.config.settling.cycles,
                max_attempts: self.config.settling.max_attempts,
            },
            pause,
            lock_epsilon: self.config.lock.epsilon,
            drift_threshold: self.config.lock.drift_threshold,
            nominal_dt: self.config.cycle.period_ms as f64 / 1000.0,
        };
        let count = points.len();
        self.mode = Mode::Trajectory(TrajectoryExecutor::new(points, axis_cfg, params));
        let _ = events.push(StageEvent::TrajectoryStarted { points: count });
        Ok(())
    }

    /// Cancel the running trajectory. Idempotent; a no-op when no
    /// trajectory is loaded.
    pub fn stop_trajectory(&mut self, hw: &mut dyn StageHardware, events: &mut EventBuf) {
        if let Mode::Trajectory(t) = &mut self.mode {
            t.stop(hw, events);
        }
    }

    /// Drive both axes to a fixed target pair and keep them there. The
    /// strict tolerance comes from `settling.default_tolerance`.
    pub fn start_position_hold(
        &mut self,
        x: f64,
        y: f64,
        events: &mut EventBuf,
    ) -> Result<(), StartError> {
        if self.is_active() {
            return Err(StartError::Busy);
        }
        let axis_cfg = self.require_axes()?;

        let params = HoldParams {
            tolerance: self.config.settling.default_tolerance,
            fallback_multiplier: self.config.settling.fallback_multiplier,
            settling: SettlingParams {
                cycles: self.config.settling.cycles,
                max_attempts: self.config.settling.max_attempts,
            },
            nominal_dt: self.config.cycle.period_ms as f64 / 1000.0,
        };
        self.mode = Mode::Hold(PositionHold::new(Waypoint::new(x, y), axis_cfg, params));
        let _ = events.push(StageEvent::HoldStarted { x, y });
        Ok(())
    }

    /// Release the position hold. Idempotent; a no-op when no hold is
    /// loaded.
    pub fn stop_position_hold(&mut self, hw: &mut dyn StageHardware, events: &mut EventBuf) {
        if let Mode::Hold(h) = &mut self.mode {
            h.stop(hw, events);
        }
    }

    /// Stop whatever is active (the external cancellation path).
    pub fn stop_all(&mut self, hw: &mut dyn StageHardware, events: &mut EventBuf) {
        match &mut self.mode {
            Mode::Idle => {}
            Mode::Trajectory(t) => t.stop(hw, events),
            Mode::Hold(h) => h.stop(hw, events),
        }
    }

    /// One fixed-rate control tick.
    pub fn tick(&mut self, now: Instant, hw: &mut dyn StageHardware, events: &mut EventBuf) {
        match &mut self.mode {
            Mode::Idle => {}
            Mode::Trajectory(t) => t.tick(now, hw, events),
            Mode::Hold(h) => h.tick(now, hw, events),
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
