//! Trajectory executor: the waypoint-walking state machine.
//!
//! Each tick in `Moving` runs the per-axis PI laws, issues exactly one
//! hardware command, folds the axis errors into the settling detector, and
//! decides transitions. Acceptance of a waypoint first checks whether a
//! locked axis has drifted past the safety threshold; if so, a dedicated
//! one-axis correction sub-state pulls it back before the waypoint can be
//! accepted with fresh readings.

use std::time::{Duration, Instant};

use stage_common::axis::AxisId;
use stage_common::config::AxisControllerConfig;
use stage_common::event::{AcceptanceKind, EventBuf, LockFlags, StageEvent, TickFeedback};
use stage_common::trajectory::Waypoint;

use crate::control::lock::analyze_locks;
use crate::control::settling::{
    SettleVerdict, SettlingDetector, SettlingParams, ToleranceBand, classify,
};
use crate::exec::axes::{AxisRuntime, retarget, step_active, step_locked};
use crate::hw::{AxisCommandPair, StageHardware};

/// Trajectory execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    /// Driving the current waypoint.
    Moving,
    /// Pause between accepted waypoints.
    Waiting,
    /// Pulling a drifted locked axis back before acceptance.
    CorrectingLockedAxis,
    /// All waypoints accepted.
    Completed,
    /// Externally cancelled.
    Stopped,
}

/// Per-trajectory tunables, fixed at start.
#[derive(Debug, Clone, Copy)]
pub struct TrajectoryParams {
    /// Strict settling tolerance [physical units].
    pub tolerance: f64,
    /// Relaxed tolerance = `tolerance × fallback_multiplier`.
    pub fallback_multiplier: f64,
    /// Settling counters.
    pub settling: SettlingParams,
    /// Dwell between accepted waypoints.
    pub pause: Duration,
    /// Axis-lock coordinate epsilon [physical units].
    pub lock_epsilon: f64,
    /// Locked-axis drift threshold [physical units].
    pub drift_threshold: f64,
    /// Nominal tick period [s], used as the first-step `dt` after a
    /// retarget.
    pub nominal_dt: f64,
}

/// The waypoint-walking state machine.
///
/// Owns all mutable control state: per-axis integrals, settling counters
/// and the trajectory cursor. No other component mutates them.
pub struct TrajectoryExecutor {
    points: Vec<Waypoint>,
    params: TrajectoryParams,
    axis_cfg: [AxisControllerConfig; 2],
    state: ExecState,
    index: usize,
    locks: LockFlags,
    correcting: Option<AxisId>,
    wait_until: Option<Instant>,
    settling: SettlingDetector,
    axes: [AxisRuntime; 2],
}

impl TrajectoryExecutor {
    /// Build an executor positioned at waypoint 0.
    ///
    /// The facade validates the trajectory and axis configs beforehand;
    /// `points` must be non-empty.
    pub fn new(
        points: Vec<Waypoint>,
        axis_cfg: [AxisControllerConfig; 2],
        params: TrajectoryParams,
    ) -> Self {
        let mut exec = Self {
            points,
            params,
            axis_cfg,
            state: ExecState::Moving,
            index: 0,
            locks: LockFlags::empty(),
            correcting: None,
            wait_until: None,
            settling: SettlingDetector::default(),
            axes: [AxisRuntime::default(); 2],
        };
        exec.enter_waypoint(0);
        exec
    }

    #[inline]
    pub fn state(&self) -> ExecState {
        self.state
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether the executor still wants ticks.
    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            ExecState::Moving | ExecState::Waiting | ExecState::CorrectingLockedAxis
        )
    }

    /// Per-axis integral accumulators (diagnostics and tests).
    #[inline]
    pub fn integrals(&self) -> [f64; 2] {
        [self.axes[0].pi.integral(), self.axes[1].pi.integral()]
    }

    /// Cancel execution: one brake, terminal `Stopped`, index left where it
    /// was. Idempotent; a second call changes nothing.
    pub fn stop(&mut self, hw: &mut dyn StageHardware, events: &mut EventBuf) {
        if !self.is_active() {
            return;
        }
        hw.brake();
        hw.manual_mode();
        self.state = ExecState::Stopped;
        self.correcting = None;
        let _ = events.push(StageEvent::TrajectoryStopped);
    }

    /// Run one control tick.
    pub fn tick(&mut self, now: Instant, hw: &mut dyn StageHardware, events: &mut EventBuf) {
        match self.state {
            ExecState::Moving => self.tick_moving(now, hw, events),
            ExecState::Waiting => self.tick_waiting(now),
            ExecState::CorrectingLockedAxis => self.tick_correcting(now, hw, events),
            ExecState::Completed | ExecState::Stopped => {}
        }
    }

    // ── Waypoint entry ──────────────────────────────────────────────

    /// Enter a waypoint with fresh per-waypoint state. Lock analysis runs
    /// here, once per segment; locking decisions are never revisited
    /// mid-tick.
    fn enter_waypoint(&mut self, index: usize) {
        self.index = index;
        let wp = self.points[index];
        self.locks = analyze_locks(&self.points, index, self.params.lock_epsilon);
        self.settling.reset();
        self.correcting = None;
        for axis in AxisId::ALL {
            retarget(
                &mut self.axes[axis.index()],
                &self.axis_cfg[axis.index()],
                wp.coord(axis),
            );
        }
    }

    // ── Moving ──────────────────────────────────────────────────────

    fn tick_moving(&mut self, now: Instant, hw: &mut dyn StageHardware, events: &mut EventBuf) {
        let mut cmd = AxisCommandPair::ZERO;
        let mut errors: [Option<f64>; 2] = [None; 2];
        let mut band = ToleranceBand::Strict;
        let mut sensor_gap = false;

        for axis in AxisId::ALL {
            let i = axis.index();
            let cfg = &self.axis_cfg[i];
            let reading = hw.read_sensor(cfg.sensor);
            if self.locks.is_locked(axis) {
                // Error is still tracked for diagnostics and the drift
                // check, but the axis is not actuated.
                errors[i] = step_locked(&mut self.axes[i], cfg, reading);
            } else {
                let out = step_active(&mut self.axes[i], cfg, reading, now, self.params.nominal_dt);
                cmd.set(axis, out.command);
                errors[i] = out.error_phys;
                match out.error_phys {
                    Some(err) => {
                        band = band.worst(classify(
                            err.abs(),
                            self.params.tolerance,
                            self.params.fallback_multiplier,
                        ));
                    }
                    None => sensor_gap = true,
                }
            }
        }

        hw.send_command(cmd);

        let verdict = if sensor_gap {
            // No new information on an acceptance-relevant axis: the
            // counters neither advance nor reset this tick.
            SettleVerdict::Pending
        } else {
            self.settling.observe(band, &self.params.settling)
        };

        self.push_feedback(events, errors, cmd);

        match verdict {
            SettleVerdict::Pending => {}
            SettleVerdict::Converged => self.accept(now, hw, events, AcceptanceKind::Settled),
            SettleVerdict::FallbackAccepted => {
                self.accept(now, hw, events, AcceptanceKind::Fallback)
            }
        }
    }

    /// Acceptance edge: the drift check runs first; acceptance proper
    /// brakes and advances.
    fn accept(
        &mut self,
        now: Instant,
        hw: &mut dyn StageHardware,
        events: &mut EventBuf,
        kind: AcceptanceKind,
    ) {
        if let Some(axis) = self.drifted_locked_axis() {
            let error = self.axes[axis.index()].last_error_phys.unwrap_or(0.0);
            self.correcting = Some(axis);
            self.settling.reset();
            let rt = &mut self.axes[axis.index()];
            rt.pi.reset();
            rt.last_update = None;
            self.state = ExecState::CorrectingLockedAxis;
            let _ = events.push(StageEvent::DriftCorrectionStarted { axis, error });
            return;
        }

        hw.brake();
        let wp = self.points[self.index];
        let _ = events.push(StageEvent::WaypointReached {
            index: self.index,
            x: wp.x,
            y: wp.y,
            acceptance: kind,
        });

        if self.index + 1 >= self.points.len() {
            hw.manual_mode();
            self.state = ExecState::Completed;
            let _ = events.push(StageEvent::TrajectoryCompleted);
        } else {
            self.wait_until = Some(now + self.params.pause);
            self.state = ExecState::Waiting;
        }
    }

    /// First locked axis (X before Y) whose last known error exceeds the
    /// drift threshold.
    fn drifted_locked_axis(&self) -> Option<AxisId> {
        AxisId::ALL.into_iter().find(|axis| {
            self.locks.is_locked(*axis)
                && self.axes[axis.index()]
                    .last_error_phys
                    .is_some_and(|err| err.abs() > self.params.drift_threshold)
        })
    }

    // ── Waiting ─────────────────────────────────────────────────────

    /// Hold position with no active command until the pause elapses, then
    /// advance with fresh per-waypoint state.
    fn tick_waiting(&mut self, now: Instant) {
        if self.wait_until.is_some_and(|deadline| now >= deadline) {
            self.wait_until = None;
            self.enter_waypoint(self.index + 1);
            self.state = ExecState::Moving;
        }
    }

    // ── Correcting ──────────────────────────────────────────────────

    /// Drive only the drifted axis; the other axis is commanded zero
    /// regardless of its own lock state. Exit is a simple threshold
    /// crossing (no multi-cycle counter) back into `Moving`, which then
    /// re-evaluates acceptance with fresh readings.
    fn tick_correcting(&mut self, now: Instant, hw: &mut dyn StageHardware, events: &mut EventBuf) {
        let Some(axis) = self.correcting else {
            self.state = ExecState::Moving;
            return;
        };
        let i = axis.index();
        let cfg = &self.axis_cfg[i];
        let reading = hw.read_sensor(cfg.sensor);
        let out = step_active(&mut self.axes[i], cfg, reading, now, self.params.nominal_dt);

        let mut cmd = AxisCommandPair::ZERO;
        cmd.set(axis, out.command);
        hw.send_command(cmd);

        let mut errors: [Option<f64>; 2] = [None; 2];
        errors[i] = out.error_phys;
        self.push_feedback(events, errors, cmd);

        if let Some(err) = out.error_phys {
            if err.abs() < self.params.tolerance {
                self.correcting = None;
                self.settling.reset();
                self.state = ExecState::Moving;
                let _ = events.push(StageEvent::DriftCorrectionEnded { axis });
            }
        }
    }

    // ── Feedback ────────────────────────────────────────────────────

    fn push_feedback(
        &self,
        events: &mut EventBuf,
        errors: [Option<f64>; 2],
        cmd: AxisCommandPair,
    ) {
        let wp = self.points[self.index];
        let _ = events.push(StageEvent::Feedback(TickFeedback {
            index: self.index,
            target: [wp.x, wp.y],
            error: errors,
            locks: self.locks,
            settling: self.settling.consecutive(),
            near_attempts: self.settling.near_attempts(),
            command: [cmd.x, cmd.y],
        }));
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
