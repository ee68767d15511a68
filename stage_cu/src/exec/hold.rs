//! Dual position-hold: drive both axes to fixed targets and keep them
//! there.
//!
//! The degenerate one-waypoint case of the trajectory machinery (same PI
//! law, same settling policy, same accept → brake → report transition) but
//! with no waypoint advancement: on losing settle the controller silently
//! re-activates instead of moving on.

use std::time::Instant;

use stage_common::axis::AxisId;
use stage_common::config::AxisControllerConfig;
use stage_common::event::{AcceptanceKind, EventBuf, LockFlags, StageEvent, TickFeedback};
use stage_common::trajectory::Waypoint;

use crate::control::settling::{
    SettleVerdict, SettlingDetector, SettlingParams, ToleranceBand, classify,
};
use crate::exec::axes::{AxisRuntime, retarget, step_active, step_locked};
use crate::hw::{AxisCommandPair, StageHardware};

/// Position-hold state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldState {
    /// Actively driving both axes toward the targets.
    Positioning,
    /// Targets reached and brake applied; monitoring only.
    Holding,
    /// Externally cancelled.
    Stopped,
}

/// Hold tunables, fixed at start.
#[derive(Debug, Clone, Copy)]
pub struct HoldParams {
    /// Strict tolerance [physical units].
    pub tolerance: f64,
    /// Relaxed tolerance = `tolerance × fallback_multiplier`.
    pub fallback_multiplier: f64,
    /// Settling counters.
    pub settling: SettlingParams,
    /// Nominal tick period [s].
    pub nominal_dt: f64,
}

/// Dual-axis position hold.
pub struct PositionHold {
    target: Waypoint,
    params: HoldParams,
    axis_cfg: [AxisControllerConfig; 2],
    state: HoldState,
    settling: SettlingDetector,
    axes: [AxisRuntime; 2],
}

impl PositionHold {
    pub fn new(
        target: Waypoint,
        axis_cfg: [AxisControllerConfig; 2],
        params: HoldParams,
    ) -> Self {
        let mut axes = [AxisRuntime::default(); 2];
        for axis in AxisId::ALL {
            retarget(&mut axes[axis.index()], &axis_cfg[axis.index()], target.coord(axis));
        }
        Self {
            target,
            params,
            axis_cfg,
            state: HoldState::Positioning,
            settling: SettlingDetector::default(),
            axes,
        }
    }

    #[inline]
    pub fn state(&self) -> HoldState {
        self.state
    }

    /// Whether the hold still wants ticks.
    #[inline]
    pub fn is_active(&self) -> bool {
        !matches!(self.state, HoldState::Stopped)
    }

    /// Release the hold: one brake, hardware back to the operator.
    /// Idempotent.
    pub fn stop(&mut self, hw: &mut dyn StageHardware, events: &mut EventBuf) {
        if !self.is_active() {
            return;
        }
        hw.brake();
        hw.manual_mode();
        self.state = HoldState::Stopped;
        let _ = events.push(StageEvent::HoldStopped);
    }

    /// Run one control tick.
    pub fn tick(&mut self, now: Instant, hw: &mut dyn StageHardware, events: &mut EventBuf) {
        match self.state {
            HoldState::Positioning => self.tick_positioning(now, hw, events),
            HoldState::Holding => self.tick_holding(hw, events),
            HoldState::Stopped => {}
        }
    }

    fn tick_positioning(&mut self, now: Instant, hw: &mut dyn StageHardware, events: &mut EventBuf) {
        let mut cmd = AxisCommandPair::ZERO;
        let mut errors: [Option<f64>; 2] = [None; 2];
        let mut band = ToleranceBand::Strict;
        let mut sensor_gap = false;

        for axis in AxisId::ALL {
            let i = axis.index();
            let cfg = &self.axis_cfg[i];
            let reading = hw.read_sensor(cfg.sensor);
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

        hw.send_command(cmd);

        let verdict = if sensor_gap {
            SettleVerdict::Pending
        } else {
            self.settling.observe(band, &self.params.settling)
        };

        self.push_feedback(events, errors, cmd);

        match verdict {
            SettleVerdict::Pending => {}
            SettleVerdict::Converged => self.reach(hw, events, AcceptanceKind::Settled),
            SettleVerdict::FallbackAccepted => self.reach(hw, events, AcceptanceKind::Fallback),
        }
    }

    fn reach(&mut self, hw: &mut dyn StageHardware, events: &mut EventBuf, kind: AcceptanceKind) {
        hw.brake();
        self.state = HoldState::Holding;
        let _ = events.push(StageEvent::HoldTargetReached { acceptance: kind });
    }

    /// Monitor the braked stage. Any excursion past the strict tolerance
    /// silently re-engages control: no event, the operator only sees
    /// commands resume in the feedback stream.
    fn tick_holding(&mut self, hw: &mut dyn StageHardware, events: &mut EventBuf) {
        let mut errors: [Option<f64>; 2] = [None; 2];
        let mut excursion = false;

        for axis in AxisId::ALL {
            let i = axis.index();
            let cfg = &self.axis_cfg[i];
            let reading = hw.read_sensor(cfg.sensor);
            let err = step_locked(&mut self.axes[i], cfg, reading);
            errors[i] = err;
            if err.is_some_and(|e| e.abs() > self.params.tolerance) {
                excursion = true;
            }
        }

        self.push_feedback(events, errors, AxisCommandPair::ZERO);

        if excursion {
            self.settling.reset();
            for axis in AxisId::ALL {
                let rt = &mut self.axes[axis.index()];
                rt.pi.reset();
                rt.last_update = None;
            }
            self.state = HoldState::Positioning;
        }
    }

    fn push_feedback(&self, events: &mut EventBuf, errors: [Option<f64>; 2], cmd: AxisCommandPair) {
        let _ = events.push(StageEvent::Feedback(TickFeedback {
            index: 0,
            target: [self.target.x, self.target.y],
            error: errors,
            locks: LockFlags::empty(),
            settling: self.settling.consecutive(),
            near_attempts: self.settling.near_attempts(),
            command: [cmd.x, cmd.y],
        }));
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
