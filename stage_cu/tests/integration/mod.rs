//! Shared fixtures: a tuned simulated rig and a manual tick harness.
//!
//! The harness advances synthetic time instead of sleeping, so scenario
//! runs of thousands of ticks finish in milliseconds.

mod drift;
mod fallback;
mod hold;
mod lifecycle;
mod trajectory;

use std::time::{Duration, Instant};

use stage_common::axis::AxisId;
use stage_common::calibration::{AxisCalibration, SENSOR_RAW_MAX};
use stage_common::config::{
    AxesConfig, AxisControllerConfig, CycleConfig, LockConfig, SettlingConfig, StageConfig,
};
use stage_common::event::{EventBuf, StageEvent};
use stage_cu::exec::StageController;
use stage_cu::sim::{SimAxisParams, SimulatedStage};

/// Bench-rig calibration: physical = 4095 − raw.
pub fn rig_calibration() -> AxisCalibration {
    AxisCalibration {
        slope: 1.0,
        intercept: SENSOR_RAW_MAX,
    }
}

/// Controller tuned for the simulated plant: hot proportional loop so the
/// relaxed-tolerance band is crossed quickly, tiny integral for bias. The
/// simulator acts in physical space while the calibration slope is
/// negative-going, hence `invert`.
pub fn rig_axis(sensor: AxisId) -> AxisControllerConfig {
    AxisControllerConfig {
        kp: 10.0,
        ki: 0.05,
        u_max: 255.0,
        invert: true,
        sensor,
        deadzone: 4.0,
        calibration: rig_calibration(),
    }
}

pub fn rig_config() -> StageConfig {
    StageConfig {
        cycle: CycleConfig {
            period_ms: 10,
            default_pause_ms: 100,
        },
        settling: SettlingConfig {
            cycles: 5,
            fallback_multiplier: 3.0,
            // Generous budget: the convergence scenarios must settle
            // strictly, not trip the fallback on the approach tail.
            max_attempts: 600,
            default_tolerance: 25.0,
        },
        lock: LockConfig {
            epsilon: 0.5,
            drift_threshold: 100.0,
        },
        axes: AxesConfig {
            x: Some(rig_axis(AxisId::X)),
            y: Some(rig_axis(AxisId::Y)),
        },
    }
}

pub fn rig_sim(config: &StageConfig) -> SimulatedStage {
    let dt = config.cycle.period_ms as f64 / 1000.0;
    SimulatedStage::new([rig_calibration(), rig_calibration()], dt)
        .with_axis_params(AxisId::X, SimAxisParams { gain: 20.0, damping: 20.0 })
        .with_axis_params(AxisId::Y, SimAxisParams { gain: 20.0, damping: 20.0 })
}

/// Manual tick harness with an event log tagged by tick number.
pub struct Harness {
    pub controller: StageController,
    pub sim: SimulatedStage,
    pub now: Instant,
    pub period: Duration,
    pub tick_no: u64,
    pub log: Vec<(u64, StageEvent)>,
}

impl Harness {
    pub fn new(config: StageConfig) -> Self {
        let sim = rig_sim(&config);
        let period = Duration::from_millis(config.cycle.period_ms);
        Self {
            controller: StageController::new(config),
            sim,
            now: Instant::now(),
            period,
            tick_no: 0,
            log: Vec::new(),
        }
    }

    /// Record lifecycle events pushed outside the tick (start calls).
    pub fn absorb(&mut self, events: &EventBuf) {
        for ev in events.iter() {
            self.log.push((self.tick_no, *ev));
        }
    }

    pub fn tick(&mut self) {
        let mut events = EventBuf::new();
        self.tick_no += 1;
        let now = self.now;
        self.controller.tick(now, &mut self.sim, &mut events);
        for ev in events.iter() {
            self.log.push((self.tick_no, *ev));
        }
        self.now += self.period;
    }

    /// Tick until `pred` holds, up to `max_ticks`. Returns whether it held.
    pub fn run_until(&mut self, max_ticks: u64, mut pred: impl FnMut(&Harness) -> bool) -> bool {
        for _ in 0..max_ticks {
            self.tick();
            if pred(self) {
                return true;
            }
        }
        false
    }

    /// Tick number of the first `WaypointReached` for the given index.
    pub fn reached_at(&self, index: usize) -> Option<u64> {
        self.log.iter().find_map(|(tick, ev)| match ev {
            StageEvent::WaypointReached { index: i, .. } if *i == index => Some(*tick),
            _ => None,
        })
    }

    pub fn has_event(&self, mut pred: impl FnMut(&StageEvent) -> bool) -> bool {
        self.log.iter().any(|(_, ev)| pred(ev))
    }
}
