//! Fallback acceptance with an adversarial sensor: a reading that
//! oscillates forever inside the relaxed band (but never the strict one)
//! must be accepted exactly when the attempt budget runs out.

use std::time::Duration;

use stage_common::axis::AxisId;
use stage_common::calibration::SENSOR_RAW_MAX;
use stage_common::event::{AcceptanceKind, EventBuf, StageEvent};
use stage_common::trajectory::Waypoint;
use stage_cu::exec::StageController;
use stage_cu::exec::executor::ExecState;
use stage_cu::hw::{AxisCommandPair, StageHardware};

use super::rig_config;

/// Sensor script: X flips ±50 around its target every tick (inside the
/// 25×3 fallback band, outside strict 25); Y sits exactly on target.
struct OscillatingStage {
    tick: u64,
    target_raw_x: i32,
    target_raw_y: i32,
    brakes: u32,
}

impl StageHardware for OscillatingStage {
    fn send_command(&mut self, _cmd: AxisCommandPair) {
        self.tick += 1;
    }

    fn read_sensor(&mut self, axis: AxisId) -> Option<i32> {
        match axis {
            AxisId::X => {
                let offset = if self.tick % 2 == 0 { 50 } else { -50 };
                Some(self.target_raw_x + offset)
            }
            AxisId::Y => Some(self.target_raw_y),
        }
    }

    fn brake(&mut self) {
        self.brakes += 1;
    }

    fn manual_mode(&mut self) {}
}

#[test]
fn oscillation_in_fallback_band_accepted_exactly_at_the_budget() {
    let mut config = rig_config();
    config.settling.cycles = 5;
    config.settling.max_attempts = 12;

    let target = Waypoint::new(700.0, 300.0);
    let mut hw = OscillatingStage {
        tick: 0,
        target_raw_x: (SENSOR_RAW_MAX - target.x) as i32,
        target_raw_y: (SENSOR_RAW_MAX - target.y) as i32,
        brakes: 0,
    };

    let mut controller = StageController::new(config);
    let mut events = EventBuf::new();
    controller
        .start_trajectory(vec![target], 25.0, Duration::from_millis(100), &mut events)
        .unwrap();

    let mut now = std::time::Instant::now();
    let mut accepted_on: Option<u64> = None;
    for tick in 1..=40u64 {
        events.clear();
        controller.tick(now, &mut hw, &mut events);
        now += Duration::from_millis(10);
        if events.iter().any(|ev| {
            matches!(
                ev,
                StageEvent::WaypointReached {
                    acceptance: AcceptanceKind::Fallback,
                    ..
                }
            )
        }) {
            accepted_on = Some(tick);
            break;
        }
        // Never accepted strictly: the reading is outside the strict band
        // every tick.
        assert!(
            !events
                .iter()
                .any(|ev| matches!(ev, StageEvent::WaypointReached { .. })),
            "unexpected acceptance on tick {tick}"
        );
    }

    // Exactly at max_attempts: not before, not after.
    assert_eq!(accepted_on, Some(12));
    assert_eq!(controller.trajectory_state(), Some(ExecState::Completed));
    assert_eq!(hw.brakes, 1);
}
