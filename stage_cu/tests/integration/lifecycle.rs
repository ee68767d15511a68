//! Lifecycle edges: stop idempotence mid-move and restart afterwards.

use std::time::Duration;

use stage_common::axis::AxisId;
use stage_common::event::{EventBuf, StageEvent};
use stage_common::trajectory::Waypoint;
use stage_cu::exec::executor::ExecState;

use super::{Harness, rig_config};

#[test]
fn stop_mid_move_is_idempotent_and_restartable() {
    let mut h = Harness::new(rig_config());
    h.sim.set_position(AxisId::X, 0.0);
    h.sim.set_position(AxisId::Y, 0.0);

    let mut events = EventBuf::new();
    h.controller
        .start_trajectory(
            vec![Waypoint::new(2000.0, 1500.0)],
            25.0,
            Duration::from_millis(100),
            &mut events,
        )
        .unwrap();

    // Let it get moving, then cancel mid-flight.
    for _ in 0..50 {
        h.tick();
    }
    assert_eq!(h.controller.trajectory_state(), Some(ExecState::Moving));
    let position_at_stop = h.sim.position(AxisId::X);
    assert!(position_at_stop > 0.0);

    let mut stop_events = EventBuf::new();
    let sim = &mut h.sim;
    h.controller.stop_trajectory(sim, &mut stop_events);
    assert_eq!(h.controller.trajectory_state(), Some(ExecState::Stopped));
    assert_eq!(h.sim.brake_count, 1);
    assert_eq!(
        stop_events
            .iter()
            .filter(|ev| matches!(ev, StageEvent::TrajectoryStopped))
            .count(),
        1
    );

    // Second stop: same terminal state, no second brake, no new event.
    let sim = &mut h.sim;
    h.controller.stop_trajectory(sim, &mut stop_events);
    assert_eq!(h.controller.trajectory_state(), Some(ExecState::Stopped));
    assert_eq!(h.sim.brake_count, 1);
    assert_eq!(
        stop_events
            .iter()
            .filter(|ev| matches!(ev, StageEvent::TrajectoryStopped))
            .count(),
        1
    );

    // Ticks after stop move nothing.
    let parked = h.sim.position(AxisId::X);
    for _ in 0..20 {
        h.tick();
    }
    assert_eq!(h.sim.position(AxisId::X), parked);

    // The stopped controller accepts a fresh operation.
    let mut restart_events = EventBuf::new();
    h.controller
        .start_position_hold(parked, h.sim.position(AxisId::Y), &mut restart_events)
        .unwrap();
    assert!(h.controller.is_active());
}
