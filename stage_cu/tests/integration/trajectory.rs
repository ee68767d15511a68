//! Two-point trajectory scenario: saturation on the long approach, strict
//! settle, pause, axis-locked second segment, completion.

use std::time::Duration;

use stage_common::axis::AxisId;
use stage_common::event::{AcceptanceKind, EventBuf, StageEvent};
use stage_common::trajectory::Waypoint;
use stage_cu::exec::executor::ExecState;

use super::{Harness, rig_config};

#[test]
fn two_point_trajectory_saturates_settles_and_advances() {
    let mut h = Harness::new(rig_config());
    // Carriage starts 3000 units above the first target.
    h.sim.set_position(AxisId::X, 3000.0);
    h.sim.set_position(AxisId::Y, 0.0);

    let mut events = EventBuf::new();
    h.controller
        .start_trajectory(
            vec![Waypoint::new(0.0, 0.0), Waypoint::new(1000.0, 0.0)],
            25.0,
            Duration::from_millis(100),
            &mut events,
        )
        .unwrap();
    h.absorb(&events);

    let mut saturated = false;
    let mut command_log: Vec<(u64, f64, f64)> = Vec::new();
    for _ in 0..10_000 {
        h.tick();
        let cmd = h.sim.last_command;
        command_log.push((h.tick_no, cmd.x, cmd.y));
        // Saturation invariant: no command ever exceeds u_max.
        assert!(cmd.x.abs() <= 255.0, "command {} exceeds u_max", cmd.x);
        assert!(cmd.y.abs() <= 255.0, "command {} exceeds u_max", cmd.y);
        if cmd.x.abs() == 255.0 {
            saturated = true;
        }
        if h.controller.trajectory_state() == Some(ExecState::Completed) {
            break;
        }
    }

    assert!(saturated, "long approach never hit the saturation limit");
    assert_eq!(h.controller.trajectory_state(), Some(ExecState::Completed));

    // Both waypoints accepted strictly, in order.
    let first = h.reached_at(0).expect("waypoint 0 never reached");
    let second = h.reached_at(1).expect("waypoint 1 never reached");
    assert!(first < second);
    assert!(h.has_event(|ev| matches!(
        ev,
        StageEvent::WaypointReached {
            index: 0,
            acceptance: AcceptanceKind::Settled,
            ..
        }
    )));
    assert!(h.has_event(|ev| matches!(ev, StageEvent::TrajectoryCompleted)));

    // The command right before acceptance is well off the rail: the output
    // shrank as the error shrank.
    let (_, last_x, _) = command_log
        .iter()
        .rev()
        .find(|(tick, _, _)| *tick < first)
        .copied()
        .unwrap();
    assert!(last_x.abs() < 255.0);

    // 100 ms pause at 10 ms ticks: at least 10 ticks between accepting
    // waypoint 0 and the first feedback for waypoint 1.
    let first_seg1_feedback = h
        .log
        .iter()
        .find_map(|(tick, ev)| match ev {
            StageEvent::Feedback(fb) if fb.index == 1 => Some(*tick),
            _ => None,
        })
        .expect("no feedback for waypoint 1");
    assert!(
        first_seg1_feedback >= first + 10,
        "pause too short: accepted at {first}, segment 1 started at {first_seg1_feedback}"
    );

    // Segment 0 → 1 keeps Y fixed: Y is locked and never actuated.
    for (tick, _, cmd_y) in &command_log {
        if *tick >= first_seg1_feedback && h.reached_at(1).unwrap() >= *tick {
            assert_eq!(*cmd_y, 0.0, "locked Y commanded at tick {tick}");
        }
    }
    assert!(h.has_event(|ev| matches!(
        ev,
        StageEvent::Feedback(fb) if fb.index == 1 && fb.locks.is_locked(AxisId::Y)
    )));

    // Brake on each acceptance, manual handover on completion.
    assert_eq!(h.sim.brake_count, 2);
    assert_eq!(h.sim.manual_count, 1);

    // The carriage physically arrived.
    assert!((h.sim.position(AxisId::X) - 1000.0).abs() < 30.0);
    assert!(h.sim.position(AxisId::Y).abs() < 30.0);
}
