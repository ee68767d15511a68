//! Locked-axis drift scenario: X is constant across the segment, simulated
//! cross-talk shoves it past the drift threshold while Y drives, and the
//! correction sub-state pulls X back (alone) before the waypoint is
//! accepted.

use std::time::Duration;

use stage_common::axis::AxisId;
use stage_common::event::{EventBuf, StageEvent};
use stage_common::trajectory::Waypoint;
use stage_cu::exec::executor::ExecState;

use super::{Harness, rig_config};

#[test]
fn drifted_locked_axis_is_corrected_alone_before_acceptance() {
    let mut h = Harness::new(rig_config());
    h.sim.set_position(AxisId::X, 200.0);
    h.sim.set_position(AxisId::Y, 100.0);

    let mut events = EventBuf::new();
    h.controller
        .start_trajectory(
            vec![Waypoint::new(200.0, 100.0), Waypoint::new(200.0, 1100.0)],
            25.0,
            Duration::from_millis(100),
            &mut events,
        )
        .unwrap();
    h.absorb(&events);

    // Waypoint 0 is already under the carriage; wait out settle + pause
    // until segment 1 begins.
    assert!(h.run_until(200, |h| {
        h.controller.trajectory_state() == Some(ExecState::Moving) && h.reached_at(0).is_some()
    }));

    // Cross-talk: X (locked for this segment) gets shoved 150 units off
    // while Y is still driving.
    h.sim.displace(AxisId::X, 150.0);

    // No correction while the move is in progress; it fires at the
    // acceptance edge.
    let mut correcting_ticks: Vec<(f64, f64)> = Vec::new();
    let completed = h.run_until(10_000, |h| {
        h.controller.trajectory_state() == Some(ExecState::Completed)
    });
    assert!(completed, "trajectory never completed");

    let correction_started = h
        .log
        .iter()
        .find_map(|(tick, ev)| match ev {
            StageEvent::DriftCorrectionStarted { axis, error } => Some((*tick, *axis, *error)),
            _ => None,
        })
        .expect("drift correction never started");
    assert_eq!(correction_started.1, AxisId::X);
    assert!(correction_started.2.abs() > 100.0);

    let correction_ended = h
        .log
        .iter()
        .find_map(|(tick, ev)| match ev {
            StageEvent::DriftCorrectionEnded { axis: AxisId::X } => Some(*tick),
            _ => None,
        })
        .expect("drift correction never ended");
    let accepted = h.reached_at(1).expect("waypoint 1 never accepted");
    assert!(
        correction_started.0 < correction_ended && correction_ended < accepted,
        "expected correct → recover → accept ordering"
    );

    // Exactly one correction episode, restricted to X.
    let started_count = h
        .log
        .iter()
        .filter(|(_, ev)| matches!(ev, StageEvent::DriftCorrectionStarted { .. }))
        .count();
    assert_eq!(started_count, 1);

    // During correction only X is driven; Y is forced to zero even though
    // it is the unlocked axis of the segment.
    for (tick, ev) in &h.log {
        if *tick > correction_started.0 && *tick < correction_ended {
            if let StageEvent::Feedback(fb) = ev {
                correcting_ticks.push((fb.command[0], fb.command[1]));
            }
        }
    }
    assert!(!correcting_ticks.is_empty());
    assert!(correcting_ticks.iter().any(|(x, _)| *x != 0.0));
    assert!(correcting_ticks.iter().all(|(_, y)| *y == 0.0));

    // X ends up back inside the strict band.
    assert!((h.sim.position(AxisId::X) - 200.0).abs() < 30.0);
    assert!((h.sim.position(AxisId::Y) - 1100.0).abs() < 30.0);
}
