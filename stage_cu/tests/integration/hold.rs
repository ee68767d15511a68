//! Position-hold scenario: reach, brake, get disturbed, silently resume,
//! reach again.

use stage_common::axis::AxisId;
use stage_common::event::{EventBuf, StageEvent};
use stage_cu::exec::hold::HoldState;

use super::{Harness, rig_config};

#[test]
fn hold_reaches_and_recovers_from_disturbance() {
    let mut h = Harness::new(rig_config());
    h.sim.set_position(AxisId::X, 0.0);
    h.sim.set_position(AxisId::Y, 0.0);

    let mut events = EventBuf::new();
    h.controller
        .start_position_hold(800.0, 600.0, &mut events)
        .unwrap();
    h.absorb(&events);

    assert!(h.run_until(5_000, |h| {
        h.controller.hold_state() == Some(HoldState::Holding)
    }));
    assert_eq!(h.sim.brake_count, 1);
    assert!((h.sim.position(AxisId::X) - 800.0).abs() < 30.0);
    assert!((h.sim.position(AxisId::Y) - 600.0).abs() < 30.0);

    // Disturb X past the hold tolerance (default 25): control resumes
    // without any stop/hold lifecycle event, then the target is re-acquired
    // and the brake re-engages.
    let reached_events_before = h
        .log
        .iter()
        .filter(|(_, ev)| matches!(ev, StageEvent::HoldTargetReached { .. }))
        .count();
    h.sim.displace(AxisId::X, 60.0);

    assert!(h.run_until(10, |h| {
        h.controller.hold_state() == Some(HoldState::Positioning)
    }));
    assert!(!h.has_event(|ev| matches!(ev, StageEvent::HoldStopped)));

    assert!(h.run_until(2_000, |h| {
        h.controller.hold_state() == Some(HoldState::Holding)
    }));
    assert_eq!(h.sim.brake_count, 2);
    let reached_events_after = h
        .log
        .iter()
        .filter(|(_, ev)| matches!(ev, StageEvent::HoldTargetReached { .. }))
        .count();
    assert_eq!(reached_events_after, reached_events_before + 1);

    // The hold never completes on its own; only an explicit stop ends it.
    assert!(h.controller.is_active());
    let mut stop_events = EventBuf::new();
    let sim = &mut h.sim;
    h.controller.stop_position_hold(sim, &mut stop_events);
    assert!(!h.controller.is_active());
    assert_eq!(h.sim.brake_count, 3);
    assert_eq!(h.sim.manual_count, 1);
    assert!(
        stop_events
            .iter()
            .any(|ev| matches!(ev, StageEvent::HoldStopped))
    );
}
