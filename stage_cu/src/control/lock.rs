//! Axis-lock analysis for straight trajectory segments.
//!
//! When a segment holds one coordinate fixed, withholding actuation on that
//! axis keeps cross-axis coupling noise from perturbing a position that is
//! supposed to be exactly stationary.

use stage_common::axis::AxisId;
use stage_common::event::LockFlags;
use stage_common::trajectory::Waypoint;

/// Decide which axes are held idle for the segment ending at `index`.
///
/// An axis locks when its coordinate differs from the previous waypoint's
/// by less than `epsilon` (sub-resolution of the sensor). The first
/// waypoint is never locked on either axis.
pub fn analyze_locks(points: &[Waypoint], index: usize, epsilon: f64) -> LockFlags {
    if index == 0 || index >= points.len() {
        return LockFlags::empty();
    }
    let prev = points[index - 1];
    let curr = points[index];
    let mut flags = LockFlags::empty();
    for axis in AxisId::ALL {
        if (curr.coord(axis) - prev.coord(axis)).abs() < epsilon {
            flags |= LockFlags::for_axis(axis);
        }
    }
    flags
}

// ─── Tests ──────────────────────────────────────────────────────────
