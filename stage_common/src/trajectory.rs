//! Trajectory waypoints in physical units.

use serde::{Deserialize, Serialize};

use crate::axis::AxisId;

/// A single trajectory waypoint.
///
/// A trajectory is an ordered, non-empty sequence of waypoints; the order
/// defines both the motion and the axis-lock comparisons, and is immutable
/// once execution starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub x: f64,
    pub y: f64,
}

impl Waypoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Coordinate of this waypoint on the given axis.
    #[inline]
    pub const fn coord(&self, axis: AxisId) -> f64 {
        match axis {
            AxisId::X => self.x,
            AxisId::Y => self.y,
        }
    }
}
