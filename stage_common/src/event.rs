//! Events emitted by the control unit, one buffer per tick.
//!
//! The legacy implementation pushed GUI signals from inside the loop; here
//! each tick fills an explicit queue the caller drains, so the core has no
//! dependency on any UI event-loop abstraction. The buffer is a fixed-size
//! `heapless::Vec`: the steady-state loop never touches the heap.

use bitflags::bitflags;

use crate::axis::AxisId;

bitflags! {
    /// Axes held idle for the current trajectory segment.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct LockFlags: u8 {
        const LOCK_X = 1 << 0;
        const LOCK_Y = 1 << 1;
    }
}

impl LockFlags {
    /// Flag bit for one axis.
    #[inline]
    pub fn for_axis(axis: AxisId) -> Self {
        match axis {
            AxisId::X => Self::LOCK_X,
            AxisId::Y => Self::LOCK_Y,
        }
    }

    #[inline]
    pub fn is_locked(&self, axis: AxisId) -> bool {
        self.contains(Self::for_axis(axis))
    }
}

/// How a waypoint or hold target was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptanceKind {
    /// Strict tolerance held for the required consecutive ticks.
    Settled,
    /// Relaxed tolerance only; the attempt budget ran out. Degraded outcome.
    Fallback,
}

/// Per-tick snapshot for UI display and after-the-fact controller audits.
#[derive(Debug, Clone, Copy)]
pub struct TickFeedback {
    /// Index of the waypoint being driven (0 for position hold).
    pub index: usize,
    /// Target position per axis [physical units].
    pub target: [f64; 2],
    /// Signed error per axis [physical units]; `None` while a sensor gap
    /// leaves the axis without a fresh reading this tick.
    pub error: [Option<f64>; 2],
    /// Axes locked for this segment.
    pub locks: LockFlags,
    /// Consecutive in-tolerance ticks so far.
    pub settling: u32,
    /// Near-target attempts consumed so far.
    pub near_attempts: u32,
    /// Commanded output per axis [device units].
    pub command: [f64; 2],
}

/// Everything the control unit reports to its caller.
#[derive(Debug, Clone, Copy)]
pub enum StageEvent {
    TrajectoryStarted { points: usize },
    TrajectoryStopped,
    TrajectoryCompleted,
    WaypointReached {
        index: usize,
        x: f64,
        y: f64,
        acceptance: AcceptanceKind,
    },
    DriftCorrectionStarted { axis: AxisId, error: f64 },
    DriftCorrectionEnded { axis: AxisId },
    HoldStarted { x: f64, y: f64 },
    HoldTargetReached { acceptance: AcceptanceKind },
    HoldStopped,
    Feedback(TickFeedback),
}

/// Per-tick event buffer. Sixteen slots covers the worst case of a single
/// tick (feedback + acceptance + transition + completion).
pub type EventBuf = heapless::Vec<StageEvent, 16>;

// ─── Tests ──────────────────────────────────────────────────────────
