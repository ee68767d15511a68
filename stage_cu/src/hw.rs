//! Hardware access trait and the raw command pair.
//!
//! The surrounding application supplies the adapter (vendor serial link,
//! test-bench simulator); the control unit never imports hardware-specific
//! types and never blocks on I/O.

use static_assertions::const_assert_eq;

use stage_common::axis::AxisId;

/// One actuation command for both axes, in signed device units.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct AxisCommandPair {
    pub x: f64,
    pub y: f64,
}

// The adapter forwards this struct to the serial framer as-is.
const_assert_eq!(core::mem::size_of::<AxisCommandPair>(), 16);

impl AxisCommandPair {
    /// Command with both magnitudes zero.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Set the magnitude for one axis.
    #[inline]
    pub fn set(&mut self, axis: AxisId, value: f64) {
        match axis {
            AxisId::X => self.x = value,
            AxisId::Y => self.y = value,
        }
    }

    /// Magnitude for one axis.
    #[inline]
    pub fn get(&self, axis: AxisId) -> f64 {
        match axis {
            AxisId::X => self.x,
            AxisId::Y => self.y,
        }
    }
}

/// Non-blocking access to the stage hardware.
///
/// All methods are fire-and-forget accessors over a pre-existing link; none
/// may block the tick.
pub trait StageHardware {
    /// Issue a raw actuation command for both axes.
    fn send_command(&mut self, cmd: AxisCommandPair);

    /// Latest raw reading for the given sensor channel, or `None` when no
    /// fresh data is available this tick.
    fn read_sensor(&mut self, axis: AxisId) -> Option<i32>;

    /// Engage the hardware brake (settle, pause and stop entry).
    fn brake(&mut self);

    /// Return the hardware to operator control.
    fn manual_mode(&mut self);
}

// ─── Tests ──────────────────────────────────────────────────────────
