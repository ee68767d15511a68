//! Linear sensor calibration: raw ADC counts ↔ physical position.
//!
//! The map is `physical = intercept − raw · |slope|`; the inverse clamps to
//! the valid ADC range. Both directions are pure and total. Callers are
//! responsible for passing sane raw ranges.

use serde::{Deserialize, Serialize};

/// Highest raw value the position ADC can report (12-bit).
pub const SENSOR_RAW_MAX: f64 = 4095.0;

/// Per-axis linear transform between raw sensor counts and physical units.
///
/// Produced by the external calibration procedure; immutable per session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AxisCalibration {
    /// Physical units per raw count. Only the magnitude is used.
    pub slope: f64,
    /// Physical position corresponding to a raw reading of zero.
    pub intercept: f64,
}

impl AxisCalibration {
    /// Physical position for a raw sensor reading.
    #[inline]
    pub fn to_physical(&self, raw: f64) -> f64 {
        self.intercept - raw * self.slope.abs()
    }

    /// Raw sensor value for a physical position, clamped to the ADC range.
    #[inline]
    pub fn to_raw(&self, physical: f64) -> f64 {
        let slope = self.slope.abs();
        if slope == 0.0 {
            // Degenerate map. Config validation rejects it before use.
            return 0.0;
        }
        ((self.intercept - physical) / slope).clamp(0.0, SENSOR_RAW_MAX)
    }

    /// Physical units per raw count.
    #[inline]
    pub fn scale(&self) -> f64 {
        self.slope.abs()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
