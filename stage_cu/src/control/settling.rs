//! Settling detector: consecutive in-tolerance counting with a bounded
//! near-target attempt budget.
//!
//! Distinguishes "oscillating near the target without settling" (accepted
//! at relaxed tolerance once the attempt budget runs out) from "still
//! approaching" (never penalized), so a legitimate long move cannot be cut
//! short by fallback acceptance.

/// Tolerance classification for one tick, worst case over the axes under
/// acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToleranceBand {
    /// Within the strict tolerance.
    Strict,
    /// Within the relaxed tolerance only.
    Fallback,
    /// Outside both bands.
    Out,
}

impl ToleranceBand {
    /// Fold two classifications: `Out` dominates, then `Fallback`.
    #[inline]
    pub fn worst(self, other: Self) -> Self {
        use ToleranceBand::*;
        match (self, other) {
            (Out, _) | (_, Out) => Out,
            (Fallback, _) | (_, Fallback) => Fallback,
            _ => Strict,
        }
    }
}

/// Classify an absolute error against the strict band and its relaxed
/// multiple.
#[inline]
pub fn classify(abs_error: f64, tolerance: f64, fallback_multiplier: f64) -> ToleranceBand {
    if abs_error <= tolerance {
        ToleranceBand::Strict
    } else if abs_error <= tolerance * fallback_multiplier {
        ToleranceBand::Fallback
    } else {
        ToleranceBand::Out
    }
}

/// Verdict after folding in one tick's classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleVerdict {
    /// Strict tolerance held for the required consecutive ticks.
    Converged,
    /// Attempt budget exhausted while near the target.
    FallbackAccepted,
    /// Keep driving.
    Pending,
}

/// Settling tunables, fixed for the duration of a move.
#[derive(Debug, Clone, Copy)]
pub struct SettlingParams {
    /// Consecutive strict-tolerance ticks required for convergence.
    pub cycles: u32,
    /// Near-target attempts allowed before fallback acceptance.
    pub max_attempts: u32,
}

/// Two-counter settling state for the current waypoint.
///
/// Both counters reset on entry to a new waypoint and on a drift-correction
/// cycle, and reset to zero the instant the condition they count stops
/// holding.
#[derive(Debug, Clone, Copy, Default)]
pub struct SettlingDetector {
    consecutive_in_tolerance: u32,
    near_attempts: u32,
}

impl SettlingDetector {
    /// Reset both counters.
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[inline]
    pub fn consecutive(&self) -> u32 {
        self.consecutive_in_tolerance
    }

    #[inline]
    pub fn near_attempts(&self) -> u32 {
        self.near_attempts
    }

    /// Fold one tick's classification into the counters.
    pub fn observe(&mut self, band: ToleranceBand, params: &SettlingParams) -> SettleVerdict {
        match band {
            ToleranceBand::Strict => {
                self.consecutive_in_tolerance += 1;
                self.near_attempts += 1;
                if self.consecutive_in_tolerance >= params.cycles {
                    SettleVerdict::Converged
                } else {
                    SettleVerdict::Pending
                }
            }
            ToleranceBand::Fallback => {
                self.consecutive_in_tolerance = 0;
                self.near_attempts += 1;
                if self.near_attempts >= params.max_attempts {
                    SettleVerdict::FallbackAccepted
                } else {
                    SettleVerdict::Pending
                }
            }
            ToleranceBand::Out => {
                // Still approaching: no penalty for being far away.
                self.consecutive_in_tolerance = 0;
                self.near_attempts = 0;
                SettleVerdict::Pending
            }
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
