//! Feedback tuning for the symbiosis threshold.
//!
//! Operators report how escalated risks turned out. The adjustment is a pure
//! function of the current threshold and that feedback; applying the result
//! is left to the caller.

use serde::{Deserialize, Serialize};

/// Outcome counts for risks escalated since the last adjustment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdFeedback {
    /// Escalations that reflected a real problem
    pub confirmed: u32,
    /// Escalations that turned out to be noise
    pub false_positives: u32,
}

impl ThresholdFeedback {
    /// Share of escalations that were false positives, if any were reported.
    pub fn false_positive_rate(&self) -> Option<f64> {
        let total = self.confirmed + self.false_positives;
        if total == 0 {
            None
        } else {
            Some(self.false_positives as f64 / total as f64)
        }
    }
}

/// Limits for threshold adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentBounds {
    /// Lowest threshold allowed
    pub min: f64,
    /// Highest threshold allowed
    pub max: f64,
    /// Change applied per adjustment
    pub step: f64,
    /// False-positive rate above which the threshold is relaxed
    pub relax_above: f64,
    /// False-positive rate below which the threshold is tightened
    pub tighten_below: f64,
}

impl Default for AdjustmentBounds {
    fn default() -> Self {
        Self {
            min: 0.5,
            max: 0.95,
            step: 0.01,
            relax_above: 0.5,
            tighten_below: 0.1,
        }
    }
}

/// Compute the next symbiosis threshold.
///
/// Too many false positives lower the threshold, very few raise it. The
/// result always lies within `[bounds.min, bounds.max]`.
pub fn adjust_symbiosis_threshold(
    current: f64,
    feedback: &ThresholdFeedback,
    bounds: &AdjustmentBounds,
) -> f64 {
    let next = match feedback.false_positive_rate() {
        Some(rate) if rate > bounds.relax_above => current - bounds.step,
        Some(rate) if rate < bounds.tighten_below => current + bounds.step,
        _ => current,
    };
    next.clamp(bounds.min, bounds.max)
}
