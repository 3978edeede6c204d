//! Turning an audit score into a compliance level.

use crate::audit::types::ComplianceLevel;

/// Maps an audit's score and findings to a compliance level.
pub trait ComplianceClassifier: Send + Sync {
    /// Name of the classifier.
    fn name(&self) -> &str;

    /// Classify a score in [0, 100] together with its findings.
    fn classify(&self, score: f64, findings: &[String]) -> ComplianceLevel;
}

/// Fixed score bands: at or above `compliant_min` is compliant, at or above
/// `partial_min` is partially compliant, anything lower is non-compliant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBandClassifier {
    pub compliant_min: f64,
    pub partial_min: f64,
}

impl Default for ScoreBandClassifier {
    fn default() -> Self {
        Self {
            compliant_min: 80.0,
            partial_min: 60.0,
        }
    }
}

impl ComplianceClassifier for ScoreBandClassifier {
    fn name(&self) -> &str {
        "score_band"
    }

    fn classify(&self, score: f64, _findings: &[String]) -> ComplianceLevel {
        if score >= self.compliant_min {
            ComplianceLevel::Compliant
        } else if score >= self.partial_min {
            ComplianceLevel::PartiallyCompliant
        } else {
            ComplianceLevel::NonCompliant
        }
    }
}
