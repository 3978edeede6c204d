//! Peace bond and violation types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::types::{Constraint, ConstraintType};

/// Lifecycle state of a peace bond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BondStatus {
    /// Proposed, not yet enforced
    Pending,
    /// Enforced
    Active,
    /// Temporarily not enforced
    Suspended,
    /// Ended by an operator or by expiry
    Lifted,
    /// Ended by a critical violation
    Violated,
}

impl BondStatus {
    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BondStatus::Lifted | BondStatus::Violated)
    }

    /// Whether the state machine allows moving to `next`.
    pub fn can_transition_to(&self, next: BondStatus) -> bool {
        use BondStatus::*;
        matches!(
            (self, next),
            (Pending, Active)
                | (Pending, Lifted)
                | (Active, Suspended)
                | (Active, Violated)
                | (Active, Lifted)
                | (Suspended, Active)
                | (Suspended, Violated)
                | (Suspended, Lifted)
        )
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BondStatus::Pending => "PENDING",
            BondStatus::Active => "ACTIVE",
            BondStatus::Suspended => "SUSPENDED",
            BondStatus::Lifted => "LIFTED",
            BondStatus::Violated => "VIOLATED",
        }
    }
}

impl fmt::Display for BondStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of operational constraints imposed on a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeaceBond {
    /// Unique bond ID
    pub bond_id: String,
    /// Constrained provider
    pub provider_id: String,
    /// Lifecycle state
    pub status: BondStatus,
    /// Constraints
    pub constraints: Vec<Constraint>,
    /// Why the bond was imposed
    pub reason: String,
    /// When the bond was imposed
    pub imposed_at: DateTime<Utc>,
    /// When the bond lapses; `None` means indefinite
    pub expires_at: Option<DateTime<Utc>>,
    /// Who imposed the bond
    pub imposed_by: String,
    /// Transition timestamps and reasons
    pub metadata: HashMap<String, serde_json::Value>,
}

impl PeaceBond {
    /// Whether the bond's expiry has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |at| at < now)
    }

    /// Constraints of a given type.
    pub fn constraints_of(&self, constraint_type: ConstraintType) -> impl Iterator<Item = &Constraint> {
        self.constraints
            .iter()
            .filter(move |c| c.constraint_type == constraint_type)
    }
}

/// Severity of a constraint violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    /// Within tolerance
    Minor,
    /// Significant breach
    Major,
    /// Ends the bond
    Critical,
}

impl ViolationSeverity {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationSeverity::Minor => "minor",
            ViolationSeverity::Major => "major",
            ViolationSeverity::Critical => "critical",
        }
    }
}

impl fmt::Display for ViolationSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded breach of a bond constraint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationEvent {
    /// Unique violation ID
    pub violation_id: String,
    /// Bond breached
    pub bond_id: String,
    /// Provider
    pub provider_id: String,
    /// Parameter of the breached constraint
    pub constraint_violated: String,
    /// Observed value
    pub actual_value: f64,
    /// Limit value
    pub limit_value: f64,
    /// Severity
    pub severity: ViolationSeverity,
    /// `bond_suspended` or `warning_issued`
    pub action_taken: String,
    /// When the violation was recorded
    pub recorded_at: DateTime<Utc>,
}

/// One constraint exceeded during a compliance check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstraintBreach {
    /// The constraint
    pub constraint: Constraint,
    /// Observed value
    pub actual_value: f64,
    /// Human-readable message
    pub message: String,
}

/// Result of checking a bond against reported metrics.
#[derive(Debug, Clone, Serialize)]
pub struct ComplianceCheck {
    /// Bond checked
    pub bond_id: String,
    /// True iff nothing was breached
    pub compliant: bool,
    /// Breaches found
    pub breaches: Vec<ConstraintBreach>,
}

impl ComplianceCheck {
    /// Violation messages.
    pub fn messages(&self) -> Vec<String> {
        self.breaches.iter().map(|b| b.message.clone()).collect()
    }
}

/// A bond together with its violations.
#[derive(Debug, Clone, Serialize)]
pub struct BondSummary {
    /// The bond
    pub bond: PeaceBond,
    /// Violations recorded against it
    pub violations: Vec<ViolationEvent>,
    /// Whether its expiry has passed
    pub is_expired: bool,
}

/// Bond statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BondStats {
    /// Bonds ever imposed or proposed
    pub total_bonds: usize,
    /// Bonds in the active map
    pub active: usize,
    /// Of which suspended
    pub suspended: usize,
    /// Bonds lifted
    pub lifted: usize,
    /// Bonds ended by violation
    pub violated: usize,
    /// Violations recorded
    pub total_violations: usize,
    /// Critical violations recorded
    pub critical_violations: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_machine() {
        use BondStatus::*;
        assert!(Pending.can_transition_to(Active));
        assert!(Active.can_transition_to(Suspended));
        assert!(Suspended.can_transition_to(Active));
        assert!(Active.can_transition_to(Violated));
        assert!(!Active.can_transition_to(Active));
        assert!(!Active.can_transition_to(Pending));
        assert!(!Lifted.can_transition_to(Active));
        assert!(!Violated.can_transition_to(Suspended));
        assert!(Lifted.is_terminal() && Violated.is_terminal());
    }
}
