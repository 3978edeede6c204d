//! Peace bonds manager - imposes, tracks and enforces bonds.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::bonds::types::{
    BondStats, BondStatus, BondSummary, ComplianceCheck, ConstraintBreach, PeaceBond,
    ViolationEvent, ViolationSeverity,
};
use crate::clock::{add_hours, Clock, SystemClock, MAX_DURATION_HOURS};
use crate::config::BondsConfig;
use crate::event_log::EventLog;
use crate::types::{Constraint, GovernanceError, Result};

#[derive(Default)]
struct BondState {
    active: HashMap<String, PeaceBond>,
    history: Vec<PeaceBond>,
    history_index: HashMap<String, usize>,
    violations: Vec<ViolationEvent>,
}

impl BondState {
    fn insert(&mut self, bond: PeaceBond) {
        self.history_index
            .insert(bond.bond_id.clone(), self.history.len());
        self.history.push(bond.clone());
        self.active.insert(bond.bond_id.clone(), bond);
    }

    fn find(&self, bond_id: &str) -> Option<&PeaceBond> {
        self.active.get(bond_id).or_else(|| {
            self.history_index
                .get(bond_id)
                .and_then(|&i| self.history.get(i))
        })
    }

    /// Apply a status change to both the active map and history. Terminal
    /// bonds leave the active map.
    fn set_status(
        &mut self,
        bond_id: &str,
        status: BondStatus,
        stamp_key: &str,
        now: DateTime<Utc>,
        note: Option<(&str, &str)>,
    ) -> Option<PeaceBond> {
        let &index = self.history_index.get(bond_id)?;
        let bond = self.history.get_mut(index)?;
        bond.status = status;
        bond.metadata
            .insert(stamp_key.to_string(), serde_json::json!(now.to_rfc3339()));
        if let Some((key, value)) = note {
            bond.metadata.insert(key.to_string(), serde_json::json!(value));
        }
        let updated = bond.clone();

        if status.is_terminal() {
            self.active.remove(bond_id);
        } else {
            self.active.insert(bond_id.to_string(), updated.clone());
        }
        Some(updated)
    }
}

/// Owns every peace bond and violation.
pub struct PeaceBondsManager {
    config: BondsConfig,
    state: Arc<RwLock<BondState>>,
    clock: Arc<dyn Clock>,
    log: EventLog,
}

impl PeaceBondsManager {
    /// Create a new manager with default configuration.
    pub fn new() -> Self {
        Self::with_config(BondsConfig::default())
    }

    /// Create with custom configuration.
    pub fn with_config(config: BondsConfig) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(BondState::default())),
            clock: Arc::new(SystemClock),
            log: EventLog::disabled(),
        }
    }

    /// Set the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set the event log.
    pub fn with_event_log(mut self, log: EventLog) -> Self {
        self.log = log;
        self
    }

    /// Impose an active bond.
    pub async fn impose_bond(
        &self,
        provider_id: &str,
        constraints: Vec<Constraint>,
        reason: &str,
        imposed_by: &str,
        duration_hours: Option<f64>,
    ) -> Result<PeaceBond> {
        self.create(provider_id, constraints, reason, imposed_by, duration_hours, BondStatus::Active)
            .await
    }

    /// Propose a bond that takes effect once activated.
    pub async fn propose_bond(
        &self,
        provider_id: &str,
        constraints: Vec<Constraint>,
        reason: &str,
        imposed_by: &str,
        duration_hours: Option<f64>,
    ) -> Result<PeaceBond> {
        self.create(provider_id, constraints, reason, imposed_by, duration_hours, BondStatus::Pending)
            .await
    }

    async fn create(
        &self,
        provider_id: &str,
        constraints: Vec<Constraint>,
        reason: &str,
        imposed_by: &str,
        duration_hours: Option<f64>,
        status: BondStatus,
    ) -> Result<PeaceBond> {
        if provider_id.trim().is_empty() {
            return Err(GovernanceError::InvalidInput(
                "bond requires a provider_id".to_string(),
            ));
        }
        if let Some(h) = duration_hours {
            if !h.is_finite() || !(0.0..=MAX_DURATION_HOURS).contains(&h) {
                return Err(GovernanceError::InvalidInput(format!(
                    "bond duration must be between 0 and {} hours, got {}",
                    MAX_DURATION_HOURS, h
                )));
            }
        }
        if let Some(c) = constraints.iter().find(|c| !c.limit_value.is_finite()) {
            return Err(GovernanceError::InvalidInput(format!(
                "constraint {} has a non-finite limit",
                c.parameter
            )));
        }

        let now = self.clock.now();
        let expires_at = match duration_hours {
            Some(h) => Some(add_hours(now, h).ok_or_else(|| {
                GovernanceError::InvalidInput(format!(
                    "bond duration of {} hours overflows the calendar",
                    h
                ))
            })?),
            None => None,
        };
        let bond = PeaceBond {
            bond_id: format!("bond-{}", uuid::Uuid::new_v4()),
            provider_id: provider_id.to_string(),
            status,
            constraints,
            reason: reason.to_string(),
            imposed_at: now,
            expires_at,
            imposed_by: imposed_by.to_string(),
            metadata: HashMap::new(),
        };

        self.state.write().await.insert(bond.clone());

        info!(
            bond_id = %bond.bond_id,
            provider_id = %bond.provider_id,
            status = %bond.status,
            constraints = bond.constraints.len(),
            expires_at = ?bond.expires_at,
            "Peace bond created"
        );
        self.log.record(now, "bond_imposed", &bond).await;

        Ok(bond)
    }

    /// Check a bond's numeric constraints against observed values.
    ///
    /// Only throughput, latency and cost constraints whose parameter appears
    /// in `actual_values` are checked; exceeding the limit (strictly) is a
    /// breach.
    pub async fn check_compliance(
        &self,
        bond_id: &str,
        actual_values: &HashMap<String, f64>,
    ) -> Result<ComplianceCheck> {
        let state = self.state.read().await;
        let bond = state
            .find(bond_id)
            .ok_or_else(|| GovernanceError::not_found("bond", bond_id))?;

        let breaches: Vec<ConstraintBreach> = bond
            .constraints
            .iter()
            .filter(|c| c.constraint_type.is_numeric())
            .filter_map(|c| {
                let actual = *actual_values.get(&c.parameter)?;
                (actual > c.limit_value).then(|| ConstraintBreach {
                    message: format!(
                        "{} exceeded: {} = {} > limit {} {}",
                        c.constraint_type,
                        c.parameter,
                        actual,
                        c.limit_value,
                        c.unit
                    ),
                    constraint: c.clone(),
                    actual_value: actual,
                })
            })
            .collect();

        debug!(
            bond_id = %bond_id,
            breaches = breaches.len(),
            "Bond compliance checked"
        );

        Ok(ComplianceCheck {
            bond_id: bond_id.to_string(),
            compliant: breaches.is_empty(),
            breaches,
        })
    }

    /// Severity of a breach from its actual/limit ratio.
    pub fn severity_for(&self, actual: f64, limit: f64) -> ViolationSeverity {
        if limit <= 0.0 {
            return ViolationSeverity::Critical;
        }
        let ratio = actual / limit;
        if ratio >= self.config.critical_ratio {
            ViolationSeverity::Critical
        } else if ratio >= self.config.major_ratio {
            ViolationSeverity::Major
        } else {
            ViolationSeverity::Minor
        }
    }

    /// Record a violation of a bond.
    ///
    /// A critical violation moves the bond to VIOLATED; minor and major ones
    /// only issue a warning.
    pub async fn record_violation(
        &self,
        bond_id: &str,
        constraint_violated: &str,
        actual_value: f64,
        limit_value: f64,
        severity: ViolationSeverity,
    ) -> Result<ViolationEvent> {
        let now = self.clock.now();
        let violation = {
            let mut state = self.state.write().await;
            let provider_id = state
                .find(bond_id)
                .map(|b| b.provider_id.clone())
                .ok_or_else(|| GovernanceError::not_found("bond", bond_id))?;

            let action_taken = if severity == ViolationSeverity::Critical {
                state.set_status(
                    bond_id,
                    BondStatus::Violated,
                    "violated_at",
                    now,
                    Some(("violation_reason", constraint_violated)),
                );
                "bond_suspended"
            } else {
                "warning_issued"
            };

            let violation = ViolationEvent {
                violation_id: format!("viol-{}", uuid::Uuid::new_v4()),
                bond_id: bond_id.to_string(),
                provider_id,
                constraint_violated: constraint_violated.to_string(),
                actual_value,
                limit_value,
                severity,
                action_taken: action_taken.to_string(),
                recorded_at: now,
            };
            state.violations.push(violation.clone());
            violation
        };

        warn!(
            violation_id = %violation.violation_id,
            bond_id = %bond_id,
            provider_id = %violation.provider_id,
            constraint = %constraint_violated,
            actual_value,
            limit_value,
            severity = %severity,
            action_taken = %violation.action_taken,
            "Bond violation recorded"
        );
        self.log.record(now, "violation_recorded", &violation).await;

        Ok(violation)
    }

    /// Activate a pending bond.
    pub async fn activate_bond(&self, bond_id: &str) -> bool {
        self.transition(bond_id, BondStatus::Pending, BondStatus::Active, "activated_at", None)
            .await
    }

    /// Lift a bond; it leaves the active map but stays in history.
    pub async fn lift_bond(&self, bond_id: &str, reason: &str) -> bool {
        let Some(current) = self.current_status(bond_id).await else {
            return false;
        };
        self.transition(bond_id, current, BondStatus::Lifted, "lifted_at", Some(("lift_reason", reason)))
            .await
    }

    /// Suspend an active bond.
    pub async fn suspend_bond(&self, bond_id: &str, reason: &str) -> bool {
        self.transition(
            bond_id,
            BondStatus::Active,
            BondStatus::Suspended,
            "suspended_at",
            Some(("suspend_reason", reason)),
        )
        .await
    }

    /// Reactivate a suspended bond.
    pub async fn reactivate_bond(&self, bond_id: &str) -> bool {
        self.transition(bond_id, BondStatus::Suspended, BondStatus::Active, "reactivated_at", None)
            .await
    }

    async fn current_status(&self, bond_id: &str) -> Option<BondStatus> {
        self.state.read().await.active.get(bond_id).map(|b| b.status)
    }

    /// Move a bond from `from` to `to`. Fails if the bond is not currently in
    /// `from` or the state machine forbids the move.
    async fn transition(
        &self,
        bond_id: &str,
        from: BondStatus,
        to: BondStatus,
        stamp_key: &str,
        note: Option<(&str, &str)>,
    ) -> bool {
        let now = self.clock.now();
        let updated = {
            let mut state = self.state.write().await;
            let Some(current) = state.active.get(bond_id).map(|b| b.status) else {
                debug!(bond_id = %bond_id, to = %to, "Transition requested for unknown or closed bond");
                return false;
            };
            if current != from || !current.can_transition_to(to) {
                debug!(bond_id = %bond_id, from = %current, to = %to, "Rejected bond transition");
                return false;
            }
            state.set_status(bond_id, to, stamp_key, now, note)
        };

        match updated {
            Some(bond) => {
                info!(
                    bond_id = %bond_id,
                    provider_id = %bond.provider_id,
                    status = %bond.status,
                    "Peace bond status changed"
                );
                self.log.record(now, "bond_status_changed", &bond).await;
                true
            }
            None => false,
        }
    }

    /// Lift every active bond whose expiry has passed.
    ///
    /// Returns the number lifted; a second call without time passing lifts
    /// nothing.
    pub async fn cleanup_expired_bonds(&self) -> usize {
        let now = self.clock.now();
        let lifted: Vec<PeaceBond> = {
            let mut state = self.state.write().await;
            let mut expired: Vec<String> = state
                .active
                .values()
                .filter(|b| b.is_expired(now))
                .map(|b| b.bond_id.clone())
                .collect();
            expired.sort();

            expired
                .iter()
                .filter_map(|id| {
                    state.set_status(id, BondStatus::Lifted, "lifted_at", now, Some(("lift_reason", "expired")))
                })
                .collect()
        };

        for bond in &lifted {
            info!(
                bond_id = %bond.bond_id,
                provider_id = %bond.provider_id,
                "Expired peace bond lifted"
            );
            self.log.record(now, "bond_expired", bond).await;
        }

        lifted.len()
    }

    /// Get a bond from the active map or history.
    pub async fn get_bond(&self, bond_id: &str) -> Option<PeaceBond> {
        self.state.read().await.find(bond_id).cloned()
    }

    /// Non-terminal bonds, oldest first, optionally for one provider.
    pub async fn active_bonds(&self, provider_id: Option<&str>) -> Vec<PeaceBond> {
        let state = self.state.read().await;
        let mut bonds: Vec<PeaceBond> = state
            .active
            .values()
            .filter(|b| provider_id.map_or(true, |p| b.provider_id == p))
            .cloned()
            .collect();
        bonds.sort_by(|a, b| a.imposed_at.cmp(&b.imposed_at).then(a.bond_id.cmp(&b.bond_id)));
        bonds
    }

    /// Every bond ever created, in creation order.
    pub async fn bond_history(&self, provider_id: Option<&str>) -> Vec<PeaceBond> {
        let state = self.state.read().await;
        state
            .history
            .iter()
            .filter(|b| provider_id.map_or(true, |p| b.provider_id == p))
            .cloned()
            .collect()
    }

    /// Violations, optionally for one bond.
    pub async fn violations(&self, bond_id: Option<&str>) -> Vec<ViolationEvent> {
        let state = self.state.read().await;
        state
            .violations
            .iter()
            .filter(|v| bond_id.map_or(true, |id| v.bond_id == id))
            .cloned()
            .collect()
    }

    /// A bond with its violations and expiry flag.
    pub async fn bond_summary(&self, bond_id: &str) -> Result<BondSummary> {
        let now = self.clock.now();
        let state = self.state.read().await;
        let bond = state
            .find(bond_id)
            .cloned()
            .ok_or_else(|| GovernanceError::not_found("bond", bond_id))?;
        Ok(BondSummary {
            is_expired: bond.is_expired(now),
            violations: state
                .violations
                .iter()
                .filter(|v| v.bond_id == bond_id)
                .cloned()
                .collect(),
            bond,
        })
    }

    /// Summaries of every non-terminal bond.
    pub async fn active_bond_summaries(&self) -> Vec<BondSummary> {
        let now = self.clock.now();
        let bonds = self.active_bonds(None).await;
        let state = self.state.read().await;
        bonds
            .into_iter()
            .map(|bond| BondSummary {
                is_expired: bond.is_expired(now),
                violations: state
                    .violations
                    .iter()
                    .filter(|v| v.bond_id == bond.bond_id)
                    .cloned()
                    .collect(),
                bond,
            })
            .collect()
    }

    /// Get statistics.
    pub async fn stats(&self) -> BondStats {
        let state = self.state.read().await;
        BondStats {
            total_bonds: state.history.len(),
            active: state.active.len(),
            suspended: state
                .active
                .values()
                .filter(|b| b.status == BondStatus::Suspended)
                .count(),
            lifted: state
                .history
                .iter()
                .filter(|b| b.status == BondStatus::Lifted)
                .count(),
            violated: state
                .history
                .iter()
                .filter(|b| b.status == BondStatus::Violated)
                .count(),
            total_violations: state.violations.len(),
            critical_violations: state
                .violations
                .iter()
                .filter(|v| v.severity == ViolationSeverity::Critical)
                .count(),
        }
    }
}

impl Default for PeaceBondsManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::types::{ConstraintType, EnforcementMethod};

    fn manager() -> (PeaceBondsManager, ManualClock) {
        let clock = ManualClock::starting_now();
        let manager = PeaceBondsManager::new().with_clock(Arc::new(clock.clone()));
        (manager, clock)
    }

    fn constraints() -> Vec<Constraint> {
        vec![
            Constraint::hard(ConstraintType::ThroughputLimit, "throughput_ops_sec", 1000.0, "ops/sec"),
            Constraint::hard(ConstraintType::LatencyCeiling, "latency_ms", 100.0, "ms"),
            Constraint::hard(ConstraintType::CostCeiling, "cost_per_op", 0.05, "per_op"),
            Constraint {
                enforcement_method: EnforcementMethod::Audit,
                ..Constraint::hard(ConstraintType::MetadataDisclosure, "metadata_disclosure", 1.0, "flag")
            },
        ]
    }

    fn values(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[tokio::test]
    async fn test_impose_bond() {
        let (manager, clock) = manager();
        let bond = manager
            .impose_bond("P1", constraints(), "symbiosis decline", "tester", Some(24.0))
            .await
            .unwrap();

        assert_eq!(bond.status, BondStatus::Active);
        assert_eq!(bond.expires_at, Some(clock.now() + chrono::Duration::hours(24)));
        assert_eq!(manager.active_bonds(Some("P1")).await.len(), 1);
        assert_eq!(manager.bond_history(None).await.len(), 1);

        assert!(manager
            .impose_bond("P1", vec![], "bad", "tester", Some(-1.0))
            .await
            .is_err());
        assert!(manager.impose_bond("", vec![], "bad", "tester", None).await.is_err());
    }

    #[tokio::test]
    async fn test_huge_duration_rejected() {
        let (manager, _) = manager();
        let result = manager
            .impose_bond("P1", vec![], "r", "t", Some(1e12))
            .await;
        assert!(matches!(result, Err(GovernanceError::InvalidInput(_))));
        assert!(manager.bond_history(None).await.is_empty());

        let longest = manager
            .impose_bond("P1", vec![], "r", "t", Some(MAX_DURATION_HOURS))
            .await
            .unwrap();
        assert!(longest.expires_at.is_some());
    }

    #[tokio::test]
    async fn test_compliance_strict_greater_than() {
        let (manager, _) = manager();
        let bond = manager
            .impose_bond("P1", constraints(), "test", "tester", None)
            .await
            .unwrap();

        // At the limit is compliant.
        let check = manager
            .check_compliance(&bond.bond_id, &values(&[("throughput_ops_sec", 1000.0), ("latency_ms", 100.0)]))
            .await
            .unwrap();
        assert!(check.compliant);
        assert!(check.messages().is_empty());

        let check = manager
            .check_compliance(
                &bond.bond_id,
                &values(&[("throughput_ops_sec", 1200.0), ("latency_ms", 90.0), ("cost_per_op", 0.06)]),
            )
            .await
            .unwrap();
        assert!(!check.compliant);
        assert_eq!(check.breaches.len(), 2);
        assert!(check.messages()[0].contains("THROUGHPUT_LIMIT"));
    }

    #[tokio::test]
    async fn test_compliance_skips_missing_and_non_numeric() {
        let (manager, _) = manager();
        let bond = manager
            .impose_bond("P1", constraints(), "test", "tester", None)
            .await
            .unwrap();

        // metadata_disclosure is never numerically checked.
        let check = manager
            .check_compliance(&bond.bond_id, &values(&[("metadata_disclosure", 5.0)]))
            .await
            .unwrap();
        assert!(check.compliant);

        let check = manager.check_compliance(&bond.bond_id, &HashMap::new()).await.unwrap();
        assert!(check.compliant);

        assert!(matches!(
            manager.check_compliance("missing", &HashMap::new()).await,
            Err(GovernanceError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_minor_and_major_violations_keep_status() {
        let (manager, _) = manager();
        let bond = manager
            .impose_bond("P1", constraints(), "test", "tester", None)
            .await
            .unwrap();

        for severity in [ViolationSeverity::Minor, ViolationSeverity::Major] {
            let violation = manager
                .record_violation(&bond.bond_id, "throughput_ops_sec", 1100.0, 1000.0, severity)
                .await
                .unwrap();
            assert_eq!(violation.action_taken, "warning_issued");
        }

        let bond = manager.get_bond(&bond.bond_id).await.unwrap();
        assert_eq!(bond.status, BondStatus::Active);
        assert_eq!(manager.violations(Some(&bond.bond_id)).await.len(), 2);
    }

    #[tokio::test]
    async fn test_critical_violation_ends_bond() {
        let (manager, _) = manager();
        let bond = manager
            .impose_bond("P1", constraints(), "test", "tester", None)
            .await
            .unwrap();
        manager.suspend_bond(&bond.bond_id, "maintenance").await;

        let violation = manager
            .record_violation(&bond.bond_id, "latency_ms", 400.0, 100.0, ViolationSeverity::Critical)
            .await
            .unwrap();
        assert_eq!(violation.action_taken, "bond_suspended");

        let stored = manager.get_bond(&bond.bond_id).await.unwrap();
        assert_eq!(stored.status, BondStatus::Violated);
        assert!(manager.active_bonds(None).await.is_empty());
        assert_eq!(manager.bond_history(Some("P1")).await.len(), 1);

        // A new bond can still be imposed on the provider.
        assert!(manager.impose_bond("P1", vec![], "again", "tester", None).await.is_ok());

        assert!(manager
            .record_violation("missing", "latency_ms", 1.0, 0.5, ViolationSeverity::Minor)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_suspend_reactivate_lift() {
        let (manager, _) = manager();
        let bond = manager
            .impose_bond("P1", constraints(), "test", "tester", None)
            .await
            .unwrap();
        let id = bond.bond_id.as_str();

        assert!(!manager.reactivate_bond(id).await);
        assert!(manager.suspend_bond(id, "review").await);
        assert!(!manager.suspend_bond(id, "review").await);
        assert!(manager.reactivate_bond(id).await);

        let bond = manager.get_bond(id).await.unwrap();
        assert_eq!(bond.status, BondStatus::Active);
        assert!(bond.metadata.contains_key("suspended_at"));
        assert!(bond.metadata.contains_key("reactivated_at"));

        assert!(manager.lift_bond(id, "resolved").await);
        assert!(!manager.lift_bond(id, "resolved").await);
        assert!(!manager.reactivate_bond(id).await);
        assert!(!manager.lift_bond("missing", "x").await);

        let bond = manager.get_bond(id).await.unwrap();
        assert_eq!(bond.status, BondStatus::Lifted);
        assert_eq!(bond.metadata["lift_reason"], "resolved");
    }

    #[tokio::test]
    async fn test_pending_bond_activation() {
        let (manager, _) = manager();
        let bond = manager
            .propose_bond("P1", constraints(), "test", "tester", None)
            .await
            .unwrap();
        assert_eq!(bond.status, BondStatus::Pending);
        assert!(!manager.reactivate_bond(&bond.bond_id).await);
        assert!(manager.activate_bond(&bond.bond_id).await);
        assert!(!manager.activate_bond(&bond.bond_id).await);
    }

    #[tokio::test]
    async fn test_zero_duration_bond_expires() {
        let (manager, clock) = manager();
        let bond = manager
            .impose_bond("P1", constraints(), "test", "tester", Some(0.0))
            .await
            .unwrap();
        let indefinite = manager
            .impose_bond("P2", constraints(), "test", "tester", None)
            .await
            .unwrap();

        clock.advance(chrono::Duration::seconds(1));

        assert_eq!(manager.cleanup_expired_bonds().await, 1);
        assert_eq!(manager.cleanup_expired_bonds().await, 0);

        let active = manager.active_bonds(None).await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].bond_id, indefinite.bond_id);

        let lifted = manager.get_bond(&bond.bond_id).await.unwrap();
        assert_eq!(lifted.status, BondStatus::Lifted);
        assert_eq!(manager.bond_history(None).await.len(), 2);
    }

    #[tokio::test]
    async fn test_severity_and_summaries() {
        let (manager, clock) = manager();
        assert_eq!(manager.severity_for(1100.0, 1000.0), ViolationSeverity::Minor);
        assert_eq!(manager.severity_for(1300.0, 1000.0), ViolationSeverity::Major);
        assert_eq!(manager.severity_for(2000.0, 1000.0), ViolationSeverity::Critical);
        assert_eq!(manager.severity_for(1.0, 0.0), ViolationSeverity::Critical);

        let bond = manager
            .impose_bond("P1", constraints(), "test", "tester", Some(1.0))
            .await
            .unwrap();
        manager
            .record_violation(&bond.bond_id, "cost_per_op", 0.06, 0.05, ViolationSeverity::Minor)
            .await
            .unwrap();

        clock.advance(chrono::Duration::hours(2));
        let summaries = manager.active_bond_summaries().await;
        assert_eq!(summaries.len(), 1);
        assert!(summaries[0].is_expired);
        assert_eq!(summaries[0].violations.len(), 1);

        let stats = manager.stats().await;
        assert_eq!(stats.active, 1);
        assert_eq!(stats.total_violations, 1);
    }
}
