//! Audit pipeline - schedules, tracks and scores provider audits.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::audit::classifier::{ComplianceClassifier, ScoreBandClassifier};
use crate::audit::types::{
    AuditRecord, AuditSchedule, AuditStats, AuditStatus, AuditType, ComplianceLevel,
    ComplianceSummary, ComplianceViolation, ResolutionStatus,
};
use crate::clock::{add_hours, Clock, SystemClock, MAX_DURATION_HOURS};
use crate::config::AuditConfig;
use crate::event_log::EventLog;
use crate::types::{GovernanceError, Result};

/// Violations above this many open ones make a provider non-compliant
/// regardless of its scores.
const MAX_OPEN_VIOLATIONS: usize = 3;

#[derive(Default)]
struct AuditState {
    audits: HashMap<String, AuditRecord>,
    /// Audit ids in initiation order
    order: Vec<String>,
    schedules: HashMap<String, AuditSchedule>,
    violations: Vec<ComplianceViolation>,
}

impl AuditState {
    fn audit_mut(&mut self, audit_id: &str) -> Result<&mut AuditRecord> {
        self.audits
            .get_mut(audit_id)
            .ok_or_else(|| GovernanceError::not_found("audit", audit_id))
    }

    fn add_violation(
        &mut self,
        provider_id: &str,
        audit_id: Option<&str>,
        violation_type: &str,
        description: String,
        now: DateTime<Utc>,
    ) -> ComplianceViolation {
        let violation = ComplianceViolation {
            violation_id: format!("cv-{}", uuid::Uuid::new_v4()),
            provider_id: provider_id.to_string(),
            audit_id: audit_id.map(str::to_string),
            violation_type: violation_type.to_string(),
            description,
            severity: "major".to_string(),
            resolution_status: ResolutionStatus::Open,
            recorded_at: now,
            resolved_at: None,
        };
        self.violations.push(violation.clone());
        violation
    }
}

fn invalid_transition(id: &str, from: AuditStatus, to: AuditStatus) -> GovernanceError {
    GovernanceError::InvalidTransition {
        kind: "audit",
        id: id.to_string(),
        from: from.to_string(),
        to: to.to_string(),
    }
}

/// Owns audit records, schedules and compliance violations.
pub struct AuditPipeline {
    config: AuditConfig,
    classifier: Arc<dyn ComplianceClassifier>,
    state: Arc<RwLock<AuditState>>,
    clock: Arc<dyn Clock>,
    log: EventLog,
}

impl AuditPipeline {
    /// Create a new pipeline with default configuration.
    pub fn new() -> Self {
        Self::with_config(AuditConfig::default())
    }

    /// Create with custom configuration.
    pub fn with_config(config: AuditConfig) -> Self {
        Self {
            config,
            classifier: Arc::new(ScoreBandClassifier::default()),
            state: Arc::new(RwLock::new(AuditState::default())),
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

    /// Replace the classifier used by [`Self::complete_audit_classified`].
    pub fn with_classifier(mut self, classifier: Arc<dyn ComplianceClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Create or replace a provider's recurring schedule.
    ///
    /// Missing frequency and fields fall back to the configured defaults. The
    /// next audit is due one frequency from now.
    pub async fn schedule_audit(
        &self,
        provider_id: &str,
        frequency_hours: Option<f64>,
        required_fields: Option<Vec<String>>,
    ) -> Result<AuditSchedule> {
        let (frequency_hours, next_audit_at) = self.next_due(provider_id, frequency_hours)?;

        let now = self.clock.now();
        let schedule = {
            let mut state = self.state.write().await;
            let last_audit_at = state
                .schedules
                .get(provider_id)
                .and_then(|s| s.last_audit_at);
            let schedule = AuditSchedule {
                provider_id: provider_id.to_string(),
                frequency_hours,
                next_audit_at,
                required_metadata_fields: required_fields
                    .unwrap_or_else(|| self.config.required_metadata_fields.clone()),
                last_audit_at,
            };
            state
                .schedules
                .insert(provider_id.to_string(), schedule.clone());
            schedule
        };

        info!(
            provider_id = %provider_id,
            frequency_hours,
            next_audit_at = %schedule.next_audit_at,
            "Audit scheduled"
        );
        self.log.record(now, "audit_scheduled", &schedule).await;

        Ok(schedule)
    }

    /// Require a provider to be audited at least every `frequency_hours`.
    ///
    /// Unlike `schedule_audit` this never postpones an existing schedule: the
    /// shorter frequency and the earlier due time win, so repeated requirements
    /// still let the audit come due.
    pub async fn require_audit(
        &self,
        provider_id: &str,
        frequency_hours: f64,
    ) -> Result<AuditSchedule> {
        let (frequency_hours, next_audit_at) = self.next_due(provider_id, Some(frequency_hours))?;

        let now = self.clock.now();
        let schedule = {
            let mut state = self.state.write().await;
            match state.schedules.get_mut(provider_id) {
                Some(existing) => {
                    existing.frequency_hours = existing.frequency_hours.min(frequency_hours);
                    existing.next_audit_at = existing.next_audit_at.min(next_audit_at);
                    existing.clone()
                }
                None => {
                    let schedule = AuditSchedule {
                        provider_id: provider_id.to_string(),
                        frequency_hours,
                        next_audit_at,
                        required_metadata_fields: self.config.required_metadata_fields.clone(),
                        last_audit_at: None,
                    };
                    state
                        .schedules
                        .insert(provider_id.to_string(), schedule.clone());
                    schedule
                }
            }
        };

        debug!(
            provider_id = %provider_id,
            frequency_hours = schedule.frequency_hours,
            next_audit_at = %schedule.next_audit_at,
            "Audit required"
        );
        self.log.record(now, "audit_required", &schedule).await;

        Ok(schedule)
    }

    /// Validate a schedule request and compute when its first audit is due.
    fn next_due(
        &self,
        provider_id: &str,
        frequency_hours: Option<f64>,
    ) -> Result<(f64, DateTime<Utc>)> {
        if provider_id.trim().is_empty() {
            return Err(GovernanceError::InvalidInput(
                "audit schedule requires a provider_id".to_string(),
            ));
        }
        let frequency_hours = frequency_hours.unwrap_or(self.config.default_frequency_hours);
        if !frequency_hours.is_finite()
            || frequency_hours <= 0.0
            || frequency_hours > MAX_DURATION_HOURS
        {
            return Err(GovernanceError::InvalidInput(format!(
                "audit frequency must be in (0, {}] hours, got {}",
                MAX_DURATION_HOURS, frequency_hours
            )));
        }
        let next_audit_at = add_hours(self.clock.now(), frequency_hours).ok_or_else(|| {
            GovernanceError::InvalidInput(format!(
                "audit frequency of {} hours overflows the calendar",
                frequency_hours
            ))
        })?;
        Ok((frequency_hours, next_audit_at))
    }

    /// Start a new PENDING audit.
    pub async fn initiate_audit(
        &self,
        provider_id: &str,
        audit_type: AuditType,
    ) -> Result<AuditRecord> {
        if provider_id.trim().is_empty() {
            return Err(GovernanceError::InvalidInput(
                "audit requires a provider_id".to_string(),
            ));
        }

        let now = self.clock.now();
        let record = {
            let mut state = self.state.write().await;
            let metadata_required = state
                .schedules
                .get(provider_id)
                .map(|s| s.required_metadata_fields.clone())
                .unwrap_or_else(|| self.config.required_metadata_fields.clone());

            let record = AuditRecord {
                audit_id: format!("audit-{}", uuid::Uuid::new_v4()),
                provider_id: provider_id.to_string(),
                audit_type,
                status: AuditStatus::Pending,
                compliance_level: None,
                findings: Vec::new(),
                score: None,
                metadata_required,
                metadata_received: HashMap::new(),
                initiated_at: now,
                submitted_at: None,
                completed_at: None,
                failure_reason: None,
            };
            state.order.push(record.audit_id.clone());
            state.audits.insert(record.audit_id.clone(), record.clone());
            record
        };

        info!(
            audit_id = %record.audit_id,
            provider_id = %provider_id,
            audit_type = ?audit_type,
            "Audit initiated"
        );
        self.log.record(now, "audit_initiated", &record).await;

        Ok(record)
    }

    /// Attach provider data to an audit and move it to IN_PROGRESS.
    ///
    /// Overdue audits still accept data.
    pub async fn submit_audit_data(
        &self,
        audit_id: &str,
        data: HashMap<String, serde_json::Value>,
    ) -> Result<AuditRecord> {
        let now = self.clock.now();
        let record = {
            let mut state = self.state.write().await;
            let audit = state.audit_mut(audit_id)?;
            if !matches!(audit.status, AuditStatus::Pending | AuditStatus::Overdue) {
                return Err(invalid_transition(audit_id, audit.status, AuditStatus::InProgress));
            }
            audit.metadata_received.extend(data);
            audit.status = AuditStatus::InProgress;
            audit.submitted_at = Some(now);
            audit.clone()
        };

        debug!(
            audit_id = %audit_id,
            fields = record.metadata_received.len(),
            "Audit data submitted"
        );
        self.log.record(now, "audit_data_submitted", &record).await;

        Ok(record)
    }

    /// Score an in-progress audit.
    ///
    /// A NON_COMPLIANT result records one major violation per finding. The
    /// provider's schedule, if any, is advanced by its frequency.
    pub async fn complete_audit(
        &self,
        audit_id: &str,
        findings: Vec<String>,
        compliance_level: ComplianceLevel,
        score: f64,
    ) -> Result<AuditRecord> {
        if !score.is_finite() || !(0.0..=100.0).contains(&score) {
            return Err(GovernanceError::InvalidInput(format!(
                "audit score must be within [0, 100], got {}",
                score
            )));
        }

        let now = self.clock.now();
        let (record, violations) = {
            let mut state = self.state.write().await;
            let audit = state.audit_mut(audit_id)?;
            if audit.status != AuditStatus::InProgress {
                return Err(invalid_transition(audit_id, audit.status, AuditStatus::Completed));
            }
            audit.status = AuditStatus::Completed;
            audit.compliance_level = Some(compliance_level);
            audit.findings = findings;
            audit.score = Some(score);
            audit.completed_at = Some(now);
            let record = audit.clone();

            let violations: Vec<ComplianceViolation> =
                if compliance_level == ComplianceLevel::NonCompliant {
                    record
                        .findings
                        .iter()
                        .map(|finding| {
                            state.add_violation(
                                &record.provider_id,
                                Some(audit_id),
                                "audit_finding",
                                finding.clone(),
                                now,
                            )
                        })
                        .collect()
                } else {
                    Vec::new()
                };

            if let Some(schedule) = state.schedules.get_mut(&record.provider_id) {
                schedule.last_audit_at = Some(now);
                if let Some(next) = add_hours(now, schedule.frequency_hours) {
                    schedule.next_audit_at = next;
                }
            }
            (record, violations)
        };

        info!(
            audit_id = %audit_id,
            provider_id = %record.provider_id,
            compliance_level = %compliance_level,
            score,
            violations = violations.len(),
            "Audit completed"
        );
        self.log.record(now, "audit_completed", &record).await;
        for violation in &violations {
            self.log.record(now, "compliance_violation", violation).await;
        }

        Ok(record)
    }

    /// Score an in-progress audit, deriving the level from the classifier.
    pub async fn complete_audit_classified(
        &self,
        audit_id: &str,
        findings: Vec<String>,
        score: f64,
    ) -> Result<AuditRecord> {
        let level = self.classifier.classify(score, &findings);
        debug!(
            audit_id = %audit_id,
            classifier = self.classifier.name(),
            level = %level,
            "Audit classified"
        );
        self.complete_audit(audit_id, findings, level, score).await
    }

    /// Fail an open audit.
    pub async fn fail_audit(&self, audit_id: &str, reason: &str) -> Result<AuditRecord> {
        let now = self.clock.now();
        let record = {
            let mut state = self.state.write().await;
            let audit = state.audit_mut(audit_id)?;
            if !audit.status.is_open() {
                return Err(invalid_transition(audit_id, audit.status, AuditStatus::Failed));
            }
            audit.status = AuditStatus::Failed;
            audit.failure_reason = Some(reason.to_string());
            audit.completed_at = Some(now);
            audit.clone()
        };

        warn!(
            audit_id = %audit_id,
            provider_id = %record.provider_id,
            reason = %reason,
            "Audit failed"
        );
        self.log.record(now, "audit_failed", &record).await;

        Ok(record)
    }

    /// Providers whose next scheduled audit is in the past. Does not change
    /// any schedule.
    pub async fn check_overdue_audits(&self) -> Vec<String> {
        let now = self.clock.now();
        let state = self.state.read().await;
        let mut overdue: Vec<String> = state
            .schedules
            .values()
            .filter(|s| s.next_audit_at < now)
            .map(|s| s.provider_id.clone())
            .collect();
        overdue.sort();
        overdue
    }

    /// Mark pending or in-progress audits past the deadline as OVERDUE.
    pub async fn mark_stale_audits(&self) -> usize {
        let now = self.clock.now();
        let stale: Vec<AuditRecord> = {
            let mut state = self.state.write().await;
            state
                .audits
                .values_mut()
                .filter(|a| matches!(a.status, AuditStatus::Pending | AuditStatus::InProgress))
                .filter(|a| {
                    add_hours(a.initiated_at, self.config.audit_deadline_hours)
                        .is_some_and(|deadline| deadline < now)
                })
                .map(|a| {
                    a.status = AuditStatus::Overdue;
                    a.clone()
                })
                .collect()
        };

        for audit in &stale {
            warn!(
                audit_id = %audit.audit_id,
                provider_id = %audit.provider_id,
                "Audit overdue"
            );
            self.log.record(now, "audit_overdue", audit).await;
        }
        stale.len()
    }

    /// Check submitted metadata for required fields.
    ///
    /// A field is missing when absent, null or an empty string. Any miss
    /// records a single violation listing every missing field.
    pub async fn verify_metadata_transparency(
        &self,
        provider_id: &str,
        required_fields: &[String],
        submitted: &HashMap<String, serde_json::Value>,
    ) -> Vec<String> {
        let missing: Vec<String> = required_fields
            .iter()
            .filter(|field| match submitted.get(field.as_str()) {
                None | Some(serde_json::Value::Null) => true,
                Some(serde_json::Value::String(s)) => s.is_empty(),
                Some(_) => false,
            })
            .cloned()
            .collect();

        if missing.is_empty() {
            return missing;
        }

        let now = self.clock.now();
        let violation = self.state.write().await.add_violation(
            provider_id,
            None,
            "metadata_missing",
            format!("Missing required metadata: {}", missing.join(", ")),
            now,
        );

        warn!(
            provider_id = %provider_id,
            missing = ?missing,
            "Metadata transparency check failed"
        );
        self.log.record(now, "compliance_violation", &violation).await;

        missing
    }

    /// Rolling compliance status of a provider.
    pub async fn get_provider_compliance_summary(&self, provider_id: &str) -> ComplianceSummary {
        let state = self.state.read().await;

        // Newest initiation first, so equal completion times keep a fixed order.
        let mut completed: Vec<&AuditRecord> = state
            .order
            .iter()
            .rev()
            .filter_map(|id| state.audits.get(id))
            .filter(|a| a.provider_id == provider_id && a.status == AuditStatus::Completed)
            .collect();
        completed.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        completed.truncate(self.config.summary_window);

        let average_score = if completed.is_empty() {
            0.0
        } else {
            completed.iter().filter_map(|a| a.score).sum::<f64>() / completed.len() as f64
        };

        let open_violations = state
            .violations
            .iter()
            .filter(|v| v.provider_id == provider_id && v.resolution_status.is_unresolved())
            .count();

        let overall_status = if open_violations > MAX_OPEN_VIOLATIONS {
            ComplianceLevel::NonCompliant
        } else if average_score >= 80.0 && open_violations == 0 {
            ComplianceLevel::Compliant
        } else if average_score >= 60.0 {
            ComplianceLevel::PartiallyCompliant
        } else {
            ComplianceLevel::NonCompliant
        };

        let schedule = state.schedules.get(provider_id);
        ComplianceSummary {
            provider_id: provider_id.to_string(),
            overall_status,
            average_score,
            audits_considered: completed.len(),
            open_violations,
            last_audit_at: completed.first().and_then(|a| a.completed_at),
            next_audit_at: schedule.map(|s| s.next_audit_at),
        }
    }

    /// Acknowledge an open violation.
    pub async fn acknowledge_violation(&self, violation_id: &str) -> Result<ComplianceViolation> {
        self.set_resolution(violation_id, ResolutionStatus::Acknowledged)
            .await
    }

    /// Resolve an open or acknowledged violation.
    pub async fn resolve_violation(&self, violation_id: &str) -> Result<ComplianceViolation> {
        self.set_resolution(violation_id, ResolutionStatus::Resolved)
            .await
    }

    async fn set_resolution(
        &self,
        violation_id: &str,
        to: ResolutionStatus,
    ) -> Result<ComplianceViolation> {
        let now = self.clock.now();
        let violation = {
            let mut state = self.state.write().await;
            let violation = state
                .violations
                .iter_mut()
                .find(|v| v.violation_id == violation_id)
                .ok_or_else(|| GovernanceError::not_found("compliance violation", violation_id))?;

            let allowed = match to {
                ResolutionStatus::Acknowledged => {
                    violation.resolution_status == ResolutionStatus::Open
                }
                ResolutionStatus::Resolved => violation.resolution_status.is_unresolved(),
                ResolutionStatus::Open => false,
            };
            if !allowed {
                return Err(GovernanceError::InvalidTransition {
                    kind: "compliance violation",
                    id: violation_id.to_string(),
                    from: format!("{:?}", violation.resolution_status),
                    to: format!("{:?}", to),
                });
            }
            violation.resolution_status = to;
            if to == ResolutionStatus::Resolved {
                violation.resolved_at = Some(now);
            }
            violation.clone()
        };

        info!(
            violation_id = %violation_id,
            provider_id = %violation.provider_id,
            status = ?to,
            "Compliance violation updated"
        );
        self.log.record(now, "compliance_violation_updated", &violation).await;

        Ok(violation)
    }

    /// Get an audit by ID.
    pub async fn get_audit(&self, audit_id: &str) -> Option<AuditRecord> {
        self.state.read().await.audits.get(audit_id).cloned()
    }

    /// Audits in initiation order, optionally for one provider.
    pub async fn audits(&self, provider_id: Option<&str>) -> Vec<AuditRecord> {
        let state = self.state.read().await;
        state
            .order
            .iter()
            .filter_map(|id| state.audits.get(id))
            .filter(|a| provider_id.map_or(true, |p| a.provider_id == p))
            .cloned()
            .collect()
    }

    /// Compliance violations, optionally filtered.
    pub async fn compliance_violations(
        &self,
        provider_id: Option<&str>,
        status: Option<ResolutionStatus>,
    ) -> Vec<ComplianceViolation> {
        let state = self.state.read().await;
        state
            .violations
            .iter()
            .filter(|v| provider_id.map_or(true, |p| v.provider_id == p))
            .filter(|v| status.map_or(true, |s| v.resolution_status == s))
            .cloned()
            .collect()
    }

    /// A provider's schedule.
    pub async fn schedule(&self, provider_id: &str) -> Option<AuditSchedule> {
        self.state.read().await.schedules.get(provider_id).cloned()
    }

    /// Whether the provider has an audit that is not completed or failed.
    pub async fn has_open_audit(&self, provider_id: &str) -> bool {
        self.state
            .read()
            .await
            .audits
            .values()
            .any(|a| a.provider_id == provider_id && a.status.is_open())
    }

    /// Number of audits completed strictly after `since`.
    pub async fn completed_since(&self, since: DateTime<Utc>) -> usize {
        self.state
            .read()
            .await
            .audits
            .values()
            .filter(|a| a.status == AuditStatus::Completed)
            .filter(|a| a.completed_at.map_or(false, |at| at > since))
            .count()
    }

    /// Get statistics.
    /// Number of audits that reached COMPLETED.
    pub async fn completed_count(&self) -> usize {
        let state = self.state.read().await;
        state
            .audits
            .values()
            .filter(|a| a.status == AuditStatus::Completed)
            .count()
    }

    pub async fn stats(&self) -> AuditStats {
        let state = self.state.read().await;
        let mut by_status: HashMap<AuditStatus, usize> = HashMap::new();
        for audit in state.audits.values() {
            *by_status.entry(audit.status).or_insert(0) += 1;
        }
        AuditStats {
            total_audits: state.audits.len(),
            by_status,
            scheduled_providers: state.schedules.len(),
            total_violations: state.violations.len(),
            open_violations: state
                .violations
                .iter()
                .filter(|v| v.resolution_status.is_unresolved())
                .count(),
        }
    }
}

impl Default for AuditPipeline {
    fn default() -> Self {
        Self::new()
    }
}
