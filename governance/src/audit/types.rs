//! Audit and compliance types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Lifecycle state of an audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Overdue,
}

impl AuditStatus {
    /// Whether the audit is still awaiting data or scoring.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            AuditStatus::Pending | AuditStatus::InProgress | AuditStatus::Overdue
        )
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Pending => "PENDING",
            AuditStatus::InProgress => "IN_PROGRESS",
            AuditStatus::Completed => "COMPLETED",
            AuditStatus::Failed => "FAILED",
            AuditStatus::Overdue => "OVERDUE",
        }
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compliance verdict of a completed audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplianceLevel {
    Compliant,
    PartiallyCompliant,
    NonCompliant,
}

impl ComplianceLevel {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplianceLevel::Compliant => "COMPLIANT",
            ComplianceLevel::PartiallyCompliant => "PARTIALLY_COMPLIANT",
            ComplianceLevel::NonCompliant => "NON_COMPLIANT",
        }
    }
}

impl fmt::Display for ComplianceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an audit was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditType {
    /// Recurring schedule came due
    Scheduled,
    /// Required by a peace bond constraint
    BondMandated,
    /// Started ad hoc by an operator or a risk
    Triggered,
    /// Metadata disclosure review
    MetadataTransparency,
}

/// Resolution state of a compliance violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    Open,
    Acknowledged,
    Resolved,
}

impl ResolutionStatus {
    /// Open and acknowledged violations both count against a provider.
    pub fn is_unresolved(&self) -> bool {
        !matches!(self, ResolutionStatus::Resolved)
    }
}

/// A single compliance audit of a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub audit_id: String,
    pub provider_id: String,
    pub audit_type: AuditType,
    pub status: AuditStatus,
    /// Set on completion
    pub compliance_level: Option<ComplianceLevel>,
    pub findings: Vec<String>,
    /// Score in [0, 100], set on completion
    pub score: Option<f64>,
    pub metadata_required: Vec<String>,
    /// Data submitted by the provider
    pub metadata_received: HashMap<String, serde_json::Value>,
    pub initiated_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Reason given when the audit failed
    pub failure_reason: Option<String>,
}

/// A compliance problem found by an audit or a metadata check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceViolation {
    pub violation_id: String,
    pub provider_id: String,
    /// Audit that found it, if any
    pub audit_id: Option<String>,
    pub violation_type: String,
    pub description: String,
    pub severity: String,
    pub resolution_status: ResolutionStatus,
    pub recorded_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Recurring audit schedule for one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditSchedule {
    pub provider_id: String,
    pub frequency_hours: f64,
    pub next_audit_at: DateTime<Utc>,
    pub required_metadata_fields: Vec<String>,
    pub last_audit_at: Option<DateTime<Utc>>,
}

/// Rolling compliance view of a provider.
#[derive(Debug, Clone, Serialize)]
pub struct ComplianceSummary {
    pub provider_id: String,
    pub overall_status: ComplianceLevel,
    /// Average over the most recent completed audits; 0 when there are none
    pub average_score: f64,
    pub audits_considered: usize,
    pub open_violations: usize,
    pub last_audit_at: Option<DateTime<Utc>>,
    pub next_audit_at: Option<DateTime<Utc>>,
}

/// Audit pipeline statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditStats {
    pub total_audits: usize,
    pub by_status: HashMap<AuditStatus, usize>,
    pub scheduled_providers: usize,
    pub total_violations: usize,
    pub open_violations: usize,
}
