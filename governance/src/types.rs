//! Core vocabulary shared by the governance components.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Severity of a detected risk.
///
/// Ordered `Low < Medium < High < Critical`; rule matching relies on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    /// Worth noting
    Low = 0,
    /// Requires attention
    Medium = 1,
    /// Constraint likely required
    High = 2,
    /// Provider must be contained
    Critical = 3,
}

impl RiskLevel {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a detected risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskType {
    /// Symbiosis score fell below the configured minimum
    SymbiosisDecline,
    /// Latency jumped relative to the previous sample
    LatencySpike,
    /// Cost per operation jumped relative to the previous sample
    CostEscalation,
    /// Throughput fell below the static floor
    ThroughputDegradation,
    /// Availability fell below the static floor
    DataFlowAnomaly,
}

impl RiskType {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskType::SymbiosisDecline => "SYMBIOSIS_DECLINE",
            RiskType::LatencySpike => "LATENCY_SPIKE",
            RiskType::CostEscalation => "COST_ESCALATION",
            RiskType::ThroughputDegradation => "THROUGHPUT_DEGRADATION",
            RiskType::DataFlowAnomaly => "DATA_FLOW_ANOMALY",
        }
    }
}

impl fmt::Display for RiskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single metrics sample reported for a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderMetricsSample {
    /// Provider the sample belongs to
    pub provider_id: String,
    /// Request latency in milliseconds
    pub latency_ms: f64,
    /// Sustained throughput in operations per second
    pub throughput_ops_sec: f64,
    /// Cost per operation
    pub cost_per_op: f64,
    /// Availability percentage (0 - 100)
    pub availability_pct: f64,
    /// Symbiosis score (0.0 - 1.0), if reported
    pub symbiosis_score: Option<f64>,
    /// When the sample was taken
    pub timestamp: DateTime<Utc>,
}

impl ProviderMetricsSample {
    /// Check the sample for malformed values.
    pub fn validate(&self) -> Result<()> {
        if self.provider_id.trim().is_empty() {
            return Err(GovernanceError::InvalidInput(
                "metrics sample is missing provider_id".to_string(),
            ));
        }

        let fields = [
            ("latency_ms", self.latency_ms),
            ("throughput_ops_sec", self.throughput_ops_sec),
            ("cost_per_op", self.cost_per_op),
            ("availability_pct", self.availability_pct),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(GovernanceError::InvalidInput(format!(
                    "{} for provider {} must be a non-negative number, got {}",
                    name, self.provider_id, value
                )));
            }
        }

        if self.availability_pct > 100.0 {
            return Err(GovernanceError::InvalidInput(format!(
                "availability_pct for provider {} exceeds 100: {}",
                self.provider_id, self.availability_pct
            )));
        }

        if let Some(score) = self.symbiosis_score {
            validate_symbiosis_score(&self.provider_id, score)?;
        }

        Ok(())
    }

    /// Named numeric fields of this sample, keyed the way constraints and
    /// policy templates refer to them.
    pub fn as_context(&self) -> HashMap<String, f64> {
        let mut context = HashMap::new();
        context.insert("latency_ms".to_string(), self.latency_ms);
        context.insert("throughput_ops_sec".to_string(), self.throughput_ops_sec);
        context.insert("cost_per_op".to_string(), self.cost_per_op);
        context.insert("availability_pct".to_string(), self.availability_pct);
        if let Some(score) = self.symbiosis_score {
            context.insert("symbiosis_score".to_string(), score);
        }
        context
    }
}

pub(crate) fn validate_symbiosis_score(provider_id: &str, score: f64) -> Result<()> {
    if !score.is_finite() || !(0.0..=1.0).contains(&score) {
        return Err(GovernanceError::InvalidInput(format!(
            "symbiosis score for provider {} must be within [0, 1], got {}",
            provider_id, score
        )));
    }
    Ok(())
}

/// Direction of a provider's symbiosis score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbiosisTrend {
    /// Above 105% of the previous score
    Improving,
    /// Within 5% of the previous score
    Stable,
    /// Below 95% of the previous score
    Declining,
}

/// A recorded symbiosis score with its trend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbiosisScoreSnapshot {
    /// Provider ID
    pub provider_id: String,
    /// Recorded score
    pub score: f64,
    /// Score of the previous snapshot, if any
    pub previous_score: Option<f64>,
    /// Trend relative to the previous snapshot
    pub trend: SymbiosisTrend,
    /// When the score was recorded
    pub timestamp: DateTime<Utc>,
}

/// A policy-relevant anomaly raised by the risk monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskEvent {
    /// Content-derived unique ID
    pub event_id: String,
    /// Risk category
    pub risk_type: RiskType,
    /// Severity
    pub risk_level: RiskLevel,
    /// Provider the risk concerns
    pub provider_id: String,
    /// Human-readable description
    pub description: String,
    /// Metric values that triggered the event
    pub metrics: HashMap<String, f64>,
    /// Suggested operator response
    pub recommended_action: String,
    /// Whether a peace bond should be considered
    pub peace_bond_required: bool,
    /// When the risk was detected
    pub detected_at: DateTime<Utc>,
}

/// Outcome category of a policy decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionType {
    /// Keep watching, no constraint
    MonitorOnly,
    /// Notify the provider
    IssueWarning,
    /// Require a compliance audit
    RequireAudit,
    /// Impose a peace bond with the decision's constraints
    ImposeBond,
    /// Impose a maximally restrictive suspension bond
    SuspendProvider,
}

impl DecisionType {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionType::MonitorOnly => "MONITOR_ONLY",
            DecisionType::IssueWarning => "ISSUE_WARNING",
            DecisionType::RequireAudit => "REQUIRE_AUDIT",
            DecisionType::ImposeBond => "IMPOSE_BOND",
            DecisionType::SuspendProvider => "SUSPEND_PROVIDER",
        }
    }
}

impl fmt::Display for DecisionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of operational limit carried by a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintType {
    /// Upper bound on operations per second
    ThroughputLimit,
    /// Upper bound on latency
    LatencyCeiling,
    /// Upper bound on cost per operation
    CostCeiling,
    /// Metadata the provider must disclose
    MetadataDisclosure,
    /// Recurring audit cadence (limit is the frequency in hours)
    AuditRequirement,
}

impl ConstraintType {
    /// Whether the constraint is checked numerically against reported metrics.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ConstraintType::ThroughputLimit
                | ConstraintType::LatencyCeiling
                | ConstraintType::CostCeiling
        )
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstraintType::ThroughputLimit => "THROUGHPUT_LIMIT",
            ConstraintType::LatencyCeiling => "LATENCY_CEILING",
            ConstraintType::CostCeiling => "COST_CEILING",
            ConstraintType::MetadataDisclosure => "METADATA_DISCLOSURE",
            ConstraintType::AuditRequirement => "AUDIT_REQUIREMENT",
        }
    }
}

impl fmt::Display for ConstraintType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a constraint is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementMethod {
    /// Blocking limit
    Hard,
    /// Advisory limit
    Soft,
    /// Verified by audit only
    Audit,
}

/// A single enforceable limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    /// Constraint kind
    pub constraint_type: ConstraintType,
    /// Metric the limit applies to
    pub parameter: String,
    /// Limit value
    pub limit_value: f64,
    /// Unit of the limit
    pub unit: String,
    /// Enforcement method
    pub enforcement_method: EnforcementMethod,
    /// Description
    pub description: String,
}

impl Constraint {
    /// Create a hard constraint.
    pub fn hard(
        constraint_type: ConstraintType,
        parameter: impl Into<String>,
        limit_value: f64,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            constraint_type,
            parameter: parameter.into(),
            limit_value,
            unit: unit.into(),
            enforcement_method: EnforcementMethod::Hard,
            description: String::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// A decision produced for one risk event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    /// Unique decision ID
    pub decision_id: String,
    /// Risk event this decision answers
    pub risk_event_id: String,
    /// Provider concerned
    pub provider_id: String,
    /// Decision outcome
    pub decision_type: DecisionType,
    /// Instantiated constraints
    pub constraints: Vec<Constraint>,
    /// Confidence (0.0 - 1.0)
    pub confidence_score: f64,
    /// ID of the rule that produced the decision
    pub applied_rule: String,
    /// Human-readable reasoning
    pub reasoning: String,
    /// Additional metadata
    pub metadata: HashMap<String, serde_json::Value>,
    /// When the decision was made
    pub decided_at: DateTime<Utc>,
}

/// Error types for the governance core.
#[derive(Debug, thiserror::Error)]
pub enum GovernanceError {
    /// Malformed input, rejected before any state change
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unknown identifier
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Kind of entity looked up
        kind: &'static str,
        /// Requested ID
        id: String,
    },

    /// State machine misuse
    #[error("Invalid {kind} transition for {id}: {from} -> {to}")]
    InvalidTransition {
        /// Kind of entity
        kind: &'static str,
        /// Entity ID
        id: String,
        /// Current state
        from: String,
        /// Requested state
        to: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// YAML decoding error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Event log I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GovernanceError {
    /// Shorthand for a not-found error.
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        GovernanceError::NotFound { kind, id: id.into() }
    }
}

pub type Result<T> = std::result::Result<T, GovernanceError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ProviderMetricsSample {
        ProviderMetricsSample {
            provider_id: "P1".to_string(),
            latency_ms: 40.0,
            throughput_ops_sec: 2000.0,
            cost_per_op: 0.01,
            availability_pct: 99.9,
            symbiosis_score: Some(0.9),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_risk_level_ordering() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
    }

    #[test]
    fn test_sample_validation() {
        assert!(sample().validate().is_ok());

        let mut missing_id = sample();
        missing_id.provider_id = "  ".to_string();
        assert!(matches!(
            missing_id.validate(),
            Err(GovernanceError::InvalidInput(_))
        ));

        let mut negative = sample();
        negative.latency_ms = -1.0;
        assert!(negative.validate().is_err());

        let mut nan = sample();
        nan.cost_per_op = f64::NAN;
        assert!(nan.validate().is_err());

        let mut over = sample();
        over.availability_pct = 100.5;
        assert!(over.validate().is_err());

        let mut bad_score = sample();
        bad_score.symbiosis_score = Some(1.2);
        assert!(bad_score.validate().is_err());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&RiskType::DataFlowAnomaly).unwrap();
        assert_eq!(json, "\"DATA_FLOW_ANOMALY\"");
        let json = serde_json::to_string(&EnforcementMethod::Hard).unwrap();
        assert_eq!(json, "\"hard\"");
        let json = serde_json::to_string(&SymbiosisTrend::Declining).unwrap();
        assert_eq!(json, "\"declining\"");
    }

    #[test]
    fn test_context_keys() {
        let context = sample().as_context();
        assert_eq!(context.get("throughput_ops_sec"), Some(&2000.0));
        assert_eq!(context.get("symbiosis_score"), Some(&0.9));
    }
}
