//! Configuration for the governance core.

use serde::{Deserialize, Serialize};

use crate::clock::MAX_DURATION_HOURS;
use crate::decision::PolicyRule;
use crate::types::{GovernanceError, Result};

/// Configuration for a complete governance pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    /// Risk monitor thresholds
    pub monitor: MonitorConfig,
    /// Decision engine configuration
    pub decision: DecisionConfig,
    /// Peace bond enforcement configuration
    pub bonds: BondsConfig,
    /// Audit pipeline configuration
    pub audit: AuditConfig,
    /// Orchestrator configuration
    pub orchestrator: OrchestratorConfig,
    /// Event log configuration
    pub event_log: EventLogConfig,
}

impl GovernanceConfig {
    /// Load config from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.monitor.validate()?;
        self.decision.validate()?;
        self.bonds.validate()?;
        self.audit.validate()?;
        self.orchestrator.validate()
    }
}

/// Risk monitor thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Scores below this raise a symbiosis decline
    pub symbiosis_min: f64,
    /// Scores below this raise the decline at HIGH level
    pub symbiosis_high_risk: f64,
    /// Latency above which a spike is HIGH (ms)
    pub latency_max_ms: f64,
    /// Step increase over the previous sample that counts as a spike (%)
    pub latency_increase_pct: f64,
    /// Step increase in cost per op that counts as escalation (%)
    pub cost_increase_pct: f64,
    /// Throughput floor (ops/sec)
    pub throughput_min: f64,
    /// Availability floor (%)
    pub availability_min_pct: f64,
    /// Samples kept per provider
    pub history_limit: usize,
    /// Window used by provider status (hours)
    pub status_window_hours: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            symbiosis_min: 0.75,
            symbiosis_high_risk: 0.6,
            latency_max_ms: 100.0,
            latency_increase_pct: 25.0,
            cost_increase_pct: 20.0,
            throughput_min: 1000.0,
            availability_min_pct: 99.0,
            history_limit: 1000,
            status_window_hours: 24.0,
        }
    }
}

impl MonitorConfig {
    /// Reject negative, non-finite or inconsistent thresholds.
    pub fn validate(&self) -> Result<()> {
        let values = [
            ("symbiosis_min", self.symbiosis_min),
            ("symbiosis_high_risk", self.symbiosis_high_risk),
            ("latency_max_ms", self.latency_max_ms),
            ("latency_increase_pct", self.latency_increase_pct),
            ("cost_increase_pct", self.cost_increase_pct),
            ("throughput_min", self.throughput_min),
            ("availability_min_pct", self.availability_min_pct),
            ("status_window_hours", self.status_window_hours),
        ];
        for (name, value) in values {
            non_negative(name, value)?;
        }
        duration_hours("status_window_hours", self.status_window_hours)?;

        if self.symbiosis_min > 1.0 {
            return Err(GovernanceError::Config(format!(
                "symbiosis_min must be <= 1.0, got {}",
                self.symbiosis_min
            )));
        }
        if self.symbiosis_high_risk > self.symbiosis_min {
            return Err(GovernanceError::Config(format!(
                "symbiosis_high_risk ({}) must not exceed symbiosis_min ({})",
                self.symbiosis_high_risk, self.symbiosis_min
            )));
        }
        if self.availability_min_pct > 100.0 {
            return Err(GovernanceError::Config(format!(
                "availability_min_pct must be <= 100, got {}",
                self.availability_min_pct
            )));
        }
        if self.history_limit == 0 {
            return Err(GovernanceError::Config(
                "history_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Decision engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    /// Policy rules; `None` loads the built-in rule set
    pub rules: Option<Vec<PolicyRule>>,
    /// Base used for factor limits when the context lacks the field
    pub default_context_base: f64,
    /// Rules at or above this priority earn a confidence bonus
    pub high_priority_threshold: i32,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            rules: None,
            default_context_base: 10_000.0,
            high_priority_threshold: 10,
        }
    }
}

impl DecisionConfig {
    fn validate(&self) -> Result<()> {
        non_negative("default_context_base", self.default_context_base)?;
        if let Some(rules) = &self.rules {
            for rule in rules {
                rule.validate()?;
            }
        }
        Ok(())
    }
}

/// Peace bond enforcement configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BondsConfig {
    /// actual/limit ratio at or above which a breach is critical
    pub critical_ratio: f64,
    /// actual/limit ratio at or above which a breach is major
    pub major_ratio: f64,
}

impl Default for BondsConfig {
    fn default() -> Self {
        Self {
            critical_ratio: 2.0,
            major_ratio: 1.25,
        }
    }
}

impl BondsConfig {
    fn validate(&self) -> Result<()> {
        non_negative("critical_ratio", self.critical_ratio)?;
        non_negative("major_ratio", self.major_ratio)?;
        if self.major_ratio > self.critical_ratio {
            return Err(GovernanceError::Config(format!(
                "major_ratio ({}) must not exceed critical_ratio ({})",
                self.major_ratio, self.critical_ratio
            )));
        }
        Ok(())
    }
}

/// Audit pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Frequency used when a schedule does not specify one (hours)
    pub default_frequency_hours: f64,
    /// Metadata every scheduled audit requires
    pub required_metadata_fields: Vec<String>,
    /// Completed audits averaged by the compliance summary
    pub summary_window: usize,
    /// Open audits older than this become overdue (hours)
    pub audit_deadline_hours: f64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            default_frequency_hours: 168.0,
            required_metadata_fields: vec![
                "data_sources".to_string(),
                "model_version".to_string(),
                "retention_policy".to_string(),
            ],
            summary_window: 5,
            audit_deadline_hours: 72.0,
        }
    }
}

impl AuditConfig {
    fn validate(&self) -> Result<()> {
        positive("default_frequency_hours", self.default_frequency_hours)?;
        positive("audit_deadline_hours", self.audit_deadline_hours)?;
        duration_hours("default_frequency_hours", self.default_frequency_hours)?;
        duration_hours("audit_deadline_hours", self.audit_deadline_hours)?;
        if self.summary_window == 0 {
            return Err(GovernanceError::Config(
                "summary_window must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Orchestrator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Impose bonds automatically from decisions
    pub auto_enforce: bool,
    /// Recency window for risks considered each cycle (hours)
    pub risk_window_hours: f64,
    /// Duration of imposed bonds; `None` means indefinite
    pub bond_duration_hours: Option<f64>,
    /// Duration of suspension bonds; `None` means indefinite
    pub suspension_duration_hours: Option<f64>,
    /// Throughput ceiling applied by a suspension (ops/sec)
    pub suspension_throughput_limit: f64,
    /// Recorded as `imposed_by` on bonds
    pub imposed_by: String,
    /// Executions kept in history
    pub execution_history_limit: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            auto_enforce: true,
            risk_window_hours: 1.0,
            bond_duration_hours: Some(72.0),
            suspension_duration_hours: Some(24.0),
            suspension_throughput_limit: 1.0,
            imposed_by: "governance-orchestrator".to_string(),
            execution_history_limit: 10_000,
        }
    }
}

impl OrchestratorConfig {
    fn validate(&self) -> Result<()> {
        duration_hours("risk_window_hours", self.risk_window_hours)?;
        non_negative("suspension_throughput_limit", self.suspension_throughput_limit)?;
        if let Some(hours) = self.bond_duration_hours {
            duration_hours("bond_duration_hours", hours)?;
        }
        if let Some(hours) = self.suspension_duration_hours {
            duration_hours("suspension_duration_hours", hours)?;
        }
        Ok(())
    }
}

/// Event log configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventLogConfig {
    /// Directory receiving one JSONL file per component; `None` disables
    pub dir: Option<String>,
}

fn non_negative(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(GovernanceError::Config(format!(
            "{} must be a non-negative number, got {}",
            name, value
        )));
    }
    Ok(())
}

/// Non-negative and short enough to add to any timestamp.
fn duration_hours(name: &str, value: f64) -> Result<()> {
    non_negative(name, value)?;
    if value > MAX_DURATION_HOURS {
        return Err(GovernanceError::Config(format!(
            "{} must be at most {} hours, got {}",
            name, MAX_DURATION_HOURS, value
        )));
    }
    Ok(())
}

fn positive(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(GovernanceError::Config(format!(
            "{} must be positive, got {}",
            name, value
        )));
    }
    Ok(())
}
