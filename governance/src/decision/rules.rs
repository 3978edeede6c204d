//! Policy rules and the rule engine.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::types::{
    Constraint, ConstraintType, DecisionType, EnforcementMethod, GovernanceError, Result,
    RiskEvent, RiskLevel, RiskType,
};

/// How a template derives its limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LimitTemplate {
    /// Absolute limit
    Value {
        /// Limit value
        value: f64,
    },
    /// Limit relative to a provider context field
    Factor {
        /// Multiplier applied to the field
        limit_factor: f64,
        /// Context field the factor applies to
        field: String,
    },
}

impl LimitTemplate {
    /// Absolute limit.
    pub fn value(value: f64) -> Self {
        LimitTemplate::Value { value }
    }

    /// Limit relative to a context field.
    pub fn factor(field: impl Into<String>, limit_factor: f64) -> Self {
        LimitTemplate::Factor {
            limit_factor,
            field: field.into(),
        }
    }

    fn resolve(&self, context: &HashMap<String, f64>, default_base: f64) -> f64 {
        match self {
            LimitTemplate::Value { value } => *value,
            LimitTemplate::Factor {
                limit_factor,
                field,
            } => context.get(field).copied().unwrap_or(default_base) * limit_factor,
        }
    }
}

/// Template from which a rule instantiates constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintTemplate {
    /// Constraint kind
    pub constraint_type: ConstraintType,
    /// Metric the limit applies to
    pub parameter: String,
    /// Limit derivation
    pub limit: LimitTemplate,
    /// Unit of the limit
    pub unit: String,
    /// Enforcement method
    pub enforcement_method: EnforcementMethod,
    /// Description
    #[serde(default)]
    pub description: String,
}

impl ConstraintTemplate {
    /// Create a template.
    pub fn new(
        constraint_type: ConstraintType,
        parameter: impl Into<String>,
        limit: LimitTemplate,
        unit: impl Into<String>,
        enforcement_method: EnforcementMethod,
    ) -> Self {
        Self {
            constraint_type,
            parameter: parameter.into(),
            limit,
            unit: unit.into(),
            enforcement_method,
            description: String::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Create a constraint using the provider context.
    pub fn instantiate(&self, context: &HashMap<String, f64>, default_base: f64) -> Constraint {
        Constraint {
            constraint_type: self.constraint_type,
            parameter: self.parameter.clone(),
            limit_value: self.limit.resolve(context, default_base),
            unit: self.unit.clone(),
            enforcement_method: self.enforcement_method,
            description: self.description.clone(),
        }
    }
}

/// A policy rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Unique rule ID
    pub rule_id: String,
    /// Rule name
    #[serde(default)]
    pub name: String,
    /// Risk types this rule applies to; empty matches every type
    #[serde(default)]
    pub risk_types: Vec<RiskType>,
    /// Lowest risk level the rule applies to
    pub min_level: RiskLevel,
    /// Decision to make when matched
    pub decision_type: DecisionType,
    /// Constraints to instantiate
    #[serde(default)]
    pub constraints: Vec<ConstraintTemplate>,
    /// Priority (higher = evaluated first)
    #[serde(default)]
    pub priority: i32,
}

impl PolicyRule {
    /// Create a rule without constraints.
    pub fn new(
        rule_id: impl Into<String>,
        min_level: RiskLevel,
        decision_type: DecisionType,
        priority: i32,
    ) -> Self {
        let rule_id = rule_id.into();
        Self {
            name: rule_id.clone(),
            rule_id,
            risk_types: vec![],
            min_level,
            decision_type,
            constraints: vec![],
            priority,
        }
    }

    /// Restrict to risk types.
    pub fn for_types(mut self, risk_types: impl IntoIterator<Item = RiskType>) -> Self {
        self.risk_types = risk_types.into_iter().collect();
        self
    }

    /// Set the rule name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add a constraint template.
    pub fn with_constraint(mut self, template: ConstraintTemplate) -> Self {
        self.constraints.push(template);
        self
    }

    /// Rule used when nothing else matches.
    pub fn default_monitor() -> Self {
        PolicyRule::new("default-monitor", RiskLevel::Low, DecisionType::MonitorOnly, 0)
            .named("Default monitoring")
    }

    /// Whether the rule applies to an event.
    pub fn matches(&self, event: &RiskEvent) -> bool {
        let type_matches = self.risk_types.is_empty() || self.risk_types.contains(&event.risk_type);
        type_matches && self.min_level <= event.risk_level
    }

    /// Reject empty IDs and malformed limits.
    pub fn validate(&self) -> Result<()> {
        if self.rule_id.trim().is_empty() {
            return Err(GovernanceError::Config("policy rule without rule_id".to_string()));
        }
        for template in &self.constraints {
            let number = match &template.limit {
                LimitTemplate::Value { value } => *value,
                LimitTemplate::Factor { limit_factor, .. } => *limit_factor,
            };
            if !number.is_finite() || number < 0.0 {
                return Err(GovernanceError::Config(format!(
                    "rule {} has invalid limit for {}: {}",
                    self.rule_id, template.parameter, number
                )));
            }
        }
        Ok(())
    }
}

/// Priority-ordered rule list.
///
/// Sorted by priority descending; equal priorities keep insertion order.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    rules: Vec<PolicyRule>,
}

impl RuleEngine {
    /// Create a new empty rule engine.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Create from a rule list.
    pub fn with_rules(rules: impl IntoIterator<Item = PolicyRule>) -> Self {
        let mut engine = Self::new();
        for rule in rules {
            engine.add_rule(rule);
        }
        engine
    }

    /// Decode and validate a YAML list of rules.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let rules: Vec<PolicyRule> = serde_yaml::from_str(yaml)?;
        for rule in &rules {
            rule.validate()?;
        }
        Ok(Self::with_rules(rules))
    }

    /// Add a rule.
    pub fn add_rule(&mut self, rule: PolicyRule) {
        self.rules.push(rule);
        // Stable sort keeps insertion order among equal priorities
        self.rules.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    /// Remove a rule by ID.
    pub fn remove_rule(&mut self, rule_id: &str) -> bool {
        let before = self.rules.len();
        self.rules.retain(|r| r.rule_id != rule_id);
        self.rules.len() != before
    }

    /// First rule matching the event.
    pub fn match_rule(&self, event: &RiskEvent) -> Option<&PolicyRule> {
        let rule = self.rules.iter().find(|r| r.matches(event));
        if let Some(rule) = rule {
            debug!(
                rule_id = %rule.rule_id,
                event_id = %event.event_id,
                "Rule matched"
            );
        }
        rule
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }

    /// Get rule count.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

/// Built-in policy rule set.
pub fn default_policy_rules() -> Vec<PolicyRule> {
    vec![
        PolicyRule::new(
            "critical-suspension",
            RiskLevel::Critical,
            DecisionType::SuspendProvider,
            100,
        )
        .named("Suspend providers with critical risk")
        .with_constraint(
            ConstraintTemplate::new(
                ConstraintType::ThroughputLimit,
                "throughput_ops_sec",
                LimitTemplate::value(1.0),
                "ops/sec",
                EnforcementMethod::Hard,
            )
            .with_description("Suspension: throughput held at minimum"),
        ),
        PolicyRule::new(
            "symbiosis-decline-bond",
            RiskLevel::High,
            DecisionType::ImposeBond,
            50,
        )
        .named("Bond providers with severe symbiosis decline")
        .for_types([RiskType::SymbiosisDecline])
        .with_constraint(
            ConstraintTemplate::new(
                ConstraintType::ThroughputLimit,
                "throughput_ops_sec",
                LimitTemplate::factor("throughput_ops_sec", 0.5),
                "ops/sec",
                EnforcementMethod::Hard,
            )
            .with_description("Throughput capped at half of current"),
        )
        .with_constraint(
            ConstraintTemplate::new(
                ConstraintType::MetadataDisclosure,
                "metadata_disclosure",
                LimitTemplate::value(1.0),
                "flag",
                EnforcementMethod::Audit,
            )
            .with_description("Full metadata disclosure required"),
        )
        .with_constraint(
            ConstraintTemplate::new(
                ConstraintType::AuditRequirement,
                "audit_frequency",
                LimitTemplate::value(24.0),
                "hours",
                EnforcementMethod::Audit,
            )
            .with_description("Daily compliance audit"),
        ),
        PolicyRule::new("data-flow-bond", RiskLevel::High, DecisionType::ImposeBond, 40)
            .named("Bond providers with data flow anomalies")
            .for_types([RiskType::DataFlowAnomaly])
            .with_constraint(
                ConstraintTemplate::new(
                    ConstraintType::ThroughputLimit,
                    "throughput_ops_sec",
                    LimitTemplate::factor("throughput_ops_sec", 0.75),
                    "ops/sec",
                    EnforcementMethod::Hard,
                )
                .with_description("Throughput capped at 75% of current"),
            )
            .with_constraint(
                ConstraintTemplate::new(
                    ConstraintType::AuditRequirement,
                    "audit_frequency",
                    LimitTemplate::value(48.0),
                    "hours",
                    EnforcementMethod::Audit,
                )
                .with_description("Data flow audit every two days"),
            ),
        PolicyRule::new("latency-bond", RiskLevel::High, DecisionType::ImposeBond, 30)
            .named("Bond providers with latency spikes")
            .for_types([RiskType::LatencySpike])
            .with_constraint(
                ConstraintTemplate::new(
                    ConstraintType::LatencyCeiling,
                    "latency_ms",
                    LimitTemplate::value(150.0),
                    "ms",
                    EnforcementMethod::Soft,
                )
                .with_description("Latency ceiling"),
            ),
        PolicyRule::new("cost-bond", RiskLevel::High, DecisionType::ImposeBond, 20)
            .named("Bond providers with cost escalation")
            .for_types([RiskType::CostEscalation])
            .with_constraint(
                ConstraintTemplate::new(
                    ConstraintType::CostCeiling,
                    "cost_per_op",
                    LimitTemplate::factor("cost_per_op", 1.0),
                    "per_op",
                    EnforcementMethod::Hard,
                )
                .with_description("Cost frozen at current rate"),
            ),
        PolicyRule::new("medium-risk-audit", RiskLevel::Medium, DecisionType::RequireAudit, 5)
            .named("Audit providers with medium risk"),
        PolicyRule::new("low-risk-monitor", RiskLevel::Low, DecisionType::MonitorOnly, 1)
            .named("Monitor providers with low risk"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn event(risk_type: RiskType, level: RiskLevel) -> RiskEvent {
        RiskEvent {
            event_id: "risk-test".to_string(),
            risk_type,
            risk_level: level,
            provider_id: "P1".to_string(),
            description: "test".to_string(),
            metrics: HashMap::new(),
            recommended_action: String::new(),
            peace_bond_required: true,
            detected_at: Utc::now(),
        }
    }

    #[test]
    fn test_first_match_wins_in_priority_order() {
        let mut engine = RuleEngine::new();
        engine.add_rule(PolicyRule::new("low", RiskLevel::Low, DecisionType::MonitorOnly, 1));
        engine.add_rule(PolicyRule::new("high", RiskLevel::Medium, DecisionType::ImposeBond, 10));

        let matched = engine
            .match_rule(&event(RiskType::LatencySpike, RiskLevel::High))
            .unwrap();
        assert_eq!(matched.rule_id, "high");
        assert_eq!(engine.rules()[0].rule_id, "high");
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let engine = RuleEngine::with_rules([
            PolicyRule::new("first", RiskLevel::Low, DecisionType::IssueWarning, 5),
            PolicyRule::new("second", RiskLevel::Low, DecisionType::RequireAudit, 5),
        ]);
        let matched = engine
            .match_rule(&event(RiskType::CostEscalation, RiskLevel::Low))
            .unwrap();
        assert_eq!(matched.rule_id, "first");
    }

    #[test]
    fn test_type_and_level_filters() {
        let rule = PolicyRule::new("r", RiskLevel::High, DecisionType::ImposeBond, 1)
            .for_types([RiskType::SymbiosisDecline]);

        assert!(rule.matches(&event(RiskType::SymbiosisDecline, RiskLevel::High)));
        assert!(rule.matches(&event(RiskType::SymbiosisDecline, RiskLevel::Critical)));
        assert!(!rule.matches(&event(RiskType::SymbiosisDecline, RiskLevel::Medium)));
        assert!(!rule.matches(&event(RiskType::LatencySpike, RiskLevel::High)));
    }

    #[test]
    fn test_remove_rule() {
        let mut engine = RuleEngine::with_rules(default_policy_rules());
        let count = engine.rule_count();
        assert!(engine.remove_rule("latency-bond"));
        assert!(!engine.remove_rule("latency-bond"));
        assert_eq!(engine.rule_count(), count - 1);
    }

    #[test]
    fn test_template_instantiation() {
        let mut context = HashMap::new();
        context.insert("throughput_ops_sec".to_string(), 4000.0);

        let factor = ConstraintTemplate::new(
            ConstraintType::ThroughputLimit,
            "throughput_ops_sec",
            LimitTemplate::factor("throughput_ops_sec", 0.5),
            "ops/sec",
            EnforcementMethod::Hard,
        );
        assert_eq!(factor.instantiate(&context, 10_000.0).limit_value, 2000.0);
        assert_eq!(factor.instantiate(&HashMap::new(), 10_000.0).limit_value, 5000.0);

        let absolute = ConstraintTemplate::new(
            ConstraintType::LatencyCeiling,
            "latency_ms",
            LimitTemplate::value(120.0),
            "ms",
            EnforcementMethod::Soft,
        );
        assert_eq!(absolute.instantiate(&context, 10_000.0).limit_value, 120.0);
    }

    #[test]
    fn test_rules_from_yaml() {
        let yaml = r#"
- rule_id: throttle
  risk_types: [DATA_FLOW_ANOMALY]
  min_level: HIGH
  decision_type: IMPOSE_BOND
  priority: 20
  constraints:
    - constraint_type: THROUGHPUT_LIMIT
      parameter: throughput_ops_sec
      limit: { limit_factor: 0.25, field: throughput_ops_sec }
      unit: ops/sec
      enforcement_method: hard
    - constraint_type: LATENCY_CEILING
      parameter: latency_ms
      limit: { value: 90 }
      unit: ms
      enforcement_method: soft
- rule_id: catch-all
  min_level: LOW
  decision_type: MONITOR_ONLY
"#;
        let engine = RuleEngine::from_yaml(yaml).unwrap();
        assert_eq!(engine.rule_count(), 2);
        assert_eq!(engine.rules()[0].rule_id, "throttle");
        assert_eq!(
            engine.rules()[0].constraints[0].limit,
            LimitTemplate::factor("throughput_ops_sec", 0.25)
        );
        assert_eq!(engine.rules()[0].constraints[1].limit, LimitTemplate::value(90.0));
        assert!(engine.rules()[1].risk_types.is_empty());
    }

    #[test]
    fn test_invalid_yaml_limit_rejected() {
        let yaml = r#"
- rule_id: broken
  min_level: LOW
  decision_type: MONITOR_ONLY
  constraints:
    - constraint_type: COST_CEILING
      parameter: cost_per_op
      limit: { value: -1 }
      unit: per_op
      enforcement_method: hard
"#;
        assert!(matches!(
            RuleEngine::from_yaml(yaml),
            Err(GovernanceError::Config(_))
        ));
    }
}
