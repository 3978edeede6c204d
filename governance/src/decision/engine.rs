//! Decision engine - turns risk events into decisions.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::config::DecisionConfig;
use crate::decision::rules::{default_policy_rules, PolicyRule, RuleEngine};
use crate::event_log::EventLog;
use crate::types::{Decision, DecisionType, Result, RiskEvent, RiskLevel};

/// Confidence of a decision for a given risk level and rule priority.
///
/// `0.7` base, plus a level bonus, plus `0.05` for high-priority rules,
/// capped at `1.0`.
pub fn confidence_for(level: RiskLevel, priority: i32, high_priority_threshold: i32) -> f64 {
    let level_bonus: f64 = match level {
        RiskLevel::Critical => 0.20,
        RiskLevel::High => 0.15,
        RiskLevel::Medium => 0.05,
        RiskLevel::Low => 0.0,
    };
    let priority_bonus: f64 = if priority >= high_priority_threshold {
        0.05
    } else {
        0.0
    };
    (0.7 + level_bonus + priority_bonus).min(1.0)
}

/// Statistics over the decision history.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DecisionStats {
    /// Decisions made
    pub total_decisions: usize,
    /// Decisions per outcome
    pub by_type: HashMap<DecisionType, usize>,
    /// Decisions that fell through to the default rule
    pub default_rule_decisions: usize,
    /// Mean confidence
    pub average_confidence: f64,
}

struct EngineState {
    rules: RuleEngine,
    history: Vec<Decision>,
}

/// Matches risk events against policy rules.
pub struct DecisionEngine {
    default_context_base: f64,
    high_priority_threshold: i32,
    state: Arc<RwLock<EngineState>>,
    clock: Arc<dyn Clock>,
    log: EventLog,
}

impl DecisionEngine {
    /// Create an engine with the built-in rule set.
    pub fn new() -> Self {
        Self::with_config(DecisionConfig::default())
    }

    /// Create from configuration; rules are decoded once here.
    pub fn with_config(config: DecisionConfig) -> Self {
        let rules = config.rules.unwrap_or_else(default_policy_rules);
        Self {
            default_context_base: config.default_context_base,
            high_priority_threshold: config.high_priority_threshold,
            state: Arc::new(RwLock::new(EngineState {
                rules: RuleEngine::with_rules(rules),
                history: Vec::new(),
            })),
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

    /// Add a rule; the rule list is re-sorted by priority.
    pub async fn add_policy_rule(&self, rule: PolicyRule) -> Result<()> {
        rule.validate()?;
        let rule_id = rule.rule_id.clone();
        {
            let mut state = self.state.write().await;
            state.rules.add_rule(rule);
        }
        info!(rule_id = %rule_id, "Policy rule added");
        self.log
            .record(self.clock.now(), "rule_added", serde_json::json!({ "rule_id": rule_id }))
            .await;
        Ok(())
    }

    /// Remove a rule by ID.
    pub async fn remove_policy_rule(&self, rule_id: &str) -> bool {
        let removed = self.state.write().await.rules.remove_rule(rule_id);
        if removed {
            info!(rule_id = %rule_id, "Policy rule removed");
        }
        removed
    }

    /// Rules in evaluation order.
    pub async fn rules(&self) -> Vec<PolicyRule> {
        self.state.read().await.rules.rules().to_vec()
    }

    /// Decide how to respond to a risk event.
    ///
    /// The first rule (by priority) whose types and minimum level match wins;
    /// without a match the default monitoring rule applies.
    pub async fn evaluate(&self, event: &RiskEvent, context: &HashMap<String, f64>) -> Decision {
        let start = std::time::Instant::now();
        let now = self.clock.now();

        let decision = {
            let mut state = self.state.write().await;
            let (rule, matched) = match state.rules.match_rule(event) {
                Some(rule) => (rule.clone(), true),
                None => (PolicyRule::default_monitor(), false),
            };

            let constraints: Vec<_> = rule
                .constraints
                .iter()
                .map(|t| t.instantiate(context, self.default_context_base))
                .collect();

            let reasoning = format!(
                "Risk type: {}; level: {}; applied rule: {}; decision: {}; constraints: {}; {}",
                event.risk_type,
                event.risk_level,
                rule.rule_id,
                rule.decision_type,
                constraints.len(),
                event.description
            );

            let mut metadata = HashMap::new();
            metadata.insert("rule_name".to_string(), serde_json::json!(rule.name));
            metadata.insert("rule_priority".to_string(), serde_json::json!(rule.priority));
            metadata.insert("default_rule".to_string(), serde_json::json!(!matched));
            metadata.insert(
                "risk_type".to_string(),
                serde_json::json!(event.risk_type.as_str()),
            );

            let decision = Decision {
                decision_id: format!("dec-{}", uuid::Uuid::new_v4()),
                risk_event_id: event.event_id.clone(),
                provider_id: event.provider_id.clone(),
                decision_type: rule.decision_type,
                constraints,
                confidence_score: confidence_for(
                    event.risk_level,
                    rule.priority,
                    self.high_priority_threshold,
                ),
                applied_rule: rule.rule_id.clone(),
                reasoning,
                metadata,
                decided_at: now,
            };
            state.history.push(decision.clone());
            decision
        };

        info!(
            decision_id = %decision.decision_id,
            provider_id = %decision.provider_id,
            decision_type = %decision.decision_type,
            rule_id = %decision.applied_rule,
            confidence = decision.confidence_score,
            duration_us = start.elapsed().as_micros() as u64,
            "Decision made"
        );
        self.log.record(now, "decision_made", &decision).await;

        decision
    }

    /// Decision made for a risk event, if any.
    pub async fn decision_for_event(&self, event_id: &str) -> Option<Decision> {
        let state = self.state.read().await;
        state
            .history
            .iter()
            .find(|d| d.risk_event_id == event_id)
            .cloned()
    }

    /// Recent decisions, newest first, optionally for one provider.
    pub async fn decision_history(&self, provider_id: Option<&str>, limit: usize) -> Vec<Decision> {
        let state = self.state.read().await;
        state
            .history
            .iter()
            .rev()
            .filter(|d| provider_id.map_or(true, |p| d.provider_id == p))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Get statistics.
    pub async fn stats(&self) -> DecisionStats {
        let state = self.state.read().await;
        let mut stats = DecisionStats {
            total_decisions: state.history.len(),
            ..Default::default()
        };
        for decision in &state.history {
            *stats.by_type.entry(decision.decision_type).or_insert(0) += 1;
            if decision.applied_rule == "default-monitor" {
                stats.default_rule_decisions += 1;
            }
        }
        if !state.history.is_empty() {
            stats.average_confidence = state
                .history
                .iter()
                .map(|d| d.confidence_score)
                .sum::<f64>()
                / state.history.len() as f64;
        }
        stats
    }
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new()
    }
}
