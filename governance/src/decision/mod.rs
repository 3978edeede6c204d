//! Policy decisions.
//!
//! Risk events are matched against priority-ordered [`PolicyRule`]s; the first
//! match wins and its constraint templates are instantiated against the
//! provider's latest metrics.

mod engine;
mod rules;

pub use engine::{confidence_for, DecisionEngine, DecisionStats};
pub use rules::{default_policy_rules, ConstraintTemplate, LimitTemplate, PolicyRule, RuleEngine};
