//! Governance orchestrator - runs one ingest, decide, enforce and audit cycle
//! per invocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::audit::{AuditPipeline, AuditType};
use crate::bonds::{BondStatus, PeaceBond, PeaceBondsManager};
use crate::clock::{Clock, SystemClock};
use crate::config::{GovernanceConfig, OrchestratorConfig};
use crate::decision::DecisionEngine;
use crate::event_log::EventLog;
use crate::risk::{adjust_symbiosis_threshold, AdjustmentBounds, RiskMonitor, ThresholdFeedback};
use crate::types::{
    Constraint, ConstraintType, Decision, DecisionType, GovernanceError, ProviderMetricsSample,
    Result,
};

/// One provider's metrics as submitted to a cycle.
///
/// Every metric is optional. Missing values default to zero, except
/// availability which defaults to 100%; a missing symbiosis score records
/// nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderMetricsInput {
    pub provider_id: String,
    #[serde(default)]
    pub latency_ms: Option<f64>,
    #[serde(default)]
    pub throughput_ops_sec: Option<f64>,
    #[serde(default)]
    pub cost_per_op: Option<f64>,
    #[serde(default)]
    pub availability_pct: Option<f64>,
    #[serde(default)]
    pub symbiosis_score: Option<f64>,
}

impl ProviderMetricsInput {
    /// Create an input with no metrics.
    pub fn new(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            ..Default::default()
        }
    }

    /// Set latency.
    pub fn latency(mut self, ms: f64) -> Self {
        self.latency_ms = Some(ms);
        self
    }

    /// Set throughput.
    pub fn throughput(mut self, ops_sec: f64) -> Self {
        self.throughput_ops_sec = Some(ops_sec);
        self
    }

    /// Set cost per operation.
    pub fn cost(mut self, per_op: f64) -> Self {
        self.cost_per_op = Some(per_op);
        self
    }

    /// Set availability.
    pub fn availability(mut self, pct: f64) -> Self {
        self.availability_pct = Some(pct);
        self
    }

    /// Set the symbiosis score.
    pub fn symbiosis(mut self, score: f64) -> Self {
        self.symbiosis_score = Some(score);
        self
    }

    fn to_sample(&self, now: DateTime<Utc>) -> ProviderMetricsSample {
        ProviderMetricsSample {
            provider_id: self.provider_id.clone(),
            latency_ms: self.latency_ms.unwrap_or(0.0),
            throughput_ops_sec: self.throughput_ops_sec.unwrap_or(0.0),
            cost_per_op: self.cost_per_op.unwrap_or(0.0),
            availability_pct: self.availability_pct.unwrap_or(100.0),
            symbiosis_score: self.symbiosis_score,
            timestamp: now,
        }
    }

    /// Only the metrics actually submitted, keyed by constraint parameter.
    fn submitted_values(&self) -> HashMap<String, f64> {
        [
            ("latency_ms", self.latency_ms),
            ("throughput_ops_sec", self.throughput_ops_sec),
            ("cost_per_op", self.cost_per_op),
            ("availability_pct", self.availability_pct),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name.to_string(), v)))
        .collect()
    }
}

/// Record of one governance cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolExecution {
    pub execution_id: String,
    pub timestamp: DateTime<Utc>,
    pub providers_monitored: usize,
    pub providers_failed: usize,
    /// Risk events raised while ingesting this cycle's batch
    pub risks_detected: usize,
    pub decisions_made: usize,
    pub bonds_imposed: usize,
    pub violations_recorded: usize,
    pub audits_initiated: usize,
    /// Audits completed since the previous cycle
    pub audits_completed: usize,
    pub bonds_expired: usize,
    pub duration_ms: u64,
}

/// Totals across all components.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorStatus {
    pub total_executions: usize,
    pub monitored_providers: usize,
    pub total_risks: usize,
    pub total_decisions: usize,
    pub active_bonds: usize,
    pub total_audits: usize,
    pub open_compliance_violations: usize,
    pub last_execution: Option<ProtocolExecution>,
}

#[derive(Default)]
struct OrchestratorState {
    executions: VecDeque<ProtocolExecution>,
    audits_completed_seen: usize,
}

/// Sequences the four governance components.
///
/// Components are injected and shared; the orchestrator only uses their
/// public operations.
pub struct Orchestrator {
    config: OrchestratorConfig,
    monitor: Arc<RiskMonitor>,
    engine: Arc<DecisionEngine>,
    bonds: Arc<PeaceBondsManager>,
    audits: Arc<AuditPipeline>,
    clock: Arc<dyn Clock>,
    log: EventLog,
    state: Arc<RwLock<OrchestratorState>>,
}

impl Orchestrator {
    /// Create from explicit components.
    pub fn new(
        config: OrchestratorConfig,
        monitor: Arc<RiskMonitor>,
        engine: Arc<DecisionEngine>,
        bonds: Arc<PeaceBondsManager>,
        audits: Arc<AuditPipeline>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            monitor,
            engine,
            bonds,
            audits,
            clock,
            log: EventLog::disabled(),
            state: Arc::new(RwLock::new(OrchestratorState::default())),
        }
    }

    /// Set the event log.
    pub fn with_event_log(mut self, log: EventLog) -> Self {
        self.log = log;
        self
    }

    /// Build every component from configuration using the system clock.
    pub fn from_config(config: GovernanceConfig) -> Result<Self> {
        Self::from_config_with_clock(config, Arc::new(SystemClock))
    }

    /// Build every component from configuration sharing one clock.
    pub fn from_config_with_clock(config: GovernanceConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let dir = config.event_log.dir.as_deref();

        let monitor = RiskMonitor::builder()
            .config(config.monitor)
            .clock(clock.clone())
            .event_log(EventLog::for_component(dir, "risk_monitor")?)
            .build()?;
        let engine = DecisionEngine::with_config(config.decision)
            .with_clock(clock.clone())
            .with_event_log(EventLog::for_component(dir, "decision_engine")?);
        let bonds = PeaceBondsManager::with_config(config.bonds)
            .with_clock(clock.clone())
            .with_event_log(EventLog::for_component(dir, "peace_bonds")?);
        let audits = AuditPipeline::with_config(config.audit)
            .with_clock(clock.clone())
            .with_event_log(EventLog::for_component(dir, "audit_pipeline")?);
        let log = EventLog::for_component(dir, "orchestrator")?;

        Ok(Self::new(
            config.orchestrator,
            Arc::new(monitor),
            Arc::new(engine),
            Arc::new(bonds),
            Arc::new(audits),
            clock,
        )
        .with_event_log(log))
    }

    /// The risk monitor.
    pub fn monitor(&self) -> &Arc<RiskMonitor> {
        &self.monitor
    }

    /// The decision engine.
    pub fn engine(&self) -> &Arc<DecisionEngine> {
        &self.engine
    }

    /// The peace bonds manager.
    pub fn bonds(&self) -> &Arc<PeaceBondsManager> {
        &self.bonds
    }

    /// The audit pipeline.
    pub fn audits(&self) -> &Arc<AuditPipeline> {
        &self.audits
    }

    /// Run one governance cycle over a batch of provider metrics.
    ///
    /// A failure for one provider, bond or audit is logged and skipped; the
    /// cycle always completes and always appends an execution record.
    pub async fn run_cycle(&self, batch: &[ProviderMetricsInput]) -> ProtocolExecution {
        let start = Instant::now();
        let now = self.clock.now();
        let mut execution = ProtocolExecution {
            execution_id: format!("exec-{}", uuid::Uuid::new_v4()),
            timestamp: now,
            providers_monitored: 0,
            providers_failed: 0,
            risks_detected: 0,
            decisions_made: 0,
            bonds_imposed: 0,
            violations_recorded: 0,
            audits_initiated: 0,
            audits_completed: 0,
            bonds_expired: 0,
            duration_ms: 0,
        };

        info!(
            execution_id = %execution.execution_id,
            providers = batch.len(),
            "Governance cycle started"
        );

        // 1. Ingest
        for input in batch {
            match self.ingest(input, now).await {
                Ok(raised) => {
                    execution.providers_monitored += 1;
                    execution.risks_detected += raised;
                }
                Err(e) => {
                    warn!(
                        provider_id = %input.provider_id,
                        error = %e,
                        "Skipping provider for this cycle"
                    );
                    execution.providers_failed += 1;
                }
            }
        }

        // 2. Harvest recent risks
        let risks = self
            .monitor
            .get_active_risks(None, None, self.config.risk_window_hours)
            .await;

        // 3. Decide and enforce
        let mut imposed_now: HashSet<String> = HashSet::new();
        for risk in risks.iter().filter(|r| r.peace_bond_required) {
            if self.engine.decision_for_event(&risk.event_id).await.is_some() {
                debug!(event_id = %risk.event_id, "Risk already decided");
                continue;
            }
            let context = self.monitor.provider_context(&risk.provider_id).await;
            let decision = self.engine.evaluate(risk, &context).await;
            execution.decisions_made += 1;

            if !self.config.auto_enforce {
                continue;
            }
            match self.enforce(&decision).await {
                Ok(Some(bond)) => {
                    execution.bonds_imposed += 1;
                    imposed_now.insert(bond.bond_id);
                }
                Ok(None) => {}
                Err(e) => warn!(
                    decision_id = %decision.decision_id,
                    provider_id = %decision.provider_id,
                    error = %e,
                    "Failed to enforce decision"
                ),
            }
        }

        // 4. Compliance of existing bonds
        let submitted: HashMap<&str, HashMap<String, f64>> = batch
            .iter()
            .map(|input| (input.provider_id.as_str(), input.submitted_values()))
            .collect();
        let active = self.bonds.active_bonds(None).await;
        for bond in active
            .iter()
            .filter(|b| b.status == BondStatus::Active && !imposed_now.contains(&b.bond_id))
        {
            let Some(values) = submitted.get(bond.provider_id.as_str()) else {
                continue;
            };
            execution.violations_recorded += self.enforce_compliance(bond, values).await;
        }

        // 5. Audits
        for provider_id in self.audits.check_overdue_audits().await {
            if self.audits.has_open_audit(&provider_id).await {
                continue;
            }
            match self.audits.initiate_audit(&provider_id, AuditType::Scheduled).await {
                Ok(_) => execution.audits_initiated += 1,
                Err(e) => warn!(provider_id = %provider_id, error = %e, "Failed to initiate audit"),
            }
        }
        let stale = self.audits.mark_stale_audits().await;
        if stale > 0 {
            debug!(stale, "Stale audits marked overdue");
        }

        // 6. Expire bonds
        execution.bonds_expired = self.bonds.cleanup_expired_bonds().await;

        let completed_total = self.audits.completed_count().await;
        execution.duration_ms = start.elapsed().as_millis() as u64;

        {
            let mut state = self.state.write().await;
            execution.audits_completed = completed_total.saturating_sub(state.audits_completed_seen);
            state.audits_completed_seen = completed_total;
            state.executions.push_back(execution.clone());
            while state.executions.len() > self.config.execution_history_limit.max(1) {
                state.executions.pop_front();
            }
        }

        info!(
            execution_id = %execution.execution_id,
            providers_monitored = execution.providers_monitored,
            providers_failed = execution.providers_failed,
            risks_detected = execution.risks_detected,
            decisions_made = execution.decisions_made,
            bonds_imposed = execution.bonds_imposed,
            violations_recorded = execution.violations_recorded,
            audits_initiated = execution.audits_initiated,
            bonds_expired = execution.bonds_expired,
            duration_ms = execution.duration_ms,
            "Governance cycle completed"
        );
        self.log.record(now, "cycle_completed", &execution).await;

        execution
    }

    /// Record one provider's metrics and symbiosis score. Returns the number
    /// of risks raised.
    async fn ingest(&self, input: &ProviderMetricsInput, now: DateTime<Utc>) -> Result<usize> {
        let mut raised = self.monitor.record_metrics(input.to_sample(now)).await?.len();
        if let Some(score) = input.symbiosis_score {
            let (_, event) = self
                .monitor
                .record_symbiosis_score(&input.provider_id, score)
                .await?;
            raised += usize::from(event.is_some());
        }
        Ok(raised)
    }

    /// Impose the bond a decision calls for, if any.
    async fn enforce(&self, decision: &Decision) -> Result<Option<PeaceBond>> {
        let (constraints, duration) = match decision.decision_type {
            DecisionType::ImposeBond => (
                decision.constraints.clone(),
                self.config.bond_duration_hours,
            ),
            DecisionType::SuspendProvider => (
                vec![Constraint::hard(
                    ConstraintType::ThroughputLimit,
                    "throughput_ops_sec",
                    self.config.suspension_throughput_limit,
                    "ops/sec",
                )
                .with_description("Provider suspended")],
                self.config.suspension_duration_hours,
            ),
            _ => return Ok(None),
        };

        let bond = self
            .bonds
            .impose_bond(
                &decision.provider_id,
                constraints,
                &decision.reasoning,
                &self.config.imposed_by,
                duration,
            )
            .await?;

        for constraint in bond.constraints_of(ConstraintType::AuditRequirement) {
            if let Err(e) = self
                .audits
                .require_audit(&bond.provider_id, constraint.limit_value)
                .await
            {
                warn!(
                    bond_id = %bond.bond_id,
                    provider_id = %bond.provider_id,
                    error = %e,
                    "Failed to schedule bond-mandated audit"
                );
            }
        }

        Ok(Some(bond))
    }

    /// Check a bond and record each breach. Returns the violations recorded.
    async fn enforce_compliance(&self, bond: &PeaceBond, values: &HashMap<String, f64>) -> usize {
        let check = match self.bonds.check_compliance(&bond.bond_id, values).await {
            Ok(check) => check,
            Err(e) => {
                warn!(bond_id = %bond.bond_id, error = %e, "Compliance check failed");
                return 0;
            }
        };

        let mut recorded = 0;
        for breach in &check.breaches {
            let severity = self
                .bonds
                .severity_for(breach.actual_value, breach.constraint.limit_value);
            match self
                .bonds
                .record_violation(
                    &bond.bond_id,
                    &breach.constraint.parameter,
                    breach.actual_value,
                    breach.constraint.limit_value,
                    severity,
                )
                .await
            {
                Ok(_) => recorded += 1,
                Err(e) => warn!(bond_id = %bond.bond_id, error = %e, "Failed to record violation"),
            }
        }
        recorded
    }

    /// Most recent executions, newest first.
    pub async fn execution_history(&self, limit: usize) -> Vec<ProtocolExecution> {
        let state = self.state.read().await;
        state.executions.iter().rev().take(limit).cloned().collect()
    }

    /// Totals across components and the last execution.
    pub async fn status(&self) -> OrchestratorStatus {
        let (total_executions, last_execution) = {
            let state = self.state.read().await;
            (state.executions.len(), state.executions.back().cloned())
        };
        let audit_stats = self.audits.stats().await;
        OrchestratorStatus {
            total_executions,
            monitored_providers: self.monitor.monitored_providers().await.len(),
            total_risks: self.monitor.risk_count().await,
            total_decisions: self.engine.stats().await.total_decisions,
            active_bonds: self.bonds.active_bonds(None).await.len(),
            total_audits: audit_stats.total_audits,
            open_compliance_violations: audit_stats.open_violations,
            last_execution,
        }
    }

    /// Tune the symbiosis threshold from operator feedback.
    ///
    /// Returns the new threshold. A threshold the monitor rejects leaves the
    /// current one in place.
    pub async fn apply_feedback(
        &self,
        feedback: &ThresholdFeedback,
        bounds: &AdjustmentBounds,
    ) -> Result<f64> {
        if bounds.min > bounds.max {
            return Err(GovernanceError::InvalidInput(format!(
                "adjustment bounds are inverted: {} > {}",
                bounds.min, bounds.max
            )));
        }
        let mut thresholds = self.monitor.thresholds().await;
        let previous = thresholds.symbiosis_min;
        thresholds.symbiosis_min = adjust_symbiosis_threshold(previous, feedback, bounds);
        let next = thresholds.symbiosis_min;
        self.monitor.set_thresholds(thresholds).await?;

        info!(
            previous,
            next,
            false_positive_rate = ?feedback.false_positive_rate(),
            "Symbiosis threshold adjusted"
        );
        Ok(next)
    }
}
