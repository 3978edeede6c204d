//! Risk monitor - ingests provider metrics and raises risk events.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::clock::{sub_hours, Clock, SystemClock};
use crate::config::MonitorConfig;
use crate::event_log::EventLog;
use crate::types::{
    validate_symbiosis_score, GovernanceError, ProviderMetricsSample, Result, RiskEvent,
    RiskLevel, RiskType, SymbiosisScoreSnapshot, SymbiosisTrend,
};

/// Aggregated view of one provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    /// Provider ID
    pub provider_id: String,
    /// Most recent metrics sample
    pub latest_metrics: Option<ProviderMetricsSample>,
    /// Most recent symbiosis snapshot
    pub latest_symbiosis: Option<SymbiosisScoreSnapshot>,
    /// Risks raised within the status window
    pub active_risks: Vec<RiskEvent>,
    /// True iff any active risk requires a peace bond
    pub peace_bond_recommended: bool,
}

#[derive(Default)]
struct MonitorState {
    thresholds: MonitorConfig,
    metrics: HashMap<String, VecDeque<ProviderMetricsSample>>,
    symbiosis: HashMap<String, VecDeque<SymbiosisScoreSnapshot>>,
    events: Vec<RiskEvent>,
    sequence: u64,
}

impl MonitorState {
    #[allow(clippy::too_many_arguments)]
    fn raise(
        &mut self,
        provider_id: &str,
        risk_type: RiskType,
        risk_level: RiskLevel,
        description: String,
        metrics: HashMap<String, f64>,
        recommended_action: &str,
        peace_bond_required: bool,
        now: DateTime<Utc>,
    ) -> RiskEvent {
        self.sequence += 1;
        let event = RiskEvent {
            event_id: derive_event_id(
                provider_id,
                risk_type,
                risk_level,
                now,
                &description,
                self.sequence,
            ),
            risk_type,
            risk_level,
            provider_id: provider_id.to_string(),
            description,
            metrics,
            recommended_action: recommended_action.to_string(),
            peace_bond_required,
            detected_at: now,
        };
        self.events.push(event.clone());
        event
    }
}

/// Monitor for provider metrics and symbiosis scores.
pub struct RiskMonitor {
    state: Arc<RwLock<MonitorState>>,
    clock: Arc<dyn Clock>,
    log: EventLog,
}

impl RiskMonitor {
    /// Create a new monitor with default thresholds.
    pub fn new() -> Self {
        Self::with_config(MonitorConfig::default())
    }

    /// Create with custom thresholds.
    pub fn with_config(config: MonitorConfig) -> Self {
        Self {
            state: Arc::new(RwLock::new(MonitorState {
                thresholds: config,
                ..Default::default()
            })),
            clock: Arc::new(SystemClock),
            log: EventLog::disabled(),
        }
    }

    /// Create a builder.
    pub fn builder() -> RiskMonitorBuilder {
        RiskMonitorBuilder::new()
    }

    /// Record a metrics sample and return the risks it raised.
    ///
    /// Latency and cost are compared with the immediately preceding sample of
    /// the same provider; throughput and availability with static floors.
    /// Every violated rule raises its own event.
    pub async fn record_metrics(&self, sample: ProviderMetricsSample) -> Result<Vec<RiskEvent>> {
        if let Err(e) = sample.validate() {
            warn!(provider_id = %sample.provider_id, error = %e, "Rejected metrics sample");
            return Err(e);
        }

        let now = self.clock.now();
        let provider_id = sample.provider_id.clone();
        let mut raised = Vec::new();

        {
            let mut state = self.state.write().await;
            let thresholds = state.thresholds.clone();

            let previous = {
                let history = state.metrics.entry(provider_id.clone()).or_default();
                let previous = history.back().cloned();
                history.push_back(sample.clone());
                while history.len() > thresholds.history_limit {
                    history.pop_front();
                }
                previous
            };

            debug!(
                provider_id = %provider_id,
                latency_ms = sample.latency_ms,
                throughput_ops_sec = sample.throughput_ops_sec,
                availability_pct = sample.availability_pct,
                "Recorded metrics sample"
            );

            if let Some(prev) = &previous {
                if let Some(increase) = percent_increase(prev.latency_ms, sample.latency_ms) {
                    if increase > thresholds.latency_increase_pct {
                        let over_max = sample.latency_ms > thresholds.latency_max_ms;
                        let (level, action) = if over_max {
                            (RiskLevel::High, "Impose latency ceiling and investigate capacity")
                        } else {
                            (RiskLevel::Medium, "Monitor latency trend")
                        };
                        raised.push(state.raise(
                            &provider_id,
                            RiskType::LatencySpike,
                            level,
                            format!(
                                "Latency rose {:.1}% from {:.1}ms to {:.1}ms",
                                increase, prev.latency_ms, sample.latency_ms
                            ),
                            metric_map(&[
                                ("latency_ms", sample.latency_ms),
                                ("previous_latency_ms", prev.latency_ms),
                                ("increase_pct", increase),
                            ]),
                            action,
                            over_max,
                            now,
                        ));
                    }
                }

                if let Some(increase) = percent_increase(prev.cost_per_op, sample.cost_per_op) {
                    if increase > thresholds.cost_increase_pct {
                        let severe = increase >= thresholds.cost_increase_pct * 2.0;
                        let (level, action) = if severe {
                            (RiskLevel::High, "Impose cost ceiling at previous rate")
                        } else {
                            (RiskLevel::Medium, "Request pricing justification")
                        };
                        raised.push(state.raise(
                            &provider_id,
                            RiskType::CostEscalation,
                            level,
                            format!(
                                "Cost per operation rose {:.1}% from {:.4} to {:.4}",
                                increase, prev.cost_per_op, sample.cost_per_op
                            ),
                            metric_map(&[
                                ("cost_per_op", sample.cost_per_op),
                                ("previous_cost_per_op", prev.cost_per_op),
                                ("increase_pct", increase),
                            ]),
                            action,
                            severe,
                            now,
                        ));
                    }
                }
            }

            if sample.throughput_ops_sec < thresholds.throughput_min {
                raised.push(state.raise(
                    &provider_id,
                    RiskType::ThroughputDegradation,
                    RiskLevel::Medium,
                    format!(
                        "Throughput {:.0} ops/sec below minimum {:.0}",
                        sample.throughput_ops_sec, thresholds.throughput_min
                    ),
                    metric_map(&[
                        ("throughput_ops_sec", sample.throughput_ops_sec),
                        ("throughput_min", thresholds.throughput_min),
                    ]),
                    "Verify provider capacity",
                    false,
                    now,
                ));
            }

            if sample.availability_pct < thresholds.availability_min_pct {
                raised.push(state.raise(
                    &provider_id,
                    RiskType::DataFlowAnomaly,
                    RiskLevel::High,
                    format!(
                        "Availability {:.2}% below minimum {:.2}%",
                        sample.availability_pct, thresholds.availability_min_pct
                    ),
                    metric_map(&[
                        ("availability_pct", sample.availability_pct),
                        ("availability_min_pct", thresholds.availability_min_pct),
                    ]),
                    "Impose peace bond and audit data flows",
                    true,
                    now,
                ));
            }
        }

        for event in &raised {
            self.report(event).await;
        }
        self.log
            .record(now, "metrics_recorded", &sample)
            .await;

        Ok(raised)
    }

    /// Record a symbiosis score.
    ///
    /// Returns the snapshot and, when the score is below the configured
    /// minimum, the symbiosis decline it raised (regardless of trend).
    pub async fn record_symbiosis_score(
        &self,
        provider_id: &str,
        score: f64,
    ) -> Result<(SymbiosisScoreSnapshot, Option<RiskEvent>)> {
        if provider_id.trim().is_empty() {
            return Err(GovernanceError::InvalidInput(
                "symbiosis score is missing provider_id".to_string(),
            ));
        }
        if let Err(e) = validate_symbiosis_score(provider_id, score) {
            warn!(provider_id = %provider_id, error = %e, "Rejected symbiosis score");
            return Err(e);
        }

        let now = self.clock.now();

        let (snapshot, raised) = {
            let mut state = self.state.write().await;
            let thresholds = state.thresholds.clone();

            let history = state.symbiosis.entry(provider_id.to_string()).or_default();
            let previous_score = history.back().map(|s| s.score);
            let snapshot = SymbiosisScoreSnapshot {
                provider_id: provider_id.to_string(),
                score,
                previous_score,
                trend: classify_trend(previous_score, score),
                timestamp: now,
            };
            history.push_back(snapshot.clone());
            while history.len() > thresholds.history_limit {
                history.pop_front();
            }

            let raised = if score < thresholds.symbiosis_min {
                let high = score < thresholds.symbiosis_high_risk;
                let (level, action) = if high {
                    (RiskLevel::High, "Impose peace bond and schedule audit")
                } else {
                    (RiskLevel::Medium, "Increase monitoring frequency")
                };
                let mut metrics = metric_map(&[
                    ("symbiosis_score", score),
                    ("symbiosis_min", thresholds.symbiosis_min),
                ]);
                if let Some(prev) = previous_score {
                    metrics.insert("previous_score".to_string(), prev);
                }
                Some(state.raise(
                    provider_id,
                    RiskType::SymbiosisDecline,
                    level,
                    format!(
                        "Symbiosis score {:.2} below minimum {:.2}",
                        score, thresholds.symbiosis_min
                    ),
                    metrics,
                    action,
                    high,
                    now,
                ))
            } else {
                None
            };

            (snapshot, raised)
        };

        debug!(
            provider_id = %provider_id,
            score,
            trend = ?snapshot.trend,
            "Recorded symbiosis score"
        );

        if let Some(event) = &raised {
            self.report(event).await;
        }
        self.log.record(now, "symbiosis_recorded", &snapshot).await;

        Ok((snapshot, raised))
    }

    /// Risks detected within the last `since_hours`, optionally filtered by
    /// provider and exact level.
    pub async fn get_active_risks(
        &self,
        provider_id: Option<&str>,
        level: Option<RiskLevel>,
        since_hours: f64,
    ) -> Vec<RiskEvent> {
        // A window reaching past the representable range covers everything.
        let cutoff = sub_hours(self.clock.now(), since_hours).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let state = self.state.read().await;
        state
            .events
            .iter()
            .filter(|e| e.detected_at >= cutoff)
            .filter(|e| provider_id.map_or(true, |p| e.provider_id == p))
            .filter(|e| level.map_or(true, |l| e.risk_level == l))
            .cloned()
            .collect()
    }

    /// Aggregate the latest sample, latest snapshot and active risks.
    pub async fn get_provider_status(&self, provider_id: &str) -> Result<ProviderStatus> {
        let window = {
            let state = self.state.read().await;
            if !state.metrics.contains_key(provider_id)
                && !state.symbiosis.contains_key(provider_id)
            {
                return Err(GovernanceError::not_found("provider", provider_id));
            }
            state.thresholds.status_window_hours
        };

        let active_risks = self
            .get_active_risks(Some(provider_id), None, window)
            .await;

        let state = self.state.read().await;
        Ok(ProviderStatus {
            provider_id: provider_id.to_string(),
            latest_metrics: state
                .metrics
                .get(provider_id)
                .and_then(|h| h.back().cloned()),
            latest_symbiosis: state
                .symbiosis
                .get(provider_id)
                .and_then(|h| h.back().cloned()),
            peace_bond_recommended: active_risks.iter().any(|r| r.peace_bond_required),
            active_risks,
        })
    }

    /// Latest named metric values for a provider, used to instantiate
    /// factor-based constraints. Empty for unknown providers.
    pub async fn provider_context(&self, provider_id: &str) -> HashMap<String, f64> {
        let state = self.state.read().await;
        let mut context = state
            .metrics
            .get(provider_id)
            .and_then(|h| h.back())
            .map(|s| s.as_context())
            .unwrap_or_default();
        if let Some(snapshot) = state.symbiosis.get(provider_id).and_then(|h| h.back()) {
            context
                .entry("symbiosis_score".to_string())
                .or_insert(snapshot.score);
        }
        context
    }

    /// Most recent samples for a provider, newest first.
    pub async fn metrics_history(&self, provider_id: &str, limit: usize) -> Vec<ProviderMetricsSample> {
        let state = self.state.read().await;
        state
            .metrics
            .get(provider_id)
            .map(|h| h.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    /// Symbiosis snapshots for a provider, oldest first.
    pub async fn symbiosis_history(&self, provider_id: &str) -> Vec<SymbiosisScoreSnapshot> {
        let state = self.state.read().await;
        state
            .symbiosis
            .get(provider_id)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// All providers with recorded metrics or scores, sorted.
    pub async fn monitored_providers(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut providers: Vec<String> = state
            .metrics
            .keys()
            .chain(state.symbiosis.keys())
            .cloned()
            .collect();
        providers.sort();
        providers.dedup();
        providers
    }

    /// Total number of risk events ever raised.
    pub async fn risk_count(&self) -> usize {
        self.state.read().await.events.len()
    }

    /// Current thresholds.
    pub async fn thresholds(&self) -> MonitorConfig {
        self.state.read().await.thresholds.clone()
    }

    /// Replace thresholds. Invalid thresholds leave the current ones intact.
    pub async fn set_thresholds(&self, thresholds: MonitorConfig) -> Result<()> {
        thresholds.validate()?;
        let now = self.clock.now();
        {
            let mut state = self.state.write().await;
            state.thresholds = thresholds.clone();
        }
        info!(
            symbiosis_min = thresholds.symbiosis_min,
            "Risk thresholds updated"
        );
        self.log.record(now, "thresholds_updated", &thresholds).await;
        Ok(())
    }

    async fn report(&self, event: &RiskEvent) {
        warn!(
            event_id = %event.event_id,
            provider_id = %event.provider_id,
            risk_type = %event.risk_type,
            risk_level = %event.risk_level,
            peace_bond_required = event.peace_bond_required,
            "Risk detected"
        );
        self.log.record(event.detected_at, "risk_detected", event).await;
    }
}

impl Default for RiskMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for RiskMonitor.
pub struct RiskMonitorBuilder {
    config: MonitorConfig,
    clock: Arc<dyn Clock>,
    log: EventLog,
}

impl RiskMonitorBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: MonitorConfig::default(),
            clock: Arc::new(SystemClock),
            log: EventLog::disabled(),
        }
    }

    /// Set all thresholds.
    pub fn config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the symbiosis minimum.
    pub fn symbiosis_min(mut self, min: f64) -> Self {
        self.config.symbiosis_min = min;
        self
    }

    /// Set samples kept per provider.
    pub fn history_limit(mut self, limit: usize) -> Self {
        self.config.history_limit = limit;
        self
    }

    /// Set the clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set the event log.
    pub fn event_log(mut self, log: EventLog) -> Self {
        self.log = log;
        self
    }

    /// Build the monitor.
    pub fn build(self) -> Result<RiskMonitor> {
        self.config.validate()?;
        let mut monitor = RiskMonitor::with_config(self.config);
        monitor.clock = self.clock;
        monitor.log = self.log;
        Ok(monitor)
    }
}

impl Default for RiskMonitorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn classify_trend(previous: Option<f64>, score: f64) -> SymbiosisTrend {
    match previous {
        Some(prev) if score < prev * 0.95 => SymbiosisTrend::Declining,
        Some(prev) if score > prev * 1.05 => SymbiosisTrend::Improving,
        _ => SymbiosisTrend::Stable,
    }
}

/// Percentage increase from `previous` to `current`; `None` without a
/// positive baseline.
fn percent_increase(previous: f64, current: f64) -> Option<f64> {
    if previous <= 0.0 {
        return None;
    }
    Some((current - previous) / previous * 100.0)
}

fn metric_map(values: &[(&str, f64)]) -> HashMap<String, f64> {
    values.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn derive_event_id(
    provider_id: &str,
    risk_type: RiskType,
    risk_level: RiskLevel,
    at: DateTime<Utc>,
    description: &str,
    sequence: u64,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(provider_id.as_bytes());
    hasher.update(risk_type.as_str().as_bytes());
    hasher.update(risk_level.as_str().as_bytes());
    hasher.update(at.to_rfc3339().as_bytes());
    hasher.update(description.as_bytes());
    hasher.update(sequence.to_be_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("risk-{}", &digest[..24])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn sample(provider: &str, latency: f64, throughput: f64, cost: f64, availability: f64) -> ProviderMetricsSample {
        ProviderMetricsSample {
            provider_id: provider.to_string(),
            latency_ms: latency,
            throughput_ops_sec: throughput,
            cost_per_op: cost,
            availability_pct: availability,
            symbiosis_score: None,
            timestamp: Utc::now(),
        }
    }

    fn healthy(provider: &str) -> ProviderMetricsSample {
        sample(provider, 50.0, 5000.0, 0.01, 99.9)
    }

    fn monitor_with_clock() -> (RiskMonitor, ManualClock) {
        let clock = ManualClock::starting_now();
        let monitor = RiskMonitor::builder()
            .clock(Arc::new(clock.clone()))
            .build()
            .unwrap();
        (monitor, clock)
    }

    #[tokio::test]
    async fn test_healthy_sample_raises_nothing() {
        let monitor = RiskMonitor::new();
        let events = monitor.record_metrics(healthy("P1")).await.unwrap();
        assert!(events.is_empty());
        assert_eq!(monitor.metrics_history("P1", 10).await.len(), 1);
    }

    #[tokio::test]
    async fn test_low_availability_raises_single_data_flow_anomaly() {
        let monitor = RiskMonitor::new();
        let events = monitor
            .record_metrics(sample("P1", 50.0, 5000.0, 0.01, 97.0))
            .await
            .unwrap();

        let anomalies: Vec<_> = events
            .iter()
            .filter(|e| e.risk_type == RiskType::DataFlowAnomaly)
            .collect();
        assert_eq!(anomalies.len(), 1);
        assert!(anomalies[0].peace_bond_required);
        assert_eq!(anomalies[0].risk_level, RiskLevel::High);
    }

    #[tokio::test]
    async fn test_multiple_violations_all_emitted() {
        let monitor = RiskMonitor::new();
        monitor.record_metrics(healthy("P1")).await.unwrap();

        // Latency +200%, cost +100%, throughput and availability under floors.
        let events = monitor
            .record_metrics(sample("P1", 150.0, 500.0, 0.02, 90.0))
            .await
            .unwrap();

        let types: Vec<RiskType> = events.iter().map(|e| e.risk_type).collect();
        assert_eq!(events.len(), 4);
        assert!(types.contains(&RiskType::LatencySpike));
        assert!(types.contains(&RiskType::CostEscalation));
        assert!(types.contains(&RiskType::ThroughputDegradation));
        assert!(types.contains(&RiskType::DataFlowAnomaly));

        let spike = events
            .iter()
            .find(|e| e.risk_type == RiskType::LatencySpike)
            .unwrap();
        assert_eq!(spike.risk_level, RiskLevel::High);
        assert!(spike.peace_bond_required);
    }

    #[tokio::test]
    async fn test_latency_compares_with_previous_sample_only() {
        let monitor = RiskMonitor::new();
        monitor.record_metrics(sample("P1", 40.0, 5000.0, 0.01, 99.9)).await.unwrap();
        monitor.record_metrics(sample("P1", 48.0, 5000.0, 0.01, 99.9)).await.unwrap();
        // +20% over the previous sample, +40% over the first one.
        let events = monitor
            .record_metrics(sample("P1", 57.6, 5000.0, 0.01, 99.9))
            .await
            .unwrap();
        assert!(events.is_empty());

        // +30% over the previous sample but still under the ceiling.
        let events = monitor
            .record_metrics(sample("P1", 75.0, 5000.0, 0.01, 99.9))
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].risk_level, RiskLevel::Medium);
        assert!(!events[0].peace_bond_required);
    }

    #[tokio::test]
    async fn test_malformed_sample_leaves_history_untouched() {
        let monitor = RiskMonitor::new();
        monitor.record_metrics(healthy("P1")).await.unwrap();

        let mut bad = healthy("P1");
        bad.throughput_ops_sec = f64::NAN;
        let result = monitor.record_metrics(bad).await;

        assert!(matches!(result, Err(GovernanceError::InvalidInput(_))));
        let history = monitor.metrics_history("P1", 10).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].throughput_ops_sec, 5000.0);
        assert_eq!(monitor.risk_count().await, 0);
    }

    #[tokio::test]
    async fn test_symbiosis_trend_sequence() {
        let monitor = RiskMonitor::new();

        let (first, e1) = monitor.record_symbiosis_score("P1", 0.90).await.unwrap();
        let (second, e2) = monitor.record_symbiosis_score("P1", 0.95).await.unwrap();
        let (third, e3) = monitor.record_symbiosis_score("P1", 0.70).await.unwrap();

        assert_eq!(first.trend, SymbiosisTrend::Stable);
        assert_eq!(second.trend, SymbiosisTrend::Improving);
        assert_eq!(third.trend, SymbiosisTrend::Declining);
        assert!(e1.is_none());
        assert!(e2.is_none());

        let decline = e3.unwrap();
        assert_eq!(decline.risk_type, RiskType::SymbiosisDecline);
        // 0.70 is below the minimum but not below the 0.6 high-risk cutoff.
        assert_eq!(decline.risk_level, RiskLevel::Medium);

        let declines = monitor
            .get_active_risks(Some("P1"), None, 1.0)
            .await
            .into_iter()
            .filter(|e| e.risk_type == RiskType::SymbiosisDecline)
            .count();
        assert_eq!(declines, 1);
    }

    #[tokio::test]
    async fn test_symbiosis_high_cutoff_and_stable_decline() {
        let monitor = RiskMonitor::new();

        let (_, event) = monitor.record_symbiosis_score("P1", 0.55).await.unwrap();
        let event = event.unwrap();
        assert_eq!(event.risk_level, RiskLevel::High);
        assert!(event.peace_bond_required);

        // Stable trend still raises while below minimum.
        let (snapshot, event) = monitor.record_symbiosis_score("P1", 0.56).await.unwrap();
        assert_eq!(snapshot.trend, SymbiosisTrend::Stable);
        assert!(event.is_some());

        assert!(monitor.record_symbiosis_score("P1", 1.5).await.is_err());
    }

    #[tokio::test]
    async fn test_active_risks_window_and_filters() {
        let (monitor, clock) = monitor_with_clock();

        monitor.record_symbiosis_score("P1", 0.5).await.unwrap();
        clock.advance(chrono::Duration::hours(2));
        monitor.record_symbiosis_score("P2", 0.7).await.unwrap();

        assert_eq!(monitor.get_active_risks(None, None, 1.0).await.len(), 1);
        assert_eq!(monitor.get_active_risks(None, None, 3.0).await.len(), 2);
        assert_eq!(
            monitor
                .get_active_risks(None, Some(RiskLevel::High), 3.0)
                .await
                .len(),
            1
        );
        assert!(monitor
            .get_active_risks(Some("P1"), None, 1.0)
            .await
            .is_empty());

        // A window wider than the calendar covers every risk.
        assert_eq!(monitor.get_active_risks(None, None, 1e12).await.len(), 2);
        assert_eq!(
            monitor.get_active_risks(None, None, f64::INFINITY).await.len(),
            2
        );
    }

    #[tokio::test]
    async fn test_event_ids_unique() {
        let monitor = RiskMonitor::new();
        let (_, a) = monitor.record_symbiosis_score("P1", 0.5).await.unwrap();
        let (_, b) = monitor.record_symbiosis_score("P1", 0.5).await.unwrap();
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_ne!(a.event_id, b.event_id);
        assert!(a.event_id.starts_with("risk-"));
    }

    #[tokio::test]
    async fn test_provider_status() {
        let monitor = RiskMonitor::new();
        assert!(matches!(
            monitor.get_provider_status("unknown").await,
            Err(GovernanceError::NotFound { .. })
        ));

        monitor.record_metrics(healthy("P1")).await.unwrap();
        monitor.record_symbiosis_score("P1", 0.7).await.unwrap();

        let status = monitor.get_provider_status("P1").await.unwrap();
        assert!(status.latest_metrics.is_some());
        assert_eq!(status.latest_symbiosis.unwrap().score, 0.7);
        assert_eq!(status.active_risks.len(), 1);
        assert!(!status.peace_bond_recommended);

        monitor
            .record_metrics(sample("P1", 50.0, 5000.0, 0.01, 95.0))
            .await
            .unwrap();
        let status = monitor.get_provider_status("P1").await.unwrap();
        assert!(status.peace_bond_recommended);
    }

    #[tokio::test]
    async fn test_history_limit() {
        let monitor = RiskMonitor::builder().history_limit(3).build().unwrap();
        for _ in 0..5 {
            monitor.record_metrics(healthy("P1")).await.unwrap();
        }
        assert_eq!(monitor.metrics_history("P1", 10).await.len(), 3);
    }

    #[tokio::test]
    async fn test_set_thresholds_validates() {
        let monitor = RiskMonitor::new();
        let mut bad = MonitorConfig::default();
        bad.throughput_min = -1.0;
        assert!(monitor.set_thresholds(bad).await.is_err());
        assert_eq!(monitor.thresholds().await.throughput_min, 1000.0);
    }
}
