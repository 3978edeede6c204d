//! Full governance cycle integration tests

use std::collections::HashMap;
use std::sync::Arc;

use caas_governance::audit::{AuditStatus, AuditType, ComplianceLevel};
use caas_governance::bonds::{BondStatus, ViolationSeverity};
use caas_governance::decision::PolicyRule;
use caas_governance::event_log::LogRecord;
use caas_governance::{
    Clock, DecisionType, GovernanceConfig, ManualClock, Orchestrator, ProviderMetricsInput,
    RiskLevel, RiskType, SymbiosisTrend,
};
use chrono::Duration;

fn setup(config: GovernanceConfig) -> (Orchestrator, ManualClock) {
    let clock = ManualClock::starting_now();
    let orchestrator = Orchestrator::from_config_with_clock(config, Arc::new(clock.clone()))
        .expect("valid config");
    (orchestrator, clock)
}

fn metrics(provider: &str, latency_ms: f64) -> ProviderMetricsInput {
    ProviderMetricsInput::new(provider)
        .latency(latency_ms)
        .throughput(5000.0)
        .cost(0.01)
        .availability(99.9)
}

#[tokio::test]
async fn test_symbiosis_trend_scenario() {
    let (orchestrator, _) = setup(GovernanceConfig::default());

    let mut decisions = 0;
    for score in [0.90, 0.95, 0.70] {
        let execution = orchestrator
            .run_cycle(&[metrics("P1", 50.0).symbiosis(score)])
            .await;
        decisions += execution.decisions_made;
    }

    let trends: Vec<SymbiosisTrend> = orchestrator
        .monitor()
        .symbiosis_history("P1")
        .await
        .iter()
        .map(|s| s.trend)
        .collect();
    assert_eq!(
        trends,
        vec![
            SymbiosisTrend::Stable,
            SymbiosisTrend::Improving,
            SymbiosisTrend::Declining
        ]
    );

    let declines: Vec<_> = orchestrator
        .monitor()
        .get_active_risks(Some("P1"), None, 1.0)
        .await
        .into_iter()
        .filter(|r| r.risk_type == RiskType::SymbiosisDecline)
        .collect();
    assert_eq!(declines.len(), 1);
    assert_eq!(declines[0].risk_level, RiskLevel::Medium);
    assert!(!declines[0].peace_bond_required);

    // Medium risks are monitored, not bonded.
    assert_eq!(decisions, 0);
    assert!(orchestrator.bonds().active_bonds(None).await.is_empty());
}

#[tokio::test]
async fn test_latency_bond_lifecycle() {
    let (orchestrator, _) = setup(GovernanceConfig::default());

    let first = orchestrator.run_cycle(&[metrics("P1", 80.0)]).await;
    assert_eq!(first.risks_detected, 0);

    // 62.5% rise above the 100ms ceiling.
    let spike = orchestrator.run_cycle(&[metrics("P1", 130.0)]).await;
    assert_eq!(spike.risks_detected, 1);
    assert_eq!(spike.decisions_made, 1);
    assert_eq!(spike.bonds_imposed, 1);
    assert_eq!(spike.violations_recorded, 0);

    let bond = orchestrator.bonds().active_bonds(Some("P1")).await.remove(0);
    assert_eq!(bond.constraints[0].limit_value, 150.0);
    let decision = orchestrator.engine().decision_history(Some("P1"), 1).await.remove(0);
    assert_eq!(decision.applied_rule, "latency-bond");
    assert_eq!(decision.decision_type, DecisionType::ImposeBond);

    let within = orchestrator.run_cycle(&[metrics("P1", 140.0)]).await;
    assert_eq!(within.violations_recorded, 0);

    // Over the ceiling but below the spike threshold: a minor violation.
    let minor = orchestrator.run_cycle(&[metrics("P1", 170.0)]).await;
    assert_eq!(minor.risks_detected, 0);
    assert_eq!(minor.violations_recorded, 1);
    let stored = orchestrator.bonds().get_bond(&bond.bond_id).await.unwrap();
    assert_eq!(stored.status, BondStatus::Active);

    // A new spike bonds again; the old bond breaks critically.
    let critical = orchestrator.run_cycle(&[metrics("P1", 400.0)]).await;
    assert_eq!(critical.bonds_imposed, 1);
    assert_eq!(critical.violations_recorded, 1);

    let stored = orchestrator.bonds().get_bond(&bond.bond_id).await.unwrap();
    assert_eq!(stored.status, BondStatus::Violated);
    let violations = orchestrator.bonds().violations(Some(&bond.bond_id)).await;
    assert_eq!(violations.len(), 2);
    assert_eq!(violations[0].severity, ViolationSeverity::Minor);
    assert_eq!(violations[1].severity, ViolationSeverity::Critical);
    assert_eq!(violations[1].action_taken, "bond_suspended");

    let active = orchestrator.bonds().active_bonds(Some("P1")).await;
    assert_eq!(active.len(), 1);
    assert_ne!(active[0].bond_id, bond.bond_id);
}

#[tokio::test]
async fn test_suspension_rule() {
    let (orchestrator, clock) = setup(GovernanceConfig::default());
    orchestrator
        .engine()
        .add_policy_rule(
            PolicyRule::new(
                "suspend-data-flow",
                RiskLevel::High,
                DecisionType::SuspendProvider,
                200,
            )
            .for_types([RiskType::DataFlowAnomaly]),
        )
        .await
        .unwrap();

    let execution = orchestrator
        .run_cycle(&[metrics("P1", 50.0).availability(90.0)])
        .await;
    assert_eq!(execution.bonds_imposed, 1);

    let bond = orchestrator.bonds().active_bonds(Some("P1")).await.remove(0);
    assert_eq!(bond.constraints.len(), 1);
    assert_eq!(bond.constraints[0].limit_value, 1.0);
    assert_eq!(bond.expires_at, Some(clock.now() + Duration::hours(24)));

    // Any real traffic breaks a suspension.
    let next = orchestrator.run_cycle(&[metrics("P1", 50.0)]).await;
    assert_eq!(next.violations_recorded, 1);
    assert_eq!(
        orchestrator.bonds().get_bond(&bond.bond_id).await.unwrap().status,
        BondStatus::Violated
    );
}

#[tokio::test]
async fn test_zero_duration_bond_expires_next_cycle() {
    let mut config = GovernanceConfig::default();
    config.orchestrator.bond_duration_hours = Some(0.0);
    let (orchestrator, clock) = setup(config);

    let first = orchestrator
        .run_cycle(&[metrics("P1", 50.0).symbiosis(0.5)])
        .await;
    assert_eq!(first.bonds_imposed, 1);
    assert_eq!(first.bonds_expired, 0);

    clock.advance(Duration::seconds(1));
    let second = orchestrator.run_cycle(&[]).await;
    assert_eq!(second.bonds_expired, 1);
    assert!(orchestrator.bonds().active_bonds(None).await.is_empty());
    assert_eq!(orchestrator.bonds().bond_history(Some("P1")).await.len(), 1);
}

#[tokio::test]
async fn test_bond_mandated_audit_flow() {
    let (orchestrator, clock) = setup(GovernanceConfig::default());

    orchestrator
        .run_cycle(&[metrics("P1", 50.0).symbiosis(0.5)])
        .await;
    let schedule = orchestrator.audits().schedule("P1").await.unwrap();
    assert_eq!(schedule.frequency_hours, 24.0);

    clock.advance(Duration::hours(25));
    let due = orchestrator.run_cycle(&[]).await;
    assert_eq!(due.audits_initiated, 1);

    // An open audit blocks duplicates.
    let again = orchestrator.run_cycle(&[]).await;
    assert_eq!(again.audits_initiated, 0);

    let audit = orchestrator.audits().audits(Some("P1")).await.remove(0);
    assert_eq!(audit.audit_type, AuditType::Scheduled);
    orchestrator
        .audits()
        .submit_audit_data(
            &audit.audit_id,
            HashMap::from([("data_sources".to_string(), serde_json::json!("crawl"))]),
        )
        .await
        .unwrap();
    let completed = orchestrator
        .audits()
        .complete_audit(
            &audit.audit_id,
            vec![
                "model version not disclosed".to_string(),
                "retention policy missing".to_string(),
            ],
            ComplianceLevel::NonCompliant,
            40.0,
        )
        .await
        .unwrap();
    assert_eq!(completed.status, AuditStatus::Completed);

    let violations = orchestrator
        .audits()
        .compliance_violations(Some("P1"), None)
        .await;
    assert_eq!(violations.len(), 2);
    assert!(violations.iter().all(|v| v.severity == "major"));

    let after = orchestrator.run_cycle(&[]).await;
    assert_eq!(after.audits_completed, 1);
    assert_eq!(after.audits_initiated, 0);

    let summary = orchestrator
        .audits()
        .get_provider_compliance_summary("P1")
        .await;
    assert_eq!(summary.overall_status, ComplianceLevel::NonCompliant);
    assert_eq!(summary.open_violations, 2);
}

#[tokio::test]
async fn test_persistent_decline_still_comes_due_for_audit() {
    let (orchestrator, clock) = setup(GovernanceConfig::default());
    let start = clock.now();

    // Every hourly cycle imposes a fresh bond carrying the same audit requirement.
    let mut bonds_imposed = 0;
    let mut audits_initiated = 0;
    for _ in 0..72 {
        let execution = orchestrator
            .run_cycle(&[metrics("P1", 50.0).symbiosis(0.5)])
            .await;
        bonds_imposed += execution.bonds_imposed;
        audits_initiated += execution.audits_initiated;
        clock.advance(Duration::hours(1));
    }

    assert!(bonds_imposed > 1);
    assert_eq!(audits_initiated, 1);
    let schedule = orchestrator.audits().schedule("P1").await.unwrap();
    assert_eq!(schedule.next_audit_at, start + Duration::hours(24));

    let audit = orchestrator.audits().audits(Some("P1")).await.remove(0);
    assert_eq!(audit.audit_type, AuditType::Scheduled);
    assert_eq!(audit.initiated_at, start + Duration::hours(25));
}

#[tokio::test]
async fn test_event_logs_written_per_component() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = GovernanceConfig::default();
    config.event_log.dir = Some(dir.path().to_string_lossy().into_owned());
    let (orchestrator, _) = setup(config);

    orchestrator
        .run_cycle(&[metrics("P1", 50.0).symbiosis(0.5)])
        .await;

    for component in [
        "risk_monitor",
        "decision_engine",
        "peace_bonds",
        "audit_pipeline",
        "orchestrator",
    ] {
        let path = dir.path().join(format!("{}.jsonl", component));
        let content = std::fs::read_to_string(&path).unwrap();
        let records: Vec<LogRecord> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert!(!records.is_empty(), "{} log is empty", component);
    }

    let orchestrator_log = std::fs::read_to_string(dir.path().join("orchestrator.jsonl")).unwrap();
    assert!(orchestrator_log.contains("cycle_completed"));
}

#[test]
fn test_yaml_configured_orchestrator() {
    let yaml = r#"
monitor:
  symbiosis_min: 0.8
orchestrator:
  auto_enforce: false
"#;
    let config = GovernanceConfig::from_yaml(yaml).unwrap();
    let (orchestrator, _) = setup(config);

    let execution = tokio_test::block_on(
        orchestrator.run_cycle(&[metrics("P1", 50.0).symbiosis(0.78)]),
    );
    assert_eq!(execution.risks_detected, 1);
    assert_eq!(execution.decisions_made, 0);

    let history = tokio_test::block_on(orchestrator.execution_history(5));
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].execution_id, execution.execution_id);
}
