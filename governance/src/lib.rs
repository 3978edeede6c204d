//! CaaS Governance - ethical-risk control loop for compute/data providers
//!
//! Ingests provider metrics, detects policy-relevant risks, decides on
//! proportionate constraints and enforces them as peace bonds:
//!
//! - **Risk monitoring**: latency, cost, throughput, availability, symbiosis
//! - **Policy decisions**: priority-ordered rules with a monitoring fallback
//! - **Peace bonds**: constraint sets with a lifecycle and violation tracking
//! - **Audits**: recurring schedules, scoring and compliance violations
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Orchestrator                          │
//! │                                                              │
//! │  ┌─────────────┐  ┌────────────────┐  ┌───────────────────┐ │
//! │  │ RiskMonitor │──│ DecisionEngine │──│ PeaceBondsManager │ │
//! │  └─────────────┘  └────────────────┘  └───────────────────┘ │
//! │                                                              │
//! │                    ┌───────────────┐                         │
//! │                    │ AuditPipeline │                         │
//! │                    └───────────────┘                         │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod audit;
pub mod bonds;
pub mod clock;
pub mod config;
pub mod decision;
pub mod event_log;
pub mod orchestrator;
pub mod risk;
pub mod types;

// Re-export main types
pub use audit::AuditPipeline;
pub use bonds::PeaceBondsManager;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::GovernanceConfig;
pub use decision::DecisionEngine;
pub use event_log::EventLog;
pub use orchestrator::{Orchestrator, ProtocolExecution, ProviderMetricsInput};
pub use risk::RiskMonitor;
pub use types::*;
