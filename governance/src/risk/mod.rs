//! Risk monitoring.
//!
//! - **Monitor**: per-provider metric and symbiosis history, risk events
//! - **Feedback**: pure tuning of the symbiosis threshold from outcomes

pub mod feedback;
mod monitor;

pub use feedback::{adjust_symbiosis_threshold, AdjustmentBounds, ThresholdFeedback};
pub use monitor::{ProviderStatus, RiskMonitor, RiskMonitorBuilder};
