//! Compliance audits.
//!
//! Each audit moves `PENDING -> IN_PROGRESS -> COMPLETED | FAILED`; audits left
//! open past the deadline become `OVERDUE`. Providers may also carry a
//! recurring [`AuditSchedule`].

mod classifier;
mod pipeline;
mod types;

pub use classifier::{ComplianceClassifier, ScoreBandClassifier};
pub use pipeline::AuditPipeline;
pub use types::{
    AuditRecord, AuditSchedule, AuditStats, AuditStatus, AuditType, ComplianceLevel,
    ComplianceSummary, ComplianceViolation, ResolutionStatus,
};
