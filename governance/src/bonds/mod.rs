//! Peace bonds: enforceable constraint sets imposed on providers.

mod manager;
mod types;

pub use manager::PeaceBondsManager;
pub use types::{
    BondStats, BondStatus, BondSummary, ComplianceCheck, ConstraintBreach, PeaceBond,
    ViolationEvent, ViolationSeverity,
};
