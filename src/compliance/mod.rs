//! Compliance Module
//!
//! Post-hoc guardrail over consensus results:
//! - Prohibited-pattern veto (concentration phrases)
//! - Confidence-floor veto
//!
//! A veto forces the final decision to "reject" regardless of vote.

pub mod policy;

pub use policy::{
    ComplianceCheck, ComplianceStatus, PolicyEngine, REASON_PROHIBITED, REASON_REJECTED,
};
