//! Permissions Module
//!
//! Transaction policy gate:
//! - Named policies with spending caps, destination lists, hour windows,
//!   gas ceilings and rolling rate limits
//! - Conjunctive evaluation with a most-restrictive verdict
//! - Append-only per-wallet history with 30-day retention

pub mod engine;
pub mod history;
pub mod policy;

pub use engine::{
    PermissionDecision, TransactionPermissionEngine, TransactionRequest, WEI_PER_NATIVE,
};
pub use history::{HistoryEntry, TransactionHistory};
pub use policy::{PolicyAction, PolicyViolation, TimeWindow, TransactionPolicy};
