//! Audit Module
//!
//! Append-only secure-operations log:
//! - keccak-hashed canonical entries
//! - Safe concurrent append, no reordering
//! - Actor and recency queries

pub mod entry;
pub mod log;

pub use entry::{AuditEntry, EntryId, EntrySeverity};
pub use log::SecureOperationsLog;
