//! Secure-operation audit entry.
//!
//! Backend-agnostic record of one security-relevant operation.

use crate::core::{now, Bytes32, Result, Timestamp, TraceValue};
use crate::enclave::crypto::keccak256;
use crate::packet::canonical_json;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unique entry identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(pub String);

impl EntryId {
    /// Create an entry ID from a known value.
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    /// Generate a unique ID.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the ID string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Audit entry severity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySeverity {
    /// Informational
    Info,
    /// Warning
    Warning,
    /// Critical
    Critical,
}

/// A secure-operation audit entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique entry ID
    pub id: EntryId,
    /// Actor (wallet/agent/service ID)
    pub actor: String,
    /// Operation performed
    pub action: String,
    /// Target resource
    pub target: String,
    /// Outcome
    pub success: bool,
    /// Severity level
    pub severity: EntrySeverity,
    /// Additional structured details
    pub metadata: BTreeMap<String, TraceValue>,
    /// Timestamp
    pub timestamp: Timestamp,
    /// Content hash over the canonical entry (set on append)
    pub hash: Option<Bytes32>,
}

impl AuditEntry {
    /// Create a new audit entry.
    pub fn new(actor: &str, action: &str, target: &str) -> Self {
        Self {
            id: EntryId::generate(),
            actor: actor.to_string(),
            action: action.to_string(),
            target: target.to_string(),
            success: true,
            severity: EntrySeverity::Info,
            metadata: BTreeMap::new(),
            timestamp: now(),
            hash: None,
        }
    }

    /// Mark as failure.
    pub fn failed(mut self) -> Self {
        self.success = false;
        self
    }

    /// Set severity.
    pub fn with_severity(mut self, severity: EntrySeverity) -> Self {
        self.severity = severity;
        self
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: &str, value: TraceValue) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    /// Content hash: keccak256 over the canonical JSON of the entry with
    /// the hash field cleared.
    pub fn compute_hash(&self) -> Result<Bytes32> {
        let mut preimage = self.clone();
        preimage.hash = None;
        let json = canonical_json(&preimage)?;
        Ok(keccak256(json.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_defaults() {
        let entry = AuditEntry::new("wallet-1", "sign_decision", "dec-001");
        assert!(entry.success);
        assert_eq!(entry.severity, EntrySeverity::Info);
        assert!(entry.hash.is_none());
    }

    #[test]
    fn test_entry_hash_covers_fields() {
        let a = AuditEntry::new("wallet-1", "sign_decision", "dec-001");
        let mut b = a.clone();
        b.action = "commit_decision".to_string();
        assert_ne!(a.compute_hash().unwrap(), b.compute_hash().unwrap());
    }

    #[test]
    fn test_entry_hash_ignores_existing_hash() {
        let mut entry = AuditEntry::new("wallet-1", "sign_decision", "dec-001");
        let first = entry.compute_hash().unwrap();
        entry.hash = Some(first);
        // Hashing is over the cleared form, so the result is stable.
        assert_eq!(entry.compute_hash().unwrap(), first);
    }

    #[test]
    fn test_builders() {
        let entry = AuditEntry::new("wallet-1", "evaluate_transaction", "tx-9")
            .failed()
            .with_severity(EntrySeverity::Warning)
            .with_metadata("violations", TraceValue::number(2.0));
        assert!(!entry.success);
        assert_eq!(entry.severity, EntrySeverity::Warning);
        assert_eq!(entry.metadata.len(), 1);
    }
}
