//! Append-only secure-operations log.
//!
//! Entries are hashed on append and never removed or reordered. Appends
//! are safe under concurrency; an operation's entry must be appended
//! before that operation is reported as committed.

use crate::audit::entry::{AuditEntry, EntryId};
use crate::core::Result;
use std::sync::RwLock;

/// In-memory append-only audit log.
pub struct SecureOperationsLog {
    entries: RwLock<Vec<AuditEntry>>,
}

impl SecureOperationsLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Append an entry, sealing its content hash. Returns the entry ID.
    pub fn append(&self, mut entry: AuditEntry) -> Result<EntryId> {
        entry.hash = Some(entry.compute_hash()?);
        let id = entry.id.clone();
        let mut entries = self.entries.write().expect("audit log lock poisoned");
        entries.push(entry);
        Ok(id)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().expect("audit log lock poisoned").len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .read()
            .expect("audit log lock poisoned")
            .clone()
    }

    /// Entries for one actor, oldest first.
    pub fn for_actor(&self, actor: &str) -> Vec<AuditEntry> {
        self.entries
            .read()
            .expect("audit log lock poisoned")
            .iter()
            .filter(|e| e.actor == actor)
            .cloned()
            .collect()
    }

    /// The most recent `count` entries, oldest first.
    pub fn recent(&self, count: usize) -> Vec<AuditEntry> {
        let entries = self.entries.read().expect("audit log lock poisoned");
        let start = entries.len().saturating_sub(count);
        entries[start..].to_vec()
    }
}

impl Default for SecureOperationsLog {
    fn default() -> Self {
        Self::new()
    }
}
