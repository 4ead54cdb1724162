//! Append-only transaction history ledger.
//!
//! Used only to compute rolling windows; entries are pruned to the
//! retention horizon on each record.

use crate::core::{now, Timestamp};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// One executed transaction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Transaction hash
    pub tx_hash: String,
    /// Execution time
    pub timestamp: Timestamp,
    /// Value in native units
    pub value: f64,
    /// Destination address
    pub destination: String,
}

impl HistoryEntry {
    /// Create an entry stamped now.
    pub fn new(tx_hash: &str, value: f64, destination: &str) -> Self {
        Self {
            tx_hash: tx_hash.to_string(),
            timestamp: now(),
            value,
            destination: destination.to_string(),
        }
    }
}

/// Per-wallet append-only transaction ledger with rolling-window queries.
pub struct TransactionHistory {
    entries: RwLock<HashMap<String, Vec<HistoryEntry>>>,
    retention: Duration,
}

impl TransactionHistory {
    /// Create a ledger with the standard 30-day retention.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            retention: Duration::days(30),
        }
    }

    /// Override the retention horizon.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Record an executed transaction, pruning entries past retention.
    pub fn record(&self, wallet_id: &str, entry: HistoryEntry) {
        let cutoff = now() - self.retention;
        let mut entries = self.entries.write().expect("history lock poisoned");
        let ledger = entries.entry(wallet_id.to_string()).or_default();
        ledger.retain(|e| e.timestamp > cutoff);
        ledger.push(entry);
    }

    /// Sum of values within the trailing window.
    pub fn spent_within(&self, wallet_id: &str, window: Duration) -> f64 {
        let cutoff = now() - window;
        let entries = self.entries.read().expect("history lock poisoned");
        entries
            .get(wallet_id)
            .map(|ledger| {
                ledger
                    .iter()
                    .filter(|e| e.timestamp > cutoff)
                    .map(|e| e.value)
                    .sum()
            })
            .unwrap_or(0.0)
    }

    /// Transaction count within the trailing window.
    pub fn count_within(&self, wallet_id: &str, window: Duration) -> usize {
        let cutoff = now() - window;
        let entries = self.entries.read().expect("history lock poisoned");
        entries
            .get(wallet_id)
            .map(|ledger| ledger.iter().filter(|e| e.timestamp > cutoff).count())
            .unwrap_or(0)
    }

    /// Total retained entries for a wallet.
    pub fn len(&self, wallet_id: &str) -> usize {
        let entries = self.entries.read().expect("history lock poisoned");
        entries.get(wallet_id).map(Vec::len).unwrap_or(0)
    }

    /// Whether a wallet has no retained entries.
    pub fn is_empty(&self, wallet_id: &str) -> bool {
        self.len(wallet_id) == 0
    }
}

impl Default for TransactionHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_query() {
        let history = TransactionHistory::new();
        history.record("w1", HistoryEntry::new("0xaa", 0.5, "0xdest"));
        history.record("w1", HistoryEntry::new("0xbb", 0.25, "0xdest"));
        history.record("w2", HistoryEntry::new("0xcc", 9.0, "0xdest"));

        assert_eq!(history.len("w1"), 2);
        let spent = history.spent_within("w1", Duration::hours(24));
        assert!((spent - 0.75).abs() < 1e-9);
        assert_eq!(history.count_within("w1", Duration::hours(24)), 2);
        // Wallets are isolated.
        assert!((history.spent_within("w2", Duration::hours(24)) - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_wallet_is_empty() {
        let history = TransactionHistory::new();
        assert!(history.is_empty("ghost"));
        assert_eq!(history.spent_within("ghost", Duration::hours(24)), 0.0);
    }

    #[test]
    fn test_prune_on_record() {
        // Zero retention: every prior entry falls outside the horizon as
        // soon as the next record lands.
        let history = TransactionHistory::new().with_retention(Duration::zero());
        history.record("w1", HistoryEntry::new("0xaa", 0.5, "0xdest"));
        std::thread::sleep(std::time::Duration::from_millis(5));
        history.record("w1", HistoryEntry::new("0xbb", 0.5, "0xdest"));
        assert_eq!(history.len("w1"), 1);
    }
}
