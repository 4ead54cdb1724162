//! On-chain verification of committed decisions.
//!
//! Resolves the off-chain record by its content address, recomputes the
//! content hash, and compares against the on-chain commitment. Mismatch
//! and absence are classifications for the auditor, never errors.

use crate::chain::registry::DecisionRegistry;
use crate::chain::storage::ContentStore;
use crate::core::{Bytes32, Result};
use crate::enclave::crypto::keccak256;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Classification of one verification attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationOutcome {
    /// Off-chain content matches the on-chain commitment
    Verified,
    /// Content resolved but its hash does not match
    HashMismatch,
    /// The off-chain content could not be resolved
    FetchFailed,
    /// The decision was never logged on-chain
    NotFound,
}

/// Full verification report for an auditor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Outcome classification
    pub outcome: VerificationOutcome,
    /// Decision id checked
    pub decision_id: Bytes32,
    /// The hash committed on-chain
    pub onchain_cid_hash: Bytes32,
    /// The hash recomputed from fetched content, when available
    pub computed_cid_hash: Option<Bytes32>,
}

/// Reconstructs and checks a previously committed decision hash.
pub struct OnChainVerifier {
    registry: Arc<dyn DecisionRegistry>,
    store: Arc<dyn ContentStore>,
}

impl OnChainVerifier {
    /// Create a verifier over a registry and content store.
    pub fn new(registry: Arc<dyn DecisionRegistry>, store: Arc<dyn ContentStore>) -> Self {
        Self { registry, store }
    }

    /// Verify one decision against its off-chain content.
    ///
    /// Registry read failures propagate as errors; everything else is a
    /// classification in the report.
    pub async fn verify(
        &self,
        decision_id: &Bytes32,
        content_id: &str,
    ) -> Result<VerificationReport> {
        let record = self.registry.decision_record(decision_id).await?;
        if record.timestamp == 0 {
            return Ok(VerificationReport {
                outcome: VerificationOutcome::NotFound,
                decision_id: *decision_id,
                onchain_cid_hash: Bytes32::zero(),
                computed_cid_hash: None,
            });
        }

        let content = match self.store.fetch(content_id).await {
            Ok(content) => content,
            Err(err) => {
                warn!(%content_id, error = %err, "off-chain content unavailable");
                return Ok(VerificationReport {
                    outcome: VerificationOutcome::FetchFailed,
                    decision_id: *decision_id,
                    onchain_cid_hash: record.ipfs_cid_hash,
                    computed_cid_hash: None,
                });
            }
        };

        let computed = keccak256(&content);
        let outcome = if computed == record.ipfs_cid_hash {
            VerificationOutcome::Verified
        } else {
            VerificationOutcome::HashMismatch
        };
        info!(?outcome, "decision verification complete");
        Ok(VerificationReport {
            outcome,
            decision_id: *decision_id,
            onchain_cid_hash: record.ipfs_cid_hash,
            computed_cid_hash: Some(computed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::registry::{decision_id_word, DecisionRecord, MemoryDecisionRegistry};
    use crate::chain::storage::MemoryContentStore;
    use uuid::Uuid;

    async fn committed_fixture(
        content: &[u8],
        commit_hash: Bytes32,
    ) -> (OnChainVerifier, Bytes32, String) {
        let registry = Arc::new(MemoryDecisionRegistry::new());
        let store = Arc::new(MemoryContentStore::new());
        let id = decision_id_word(&Uuid::new_v4());
        let content_id = store.upload(content).await.unwrap();
        registry.insert(DecisionRecord {
            id,
            ipfs_cid_hash: commit_hash,
            domain_hash: Bytes32::zero(),
            model_hash: Bytes32::zero(),
            subject: "s".to_string(),
            timestamp: 1_754_000_000,
        });
        (OnChainVerifier::new(registry, store), id, content_id)
    }

    #[tokio::test]
    async fn test_verified_when_hashes_match() {
        let content = br#"{"decision":"approve"}"#;
        let (verifier, id, content_id) =
            committed_fixture(content, keccak256(content)).await;
        let report = verifier.verify(&id, &content_id).await.unwrap();
        assert_eq!(report.outcome, VerificationOutcome::Verified);
        assert_eq!(report.computed_cid_hash, Some(keccak256(content)));
    }

    #[tokio::test]
    async fn test_hash_mismatch_is_classified_not_error() {
        let content = br#"{"decision":"approve"}"#;
        let (verifier, id, content_id) =
            committed_fixture(content, keccak256(b"tampered")).await;
        let report = verifier.verify(&id, &content_id).await.unwrap();
        assert_eq!(report.outcome, VerificationOutcome::HashMismatch);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_classified() {
        let content = br#"{"decision":"approve"}"#;
        let (verifier, id, _) = committed_fixture(content, keccak256(content)).await;
        let report = verifier.verify(&id, "unknown-cid").await.unwrap();
        assert_eq!(report.outcome, VerificationOutcome::FetchFailed);
        assert!(report.computed_cid_hash.is_none());
    }

    #[tokio::test]
    async fn test_unlogged_decision_is_not_found() {
        let registry = Arc::new(MemoryDecisionRegistry::new());
        let store = Arc::new(MemoryContentStore::new());
        let verifier = OnChainVerifier::new(registry, store);
        let id = decision_id_word(&Uuid::new_v4());
        let report = verifier.verify(&id, "anything").await.unwrap();
        assert_eq!(report.outcome, VerificationOutcome::NotFound);
    }
}
