//! Decision registry boundary and `logDecision` calldata construction.
//!
//! The core never signs or broadcasts the commit transaction; it only
//! produces calldata for an external signer, after a best-effort replay
//! check against the registry.

use crate::core::{Bytes32, Error, Result};
use crate::enclave::crypto::keccak256;
use crate::enclave::typed_data::{address_word, uint_word};
use crate::packet::DecisionPacket;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

/// Solidity signature of the registry's log function.
pub const LOG_DECISION_SIGNATURE: &str =
    "logDecision(bytes32,bytes32,bytes32,uint256,bytes32,uint256,address)";

/// On-chain record of a committed decision, as returned by the registry's
/// `decisions(bytes32)` view. An absent decision has a zero timestamp.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Decision id (left-padded UUID)
    pub id: Bytes32,
    /// keccak256 of the off-chain decision-trail text
    pub ipfs_cid_hash: Bytes32,
    /// Domain hash
    pub domain_hash: Bytes32,
    /// Model hash
    pub model_hash: Bytes32,
    /// Subject line
    pub subject: String,
    /// Commit timestamp; zero means "never logged"
    pub timestamp: u64,
}

impl DecisionRecord {
    /// The zeroed record the registry returns for an unknown decision.
    pub fn absent(id: Bytes32) -> Self {
        Self {
            id,
            ipfs_cid_hash: Bytes32::zero(),
            domain_hash: Bytes32::zero(),
            model_hash: Bytes32::zero(),
            subject: String::new(),
            timestamp: 0,
        }
    }
}

/// Read-only registry boundary (contract views over RPC in production).
#[async_trait]
pub trait DecisionRegistry: Send + Sync {
    /// Whether a decision id is already logged.
    async fn is_decision_logged(&self, decision_id: &Bytes32) -> Result<bool>;

    /// The stored record for a decision id. Unknown ids yield a record
    /// with a zero timestamp, mirroring the contract's mapping semantics.
    async fn decision_record(&self, decision_id: &Bytes32) -> Result<DecisionRecord>;
}

/// In-memory registry for tests and local flows.
pub struct MemoryDecisionRegistry {
    records: RwLock<HashMap<Bytes32, DecisionRecord>>,
}

impl MemoryDecisionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Store a record, as the registry contract would on `logDecision`.
    pub fn insert(&self, record: DecisionRecord) {
        let mut records = self.records.write().expect("registry lock poisoned");
        records.insert(record.id, record);
    }
}

impl Default for MemoryDecisionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DecisionRegistry for MemoryDecisionRegistry {
    async fn is_decision_logged(&self, decision_id: &Bytes32) -> Result<bool> {
        let records = self.records.read().expect("registry lock poisoned");
        Ok(records.contains_key(decision_id))
    }

    async fn decision_record(&self, decision_id: &Bytes32) -> Result<DecisionRecord> {
        let records = self.records.read().expect("registry lock poisoned");
        Ok(records
            .get(decision_id)
            .cloned()
            .unwrap_or_else(|| DecisionRecord::absent(*decision_id)))
    }
}

/// The 32-byte registry key for a decision: the 16-byte UUID left-padded
/// with zeros.
pub fn decision_id_word(decision_id: &Uuid) -> Bytes32 {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(decision_id.as_bytes());
    Bytes32::new(word)
}

/// ABI-encoded calldata for `logDecision(...)` over a packet.
pub fn log_decision_calldata(packet: &DecisionPacket) -> Vec<u8> {
    let selector = keccak256(LOG_DECISION_SIGNATURE.as_bytes());
    let id_word = decision_id_word(&packet.decision_id);
    let round_word = uint_word(packet.ftso_round_id.unwrap_or(0) as u128);
    let fdc_word = packet.fdc_proof_hash.unwrap_or_else(Bytes32::zero);
    let timestamp_word = uint_word(packet.timestamp as u128);
    let signer_word = address_word(&packet.backend_signer);

    let mut calldata = Vec::with_capacity(4 + 7 * 32);
    calldata.extend_from_slice(&selector.as_bytes()[..4]);
    calldata.extend_from_slice(id_word.as_bytes());
    calldata.extend_from_slice(packet.decision_hash.as_bytes());
    calldata.extend_from_slice(packet.model_hash.as_bytes());
    calldata.extend_from_slice(&round_word);
    calldata.extend_from_slice(fdc_word.as_bytes());
    calldata.extend_from_slice(&timestamp_word);
    calldata.extend_from_slice(&signer_word);
    calldata
}

/// Prepares commit calldata with replay protection.
pub struct DecisionCommitter {
    registry: Arc<dyn DecisionRegistry>,
}

impl DecisionCommitter {
    /// Create a committer over a registry.
    pub fn new(registry: Arc<dyn DecisionRegistry>) -> Self {
        Self { registry }
    }

    /// Build `logDecision` calldata for a packet, refusing when the
    /// decision is already logged. The replay check is best-effort: an RPC
    /// failure degrades to a warning because the registry contract itself
    /// is the final replay guard.
    pub async fn prepare_commit(&self, packet: &DecisionPacket) -> Result<Vec<u8>> {
        let id_word = decision_id_word(&packet.decision_id);
        match self.registry.is_decision_logged(&id_word).await {
            Ok(true) => {
                return Err(Error::DuplicateDecision(packet.decision_id.to_string()));
            }
            Ok(false) => {}
            Err(err) => {
                warn!(
                    decision_id = %packet.decision_id,
                    error = %err,
                    "replay check unavailable; proceeding"
                );
            }
        }
        info!(decision_id = %packet.decision_id, "commit calldata prepared");
        Ok(log_decision_calldata(packet))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::DecisionPacket;

    struct FailingRegistry;

    #[async_trait]
    impl DecisionRegistry for FailingRegistry {
        async fn is_decision_logged(&self, _decision_id: &Bytes32) -> Result<bool> {
            Err(Error::Rpc("connection refused".to_string()))
        }

        async fn decision_record(&self, _decision_id: &Bytes32) -> Result<DecisionRecord> {
            Err(Error::Rpc("connection refused".to_string()))
        }
    }

    fn packet() -> DecisionPacket {
        DecisionPacket {
            decision_id: Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap(),
            wallet_address: "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed".to_string(),
            ai_action: "allocate".to_string(),
            input_summary: "summary".to_string(),
            decision_hash: keccak256(b"decision"),
            model_hash: keccak256(b"model"),
            ftso_feed_id: None,
            ftso_round_id: Some(7),
            fdc_proof_hash: None,
            timestamp: 1_754_000_000,
            backend_signer: "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266".to_string(),
            subject: "summary".to_string(),
        }
    }

    #[test]
    fn test_decision_id_word_left_pads_uuid() {
        let id = Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        let word = decision_id_word(&id);
        assert_eq!(&word.as_bytes()[..16], &[0u8; 16]);
        assert_eq!(&word.as_bytes()[16..], id.as_bytes());
    }

    #[test]
    fn test_calldata_layout() {
        let packet = packet();
        let calldata = log_decision_calldata(&packet);
        // selector + 7 static words
        assert_eq!(calldata.len(), 4 + 7 * 32);
        let selector = keccak256(LOG_DECISION_SIGNATURE.as_bytes());
        assert_eq!(&calldata[..4], &selector.as_bytes()[..4]);
        // First argument is the padded decision id.
        assert_eq!(
            &calldata[4..36],
            decision_id_word(&packet.decision_id).as_bytes()
        );
        // Missing FDC proof encodes as a zero word.
        assert_eq!(&calldata[4 + 4 * 32..4 + 5 * 32], &[0u8; 32]);
        // Signer address occupies the final word, right-aligned.
        assert_eq!(&calldata[4 + 6 * 32..4 + 6 * 32 + 12], &[0u8; 12]);
    }

    #[tokio::test]
    async fn test_prepare_commit_refuses_duplicates() {
        let registry = Arc::new(MemoryDecisionRegistry::new());
        let packet = packet();
        registry.insert(DecisionRecord {
            id: decision_id_word(&packet.decision_id),
            ipfs_cid_hash: keccak256(b"trail"),
            domain_hash: Bytes32::zero(),
            model_hash: packet.model_hash,
            subject: packet.subject.clone(),
            timestamp: 1,
        });

        let committer = DecisionCommitter::new(registry);
        let result = committer.prepare_commit(&packet).await;
        assert!(matches!(result, Err(Error::DuplicateDecision(_))));
    }

    #[tokio::test]
    async fn test_prepare_commit_allows_fresh_decision() {
        let committer = DecisionCommitter::new(Arc::new(MemoryDecisionRegistry::new()));
        let calldata = committer.prepare_commit(&packet()).await.unwrap();
        assert_eq!(calldata.len(), 4 + 7 * 32);
    }

    #[tokio::test]
    async fn test_replay_check_fails_open_on_rpc_error() {
        // RPC failure degrades to a warning; the contract is the final
        // replay guard.
        let committer = DecisionCommitter::new(Arc::new(FailingRegistry));
        let calldata = committer.prepare_commit(&packet()).await.unwrap();
        assert_eq!(calldata.len(), 4 + 7 * 32);
    }

    #[tokio::test]
    async fn test_memory_registry_absent_record_has_zero_timestamp() {
        let registry = MemoryDecisionRegistry::new();
        let id = decision_id_word(&Uuid::new_v4());
        let record = registry.decision_record(&id).await.unwrap();
        assert_eq!(record.timestamp, 0);
        assert!(!registry.is_decision_logged(&id).await.unwrap());
    }
}
