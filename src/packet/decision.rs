//! Decision packet: the canonical, hashable record of one decision.
//!
//! The canonical JSON serialization (sorted keys, no insignificant
//! whitespace) is the only valid pre-image for every hash derived from a
//! packet.

use crate::core::{Bytes32, Result};
use crate::enclave::crypto::keccak256;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Canonical JSON for any serializable value: sorted keys, compact.
///
/// Serialization goes through `serde_json::Value`, whose object map is
/// ordered by key; rendering the value is therefore byte-stable for equal
/// field values.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String> {
    let value = serde_json::to_value(value)?;
    Ok(value.to_string())
}

/// The canonical record of one AI decision event.
///
/// Immutable once constructed. UUIDs and enums render as their string
/// forms in the canonical serialization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecisionPacket {
    /// Logical decision identity (stable across a session)
    pub decision_id: Uuid,
    /// Wallet the decision acts for
    pub wallet_address: String,
    /// The AI action taken
    pub ai_action: String,
    /// Sanitized summary of the user input
    pub input_summary: String,
    /// Hash binding what the user saw/signed
    pub decision_hash: Bytes32,
    /// Hash binding the model and action
    pub model_hash: Bytes32,
    /// FTSO price feed consulted, if any
    pub ftso_feed_id: Option<String>,
    /// FTSO round consulted, if any
    pub ftso_round_id: Option<u64>,
    /// FDC proof hash, if any
    pub fdc_proof_hash: Option<Bytes32>,
    /// UNIX timestamp (seconds)
    pub timestamp: u64,
    /// Backend signer address
    pub backend_signer: String,
    /// Human-readable subject (at most 50 characters)
    pub subject: String,
}

impl DecisionPacket {
    /// The canonical JSON form of this packet.
    pub fn to_canonical_json(&self) -> Result<String> {
        canonical_json(self)
    }

    /// Attach an FDC proof hash.
    pub fn with_fdc_proof_hash(mut self, hash: Bytes32) -> Self {
        self.fdc_proof_hash = Some(hash);
        self
    }
}

/// keccak256 over the packet's canonical JSON bytes.
pub fn hash_decision_packet(packet: &DecisionPacket) -> Result<Bytes32> {
    let json = packet.to_canonical_json()?;
    Ok(keccak256(json.as_bytes()))
}
