//! EIP-712 typed-data hashing and signing for decision structs.
//!
//! The `Decision` type mirrors the on-chain verifier contract's typehash
//! exactly: variable-length string fields are keccak-hashed *before* being
//! placed into the struct, because the typehash only carries the hashed
//! forms.

use crate::core::{Bytes32, Result};
use crate::enclave::crypto::{keccak256, keccak256_multi, parse_address, Signature65};
use crate::enclave::identity::EnclaveIdentity;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// EIP-712 domain type string.
pub const DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

/// Decision type string; field order matches the verifier contract.
pub const DECISION_TYPE: &str = "Decision(string id,address user,uint8 action,string asset,\
uint256 amount,string fromProtocol,string toProtocol,uint256 confidenceScore,\
bytes32 reasonsHash,bytes32 dataSourcesHash,bytes32 alternativesHash,bytes32 onChainHash,\
bytes32 modelCidHash,bytes32 xaiCidHash)";

/// EIP-712 signing domain.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Eip712Domain {
    /// Domain name
    pub name: String,
    /// Domain version
    pub version: String,
    /// Chain ID
    pub chain_id: u64,
    /// Verifying contract address
    pub verifying_contract: String,
}

impl Eip712Domain {
    /// Conventional domain for the decision verifier contract.
    pub fn new(chain_id: u64, verifying_contract: &str) -> Self {
        Self {
            name: "VedaDecisionVerifier".to_string(),
            version: "1".to_string(),
            chain_id,
            verifying_contract: verifying_contract.to_string(),
        }
    }

    /// The domain separator hash.
    pub fn separator(&self) -> Bytes32 {
        let typehash = keccak256(DOMAIN_TYPE.as_bytes());
        let name_hash = keccak256(self.name.as_bytes());
        let version_hash = keccak256(self.version.as_bytes());
        let chain_word = uint_word(self.chain_id as u128);
        let contract_word = address_word(&self.verifying_contract);
        keccak256_multi(&[
            typehash.as_bytes(),
            name_hash.as_bytes(),
            version_hash.as_bytes(),
            &chain_word,
            &contract_word,
        ])
    }
}

/// The decision action enum mirrored on-chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionAction {
    Allocate = 0,
    Reallocate = 1,
    Deallocate = 2,
    Hold = 3,
}

impl DecisionAction {
    /// Parse a named action, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_uppercase().as_str() {
            "ALLOCATE" => Some(DecisionAction::Allocate),
            "REALLOCATE" => Some(DecisionAction::Reallocate),
            "DEALLOCATE" => Some(DecisionAction::Deallocate),
            "HOLD" => Some(DecisionAction::Hold),
            _ => None,
        }
    }

    /// The on-chain `uint8` code.
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Action field as supplied by callers: a name or a raw code.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionField {
    /// Raw numeric code, used as-is
    Code(u64),
    /// Named action, mapped through the fixed enum
    Name(String),
}

impl ActionField {
    /// Resolve to the on-chain `uint8` code.
    pub fn code(&self) -> u8 {
        match self {
            ActionField::Code(code) => *code as u8,
            ActionField::Name(name) => match DecisionAction::from_name(name) {
                Some(action) => action.code(),
                None => {
                    warn!(action = %name, "unknown action name; defaulting to HOLD");
                    DecisionAction::Hold.code()
                }
            },
        }
    }
}

impl Default for ActionField {
    fn default() -> Self {
        ActionField::Name("HOLD".to_string())
    }
}

/// Amount field as supplied by callers: a number or free-form text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountField {
    /// Raw integer amount
    Number(u64),
    /// Text amount; non-digit characters are stripped before parsing
    Text(String),
}

impl AmountField {
    /// Resolve to the on-chain `uint256` value.
    pub fn value(&self) -> u128 {
        match self {
            AmountField::Number(n) => *n as u128,
            AmountField::Text(s) => {
                let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
                if digits.is_empty() {
                    return 0;
                }
                digits.parse().unwrap_or_else(|_| {
                    warn!(amount = %s, "amount overflows uint128; using 0");
                    0
                })
            }
        }
    }
}

impl Default for AmountField {
    fn default() -> Self {
        AmountField::Number(0)
    }
}

/// Decision data to sign. Field names follow the wire form the route layer
/// produces.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DecisionInput {
    /// Decision identifier
    pub id: String,
    /// Acting user address
    pub user: String,
    /// Action taken
    pub action: ActionField,
    /// Asset acted on
    pub asset: String,
    /// Amount, in base units
    pub amount: AmountField,
    /// Source protocol
    pub from_protocol: String,
    /// Destination protocol
    pub to_protocol: String,
    /// Confidence score, integer basis
    pub confidence_score: u64,
    /// Reasoning text
    pub reasons: String,
    /// Data sources consulted
    pub data_sources: String,
    /// Alternatives considered
    pub alternatives: String,
    /// Pre-computed on-chain hash, if any
    pub on_chain_hash: Option<String>,
    /// Model content id
    pub model_cid: String,
    /// Explainability trail content id
    pub xai_cid: String,
}

/// keccak256 over a string's UTF-8 bytes. The empty string hashes to
/// keccak256(""), not to a zero word.
pub fn hash_utf8(s: &str) -> Bytes32 {
    keccak256(s.as_bytes())
}

/// Resolve a caller-supplied bytes32 field: a 64-hex-character string is
/// used verbatim as raw bytes; any other non-empty value is keccak-hashed;
/// a missing or empty value becomes 32 zero bytes.
pub fn bytes32_field(value: Option<&str>) -> Bytes32 {
    let s = match value {
        Some(s) if !s.is_empty() => s,
        _ => return Bytes32::zero(),
    };
    let bare = s.strip_prefix("0x").unwrap_or(s);
    if bare.len() == 64 {
        if let Ok(parsed) = Bytes32::from_hex(bare) {
            return parsed;
        }
    }
    keccak256(s.as_bytes())
}

/// ABI word for an address. A value that does not validate degrades to the
/// zero address rather than failing the signature.
pub fn address_word(value: &str) -> [u8; 32] {
    let mut word = [0u8; 32];
    match parse_address(value) {
        Some(bytes) => word[12..].copy_from_slice(&bytes),
        None => {
            warn!(address = %value, "invalid address; substituting zero address");
        }
    }
    word
}

/// ABI word for an unsigned integer.
pub fn uint_word(value: u128) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

/// EIP-712 struct hash of a decision.
pub fn decision_struct_hash(input: &DecisionInput) -> Bytes32 {
    let typehash = keccak256(DECISION_TYPE.as_bytes());
    let id_hash = hash_utf8(&input.id);
    let user_word = address_word(&input.user);
    let action_word = uint_word(input.action.code() as u128);
    let asset_hash = hash_utf8(&input.asset);
    let amount_word = uint_word(input.amount.value());
    let from_hash = hash_utf8(&input.from_protocol);
    let to_hash = hash_utf8(&input.to_protocol);
    let confidence_word = uint_word(input.confidence_score as u128);
    let reasons_hash = hash_utf8(&input.reasons);
    let sources_hash = hash_utf8(&input.data_sources);
    let alternatives_hash = hash_utf8(&input.alternatives);
    let on_chain = bytes32_field(input.on_chain_hash.as_deref());
    let model_cid_hash = hash_utf8(&input.model_cid);
    let xai_cid_hash = hash_utf8(&input.xai_cid);

    keccak256_multi(&[
        typehash.as_bytes(),
        id_hash.as_bytes(),
        &user_word,
        &action_word,
        asset_hash.as_bytes(),
        &amount_word,
        from_hash.as_bytes(),
        to_hash.as_bytes(),
        &confidence_word,
        reasons_hash.as_bytes(),
        sources_hash.as_bytes(),
        alternatives_hash.as_bytes(),
        on_chain.as_bytes(),
        model_cid_hash.as_bytes(),
        xai_cid_hash.as_bytes(),
    ])
}

/// The final EIP-712 signing digest: `keccak256(0x1901 || domain || struct)`.
pub fn signing_digest(domain: &Eip712Domain, input: &DecisionInput) -> Bytes32 {
    let separator = domain.separator();
    let struct_hash = decision_struct_hash(input);
    keccak256_multi(&[b"\x19\x01", separator.as_bytes(), struct_hash.as_bytes()])
}

/// Sign a decision struct with the enclave identity.
pub fn sign_decision(
    identity: &EnclaveIdentity,
    domain: &Eip712Domain,
    input: &DecisionInput,
) -> Result<Signature65> {
    let digest = signing_digest(domain, input);
    identity.sign_digest(&digest)
}
