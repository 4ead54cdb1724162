//! Cryptographic utilities for the enclave identity.
//!
//! Provides keccak256 hashing and secp256k1 recoverable signing with
//! Ethereum-style addresses.

use crate::core::{Bytes32, Error, Result};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use sha3::{Digest, Keccak256};

/// Compute keccak256 of data.
pub fn keccak256(data: &[u8]) -> Bytes32 {
    let result = Keccak256::digest(data);
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&result);
    Bytes32::new(bytes)
}

/// Compute keccak256 over multiple data chunks.
pub fn keccak256_multi(chunks: &[&[u8]]) -> Bytes32 {
    let mut hasher = Keccak256::new();
    for chunk in chunks {
        hasher.update(chunk);
    }
    let result = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&result);
    Bytes32::new(bytes)
}

/// A 65-byte recoverable ECDSA signature (`r || s || v`, v in {27, 28}).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature65(pub [u8; 65]);

impl Signature65 {
    /// The raw signature bytes.
    pub fn as_bytes(&self) -> &[u8; 65] {
        &self.0
    }

    /// The recovery byte (27 or 28).
    pub fn v(&self) -> u8 {
        self.0[64]
    }

    /// Hex encoding with `0x` prefix.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl std::fmt::Debug for Signature65 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature65({})", self.to_hex())
    }
}

/// secp256k1 signing suite with an Ethereum-style address.
#[derive(Clone)]
pub struct EcdsaSuite {
    signing_key: SigningKey,
}

impl EcdsaSuite {
    /// Create a suite with a fresh random keypair.
    pub fn new() -> Self {
        Self {
            signing_key: SigningKey::random(&mut rand::rngs::OsRng),
        }
    }

    /// Create from raw signing key bytes.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self> {
        let signing_key = SigningKey::from_bytes(bytes.into())
            .map_err(|e| Error::InvalidKeyFormat(e.to_string()))?;
        Ok(Self { signing_key })
    }

    /// The verifying (public) key.
    pub fn verifying_key(&self) -> VerifyingKey {
        *self.signing_key.verifying_key()
    }

    /// Uncompressed SEC1 public key bytes (65 bytes, `0x04` prefix).
    pub fn public_key_uncompressed(&self) -> Vec<u8> {
        self.verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec()
    }

    /// Raw 20-byte Ethereum address: keccak256 of the uncompressed public
    /// key tail, last 20 bytes.
    pub fn address_bytes(&self) -> [u8; 20] {
        address_from_verifying_key(&self.verifying_key())
    }

    /// EIP-55 checksummed address.
    pub fn address(&self) -> String {
        to_checksum_address(&self.address_bytes())
    }

    /// Sign a 32-byte prehash, returning a recoverable signature.
    pub fn sign_prehash(&self, digest: &Bytes32) -> Result<Signature65> {
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(digest.as_bytes())
            .map_err(|e| Error::Signing(e.to_string()))?;
        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&signature.to_bytes());
        out[64] = 27 + recovery_id.to_byte();
        Ok(Signature65(out))
    }
}

impl Default for EcdsaSuite {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EcdsaSuite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The signing key never appears in debug output.
        f.debug_struct("EcdsaSuite")
            .field("address", &self.address())
            .finish()
    }
}

/// Derive the 20-byte address for a verifying key.
pub fn address_from_verifying_key(key: &VerifyingKey) -> [u8; 20] {
    let point = key.to_encoded_point(false);
    // Skip the 0x04 prefix; hash the 64-byte coordinate pair.
    let digest = keccak256(&point.as_bytes()[1..]);
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest.as_bytes()[12..]);
    out
}

/// EIP-55 checksummed rendering of a raw address.
pub fn to_checksum_address(bytes: &[u8; 20]) -> String {
    let lower = hex::encode(bytes);
    let digest = keccak256(lower.as_bytes());
    let hash_hex = hex::encode(digest.as_bytes());
    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = hash_hex.as_bytes()[i];
        // Alphabetic hex chars uppercase where the checksum nibble >= 8.
        if c.is_ascii_alphabetic() && matches!(nibble, b'8'..=b'9' | b'a'..=b'f') {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Parse and validate an address string. All-lowercase and all-uppercase
/// hex are accepted; mixed case must satisfy the EIP-55 checksum.
pub fn parse_address(s: &str) -> Option<[u8; 20]> {
    let hexpart = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    if hexpart.len() != 40 || !hexpart.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let decoded = hex::decode(hexpart).ok()?;
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&decoded);

    let has_upper = hexpart.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = hexpart.chars().any(|c| c.is_ascii_lowercase());
    if has_upper && has_lower {
        let checksummed = to_checksum_address(&bytes);
        if checksummed[2..] != *hexpart {
            return None;
        }
    }
    Some(bytes)
}

/// Recover the checksummed signer address from a prehash signature.
pub fn recover_address(digest: &Bytes32, signature: &Signature65) -> Result<String> {
    let sig = Signature::from_slice(&signature.0[..64])
        .map_err(|e| Error::InvalidKeyFormat(e.to_string()))?;
    let recovery_byte = signature.0[64].checked_sub(27).ok_or_else(|| {
        Error::InvalidKeyFormat("recovery byte below 27".to_string())
    })?;
    let recovery_id = RecoveryId::from_byte(recovery_byte)
        .ok_or_else(|| Error::InvalidKeyFormat("invalid recovery byte".to_string()))?;
    let key = VerifyingKey::recover_from_prehash(digest.as_bytes(), &sig, recovery_id)
        .map_err(|e| Error::Signing(e.to_string()))?;
    Ok(to_checksum_address(&address_from_verifying_key(&key)))
}
