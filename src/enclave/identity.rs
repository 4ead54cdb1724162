//! Enclave identity: the process-lifetime signing keypair.
//!
//! Simulation mode uses a fixed, publicly-known test key so repeated test
//! runs do not re-register a new identity on-chain. Production mode
//! generates a fresh ephemeral keypair at every process start. The private
//! key is owned exclusively and is never serialized or logged.

use crate::core::{Bytes32, Result};
use crate::enclave::crypto::{EcdsaSuite, Signature65};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

/// Operating mode of the enclave identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnclaveMode {
    /// Fixed public test key, simulated quotes allowed
    Simulation,
    /// Ephemeral key, hardware quotes mandatory
    Production,
}

/// Fixed simulation signing key. Publicly known (a standard development
/// account); must never be used outside simulation mode.
const SIMULATION_SIGNING_KEY: [u8; 32] = [
    0xac, 0x09, 0x74, 0xbe, 0xc3, 0x9a, 0x17, 0xe3, 0x6b, 0xa4, 0xa6, 0xb4, 0xd2, 0x38,
    0xff, 0x94, 0x4b, 0xac, 0xb4, 0x78, 0xcb, 0xed, 0x5e, 0xfc, 0xae, 0x78, 0x4d, 0x7b,
    0xf4, 0xf2, 0xff, 0x80,
];

/// One signing identity per process lifetime.
pub struct EnclaveIdentity {
    mode: EnclaveMode,
    suite: EcdsaSuite,
    address: String,
}

impl EnclaveIdentity {
    /// Create the identity for the given mode.
    pub fn new(mode: EnclaveMode) -> Result<Self> {
        let suite = match mode {
            EnclaveMode::Simulation => EcdsaSuite::from_bytes(&SIMULATION_SIGNING_KEY)?,
            EnclaveMode::Production => EcdsaSuite::new(),
        };
        let address = suite.address();
        info!(?mode, %address, "enclave identity active");
        Ok(Self {
            mode,
            suite,
            address,
        })
    }

    /// Operating mode.
    pub fn mode(&self) -> EnclaveMode {
        self.mode
    }

    /// EIP-55 checksummed signing address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Uncompressed public key, `0x`-prefixed hex.
    pub fn public_key_hex(&self) -> String {
        format!("0x{}", hex::encode(self.suite.public_key_uncompressed()))
    }

    /// Report data bound into hardware quotes: sha256 over the raw
    /// 20-byte address. Links "this quote" to "this signing key".
    pub fn report_data(&self) -> Bytes32 {
        let digest = Sha256::digest(self.suite.address_bytes());
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Bytes32::new(bytes)
    }

    /// Sign a 32-byte digest with the enclave key.
    pub fn sign_digest(&self, digest: &Bytes32) -> Result<Signature65> {
        self.suite.sign_prehash(digest)
    }
}

impl std::fmt::Debug for EnclaveIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnclaveIdentity")
            .field("mode", &self.mode)
            .field("address", &self.address)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enclave::crypto::recover_address;

    #[test]
    fn test_simulation_identity_is_stable() {
        let a = EnclaveIdentity::new(EnclaveMode::Simulation).unwrap();
        let b = EnclaveIdentity::new(EnclaveMode::Simulation).unwrap();
        assert_eq!(a.address(), b.address());
        // The standard development account for the fixed key.
        assert_eq!(a.address(), "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
    }

    #[test]
    fn test_production_identity_is_ephemeral() {
        let a = EnclaveIdentity::new(EnclaveMode::Production).unwrap();
        let b = EnclaveIdentity::new(EnclaveMode::Production).unwrap();
        assert_ne!(a.address(), b.address());
    }

    #[test]
    fn test_report_data_binds_address() {
        let identity = EnclaveIdentity::new(EnclaveMode::Simulation).unwrap();
        let report = identity.report_data();
        assert!(!report.is_zero());
        // Stable across calls for the same key.
        assert_eq!(report, identity.report_data());
    }

    #[test]
    fn test_sign_digest_recovers_to_identity() {
        let identity = EnclaveIdentity::new(EnclaveMode::Simulation).unwrap();
        let digest = crate::enclave::crypto::keccak256(b"payload");
        let signature = identity.sign_digest(&digest).unwrap();
        assert_eq!(
            recover_address(&digest, &signature).unwrap(),
            identity.address()
        );
    }

    #[test]
    fn test_debug_does_not_leak_key_material() {
        let identity = EnclaveIdentity::new(EnclaveMode::Simulation).unwrap();
        let debug = format!("{identity:?}");
        assert!(debug.contains("address"));
        assert!(!debug.contains("suite"));
    }
}
