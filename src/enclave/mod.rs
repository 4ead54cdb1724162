//! Enclave Module
//!
//! Hardware-bound signing identity:
//! - keccak256 / secp256k1 crypto suite with recoverable signatures
//! - Process-lifetime enclave identity with report-data binding
//! - EIP-712 typed-data signing of decision structs
//! - Attestation service wrapping identity + quote provider

pub mod attestation;
pub mod crypto;
pub mod identity;
pub mod typed_data;

pub use attestation::{
    Attestation, AttestationService, Quote, QuoteProvider, SimulatedQuoteProvider,
};
pub use crypto::{keccak256, keccak256_multi, EcdsaSuite, Signature65};
pub use identity::{EnclaveIdentity, EnclaveMode};
pub use typed_data::{
    sign_decision, signing_digest, ActionField, AmountField, DecisionAction, DecisionInput,
    Eip712Domain,
};
