//! Packet Module
//!
//! The canonical decision record:
//! - Decision packet with canonical JSON serialization
//! - Deterministic keccak256 hashing
//! - Interceptor binding user-visible output to the attested record

pub mod decision;
pub mod interceptor;

pub use decision::{canonical_json, hash_decision_packet, DecisionPacket};
pub use interceptor::{DecisionInterceptor, InterceptRequest};
