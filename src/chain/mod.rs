//! Chain Module
//!
//! On-chain commit and verify flow:
//! - Decision registry read boundary and `logDecision` calldata
//! - Best-effort replay protection before commit
//! - Content-addressed storage boundary
//! - Hash-equality verification for auditors

pub mod registry;
pub mod storage;
pub mod verify;

pub use registry::{
    decision_id_word, log_decision_calldata, DecisionCommitter, DecisionRecord,
    DecisionRegistry, MemoryDecisionRegistry, LOG_DECISION_SIGNATURE,
};
pub use storage::{ContentStore, MemoryContentStore};
pub use verify::{OnChainVerifier, VerificationOutcome, VerificationReport};
