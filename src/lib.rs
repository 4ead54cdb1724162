//! # VEDA - Verifiable Enclave Decision Attestation
//!
//! A multi-agent decision and attestation pipeline providing:
//! - **Consensus**: agent orchestration, conflict detection/resolution and
//!   aggregation with a compliance veto
//! - **Enclave**: a hardware-bindable signing identity with EIP-712
//!   typed-data signatures
//! - **Packet**: canonical, hashable decision records with on-chain
//!   commit/verify flow
//! - **Permissions**: a spending/policy gate over wallet transactions
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use veda::consensus::{ConsensusEngine, EngineConfig, RegisteredAgent};
//!
//! #[tokio::main]
//! async fn main() {
//!     let agents: Vec<RegisteredAgent> = Vec::new(); // supply real agents
//!     let mut engine = ConsensusEngine::new(agents, EngineConfig::default()).unwrap();
//!     let result = engine.run("rebalance the treasury").await.unwrap();
//!     println!("decision: {}", result.final_decision);
//! }
//! ```

pub mod audit;
pub mod chain;
pub mod compliance;
pub mod consensus;
pub mod core;
pub mod enclave;
pub mod packet;
pub mod permissions;

pub use crate::core::error::{Error, Result};

/// Install the global tracing subscriber, honoring `RUST_LOG`.
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
