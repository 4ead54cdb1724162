//! Error types for VEDA.

use thiserror::Error;

/// Result type alias for VEDA operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in VEDA operations.
///
/// Compliance vetoes and permission denials are *not* errors; they are
/// ordinary outcomes carried by `ComplianceCheck` and `PermissionDecision`.
/// The variants here are reserved for true failures that must propagate.
#[derive(Error, Debug)]
pub enum Error {
    // Engine errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("integrity error: {0}")]
    Integrity(String),

    // Attestation errors
    #[error("attestation failed: {0}")]
    Attestation(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    // Chain errors
    #[error("decision already logged: {0}")]
    DuplicateDecision(String),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("storage error: {0}")]
    Storage(String),

    // Serialization errors
    #[error("serialization error: {0}")]
    Serialization(String),

    // Generic errors
    #[error("internal error: {0}")]
    Internal(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
