//! Attestation service binding decisions to the enclave identity and a
//! hardware quote.
//!
//! Failure asymmetry is deliberate: a missing quote falls back to a fixed
//! sentinel token in simulation, but is fatal in production. No decision
//! may be attested in production without a real quote.

use crate::core::{Error, Result};
use crate::enclave::identity::{EnclaveIdentity, EnclaveMode};
use crate::enclave::typed_data::{sign_decision, DecisionInput, Eip712Domain};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Audience claim requested for attestation tokens.
pub const TOKEN_AUDIENCE: &str = "veda-attestation";
/// Token type requested from the quote provider.
pub const TOKEN_TYPE: &str = "OIDC";
/// Sentinel token substituted when quote retrieval fails in simulation.
pub const SIMULATED_FALLBACK_TOKEN: &str = "simulated.attestation.token";

/// Hardware quote boundary. Production wires this to the local attestation
/// socket; tests and simulation use [`SimulatedQuoteProvider`].
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Request a quote token with the given nonces bound as report data.
    async fn get_token(
        &self,
        nonces: &[Vec<u8>],
        audience: &str,
        token_type: &str,
    ) -> Result<String>;
}

/// Deterministic, file-free simulated quote provider: produces a
/// JWT-shaped token over the requested nonces.
pub struct SimulatedQuoteProvider;

#[async_trait]
impl QuoteProvider for SimulatedQuoteProvider {
    async fn get_token(
        &self,
        nonces: &[Vec<u8>],
        audience: &str,
        token_type: &str,
    ) -> Result<String> {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let nonce_hex: Vec<String> = nonces.iter().map(hex::encode).collect();
        let payload = serde_json::json!({
            "aud": audience,
            "iss": "veda-simulated-tee",
            "token_type": token_type,
            "nonces": nonce_hex,
        });
        let payload_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload)?);
        Ok(format!("{header}.{payload_b64}."))
    }
}

/// Quote section of an attestation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Quote {
    /// Attestation token
    pub token: String,
    /// Report data bound into the quote (hex)
    pub report_data: String,
    /// Enclave public key (uncompressed, hex)
    pub enclave_public_key: String,
}

/// A signed, quote-bound attestation of one decision.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Attestation {
    /// Attestation format version
    pub version: String,
    /// TEE provider identifier
    pub tee_provider: String,
    /// The hardware quote binding
    pub quote: Quote,
    /// EIP-712 signature over the decision struct (hex)
    pub signature: String,
    /// Certification status of the quote path
    pub certification_status: String,
}

/// Attestation service over one enclave identity and one quote provider.
pub struct AttestationService {
    identity: EnclaveIdentity,
    provider: Box<dyn QuoteProvider>,
    domain: Eip712Domain,
}

impl AttestationService {
    /// Create the service. In production mode the quote path is probed at
    /// startup and the service refuses to come up without it (fail-closed);
    /// silent fallback to simulation is forbidden.
    pub async fn new(
        identity: EnclaveIdentity,
        provider: Box<dyn QuoteProvider>,
        domain: Eip712Domain,
    ) -> Result<Self> {
        if identity.mode() == EnclaveMode::Production {
            let probe = identity.report_data();
            provider
                .get_token(&[probe.as_bytes().to_vec()], TOKEN_AUDIENCE, TOKEN_TYPE)
                .await
                .map_err(|e| {
                    Error::Attestation(format!(
                        "hardware quote path unavailable at startup: {e}"
                    ))
                })?;
        }
        info!(mode = ?identity.mode(), address = identity.address(), "attestation service ready");
        Ok(Self {
            identity,
            provider,
            domain,
        })
    }

    /// The enclave identity backing this service.
    pub fn identity(&self) -> &EnclaveIdentity {
        &self.identity
    }

    /// Sign a decision struct under the service's EIP-712 domain.
    pub fn sign_decision(&self, input: &DecisionInput) -> Result<crate::enclave::crypto::Signature65> {
        sign_decision(&self.identity, &self.domain, input)
    }

    /// Produce a signed, quote-bound attestation for a decision.
    pub async fn generate_attestation(&self, input: &DecisionInput) -> Result<Attestation> {
        let report_data = self.identity.report_data();
        let token = match self
            .provider
            .get_token(&[report_data.as_bytes().to_vec()], TOKEN_AUDIENCE, TOKEN_TYPE)
            .await
        {
            Ok(token) => token,
            Err(err) => match self.identity.mode() {
                EnclaveMode::Simulation => {
                    warn!(error = %err, "quote retrieval failed; using simulated sentinel");
                    SIMULATED_FALLBACK_TOKEN.to_string()
                }
                EnclaveMode::Production => {
                    return Err(Error::Attestation(format!(
                        "quote retrieval failed: {err}"
                    )));
                }
            },
        };

        let signature = self.sign_decision(input)?;
        let (tee_provider, certification_status) = match self.identity.mode() {
            EnclaveMode::Simulation => ("simulated-tee", "simulated"),
            EnclaveMode::Production => ("intel-tdx", "hardware-attested"),
        };

        Ok(Attestation {
            version: "1.0".to_string(),
            tee_provider: tee_provider.to_string(),
            quote: Quote {
                token,
                report_data: report_data.to_hex(),
                enclave_public_key: self.identity.public_key_hex(),
            },
            signature: signature.to_hex(),
            certification_status: certification_status.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enclave::crypto::{recover_address, Signature65};
    use crate::enclave::typed_data::signing_digest;

    struct FailingQuoteProvider;

    #[async_trait]
    impl QuoteProvider for FailingQuoteProvider {
        async fn get_token(
            &self,
            _nonces: &[Vec<u8>],
            _audience: &str,
            _token_type: &str,
        ) -> Result<String> {
            Err(Error::Attestation("socket unavailable".to_string()))
        }
    }

    fn domain() -> Eip712Domain {
        Eip712Domain::new(14, "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed")
    }

    fn input() -> DecisionInput {
        DecisionInput {
            id: "dec-100".to_string(),
            reasons: "test".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_simulated_token_is_deterministic() {
        let provider = SimulatedQuoteProvider;
        let a = provider
            .get_token(&[vec![1, 2, 3]], TOKEN_AUDIENCE, TOKEN_TYPE)
            .await
            .unwrap();
        let b = provider
            .get_token(&[vec![1, 2, 3]], TOKEN_AUDIENCE, TOKEN_TYPE)
            .await
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.matches('.').count(), 2);
    }

    #[tokio::test]
    async fn test_attestation_binds_report_data_and_signature() {
        let identity = EnclaveIdentity::new(EnclaveMode::Simulation).unwrap();
        let expected_address = identity.address().to_string();
        let service =
            AttestationService::new(identity, Box::new(SimulatedQuoteProvider), domain())
                .await
                .unwrap();

        let decision = input();
        let attestation = service.generate_attestation(&decision).await.unwrap();
        assert_eq!(attestation.version, "1.0");
        assert_eq!(attestation.certification_status, "simulated");
        assert!(attestation.quote.report_data.starts_with("0x"));

        // The packaged signature recovers to the enclave address.
        let raw = hex::decode(attestation.signature.trim_start_matches("0x")).unwrap();
        let mut sig = [0u8; 65];
        sig.copy_from_slice(&raw);
        let digest = signing_digest(&domain(), &decision);
        assert_eq!(
            recover_address(&digest, &Signature65(sig)).unwrap(),
            expected_address
        );
    }

    #[tokio::test]
    async fn test_simulation_falls_back_on_quote_failure() {
        let identity = EnclaveIdentity::new(EnclaveMode::Simulation).unwrap();
        let service =
            AttestationService::new(identity, Box::new(FailingQuoteProvider), domain())
                .await
                .unwrap();
        let attestation = service.generate_attestation(&input()).await.unwrap();
        assert_eq!(attestation.quote.token, SIMULATED_FALLBACK_TOKEN);
    }

    #[tokio::test]
    async fn test_production_fails_closed_at_startup() {
        let identity = EnclaveIdentity::new(EnclaveMode::Production).unwrap();
        let result =
            AttestationService::new(identity, Box::new(FailingQuoteProvider), domain()).await;
        assert!(matches!(result, Err(Error::Attestation(_))));
    }

    #[tokio::test]
    async fn test_production_attestation_uses_hardware_status() {
        let identity = EnclaveIdentity::new(EnclaveMode::Production).unwrap();
        let service =
            AttestationService::new(identity, Box::new(SimulatedQuoteProvider), domain())
                .await
                .unwrap();
        let attestation = service.generate_attestation(&input()).await.unwrap();
        assert_eq!(attestation.certification_status, "hardware-attested");
        assert_eq!(attestation.tee_provider, "intel-tdx");
    }
}
