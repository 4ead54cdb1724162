//! Decision interceptor: builds the canonical packet immediately after
//! policy evaluation.
//!
//! `decision_hash` binds exactly what the user saw and what would be
//! signed; `model_hash` binds the model and action that produced it.

use crate::audit::{AuditEntry, SecureOperationsLog};
use crate::core::{unix_now, Result, TraceValue};
use crate::enclave::crypto::keccak256;
use crate::packet::decision::{canonical_json, DecisionPacket};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Maximum length of the human-readable subject, in characters.
const SUBJECT_MAX_CHARS: usize = 50;

/// Inputs to one interception.
#[derive(Clone, Debug)]
pub struct InterceptRequest {
    /// Wallet the decision acts for
    pub wallet_address: String,
    /// The AI action taken
    pub ai_action: String,
    /// Raw user input
    pub user_input: String,
    /// The AI response text shown to the user
    pub ai_response_text: String,
    /// The transaction the user would sign, if any
    pub transaction_data: serde_json::Value,
    /// Model identifier
    pub model_id: String,
    /// FTSO price feed consulted, if any
    pub ftso_feed_id: Option<String>,
    /// FTSO round consulted, if any
    pub ftso_round_id: Option<u64>,
    /// Stable decision identity, reused across a session
    pub decision_id: Option<Uuid>,
}

impl InterceptRequest {
    /// Create a request with the mandatory fields.
    pub fn new(
        wallet_address: &str,
        ai_action: &str,
        user_input: &str,
        ai_response_text: &str,
        model_id: &str,
    ) -> Self {
        Self {
            wallet_address: wallet_address.to_string(),
            ai_action: ai_action.to_string(),
            user_input: user_input.to_string(),
            ai_response_text: ai_response_text.to_string(),
            transaction_data: serde_json::Value::Null,
            model_id: model_id.to_string(),
            ftso_feed_id: None,
            ftso_round_id: None,
            decision_id: None,
        }
    }

    /// Attach the transaction the user would sign.
    pub fn with_transaction(mut self, transaction_data: serde_json::Value) -> Self {
        self.transaction_data = transaction_data;
        self
    }

    /// Attach FTSO oracle context.
    pub fn with_ftso(mut self, feed_id: &str, round_id: u64) -> Self {
        self.ftso_feed_id = Some(feed_id.to_string());
        self.ftso_round_id = Some(round_id);
        self
    }

    /// Reuse a stable decision identity across a session.
    pub fn with_decision_id(mut self, decision_id: Uuid) -> Self {
        self.decision_id = Some(decision_id);
        self
    }
}

/// Builds decision packets and records each interception in the
/// secure-operations log.
pub struct DecisionInterceptor {
    backend_signer: String,
    audit: Arc<SecureOperationsLog>,
}

impl DecisionInterceptor {
    /// Create an interceptor for a backend signer address.
    pub fn new(backend_signer: &str, audit: Arc<SecureOperationsLog>) -> Self {
        Self {
            backend_signer: backend_signer.to_string(),
            audit,
        }
    }

    /// Intercept one decision and produce its canonical packet.
    pub fn intercept(&self, request: InterceptRequest) -> Result<DecisionPacket> {
        // Bind exactly what the user saw and would sign.
        let bound = serde_json::json!({
            "text": request.ai_response_text,
            "transaction": request.transaction_data,
        });
        let decision_hash = keccak256(canonical_json(&bound)?.as_bytes());
        let model_hash = keccak256(
            format!("{}:{}", request.model_id, request.ai_action).as_bytes(),
        );

        let input_summary = sanitize(&request.user_input);
        let subject = truncate_chars(&input_summary, SUBJECT_MAX_CHARS);
        // A supplied id is preserved verbatim so repeated interactions in
        // one session commit to one logical decision identity.
        let decision_id = request.decision_id.unwrap_or_else(Uuid::new_v4);

        let packet = DecisionPacket {
            decision_id,
            wallet_address: request.wallet_address.clone(),
            ai_action: request.ai_action.clone(),
            input_summary,
            decision_hash,
            model_hash,
            ftso_feed_id: request.ftso_feed_id.clone(),
            ftso_round_id: request.ftso_round_id,
            fdc_proof_hash: None,
            timestamp: unix_now(),
            backend_signer: self.backend_signer.clone(),
            subject,
        };

        self.audit.append(
            AuditEntry::new(
                &request.wallet_address,
                "intercept_decision",
                &decision_id.to_string(),
            )
            .with_metadata("ai_action", TraceValue::text(request.ai_action))
            .with_metadata("model_id", TraceValue::text(request.model_id)),
        )?;
        debug!(%decision_id, "decision intercepted");
        Ok(packet)
    }
}

/// Replace control characters with spaces and collapse whitespace runs.
fn sanitize(input: &str) -> String {
    let filtered: String = input
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    filtered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate on a character boundary.
fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
