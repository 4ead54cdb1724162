//! Agent boundary for consensus rounds.
//!
//! The LLM-calling collaborator supplies [`Agent`] implementations; the
//! engine treats them as opaque and tolerates failures and timeouts.

use crate::core::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Decision returned by a reasoning agent.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentDecision {
    /// The decision label or numeric estimate, as text
    pub decision: String,
    /// Free-text justification
    pub justification: String,
    /// Confidence score (0-1)
    pub confidence: f64,
    /// Risk score (0-1)
    pub risk_score: f64,
}

/// An agent invocation boundary.
///
/// `run` may fail or hang; the coordinator coerces failures to fallback
/// predictions and excludes agents that exceed the round timeout.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Stable agent identifier.
    fn id(&self) -> &str;

    /// Produce a decision for the given task.
    async fn run(&self, task: &str) -> Result<AgentDecision>;
}

/// The value carried by a prediction: a free-text label or a numeric
/// estimate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredictionValue {
    /// Numeric estimate
    Number(f64),
    /// Text label
    Text(String),
}

impl PredictionValue {
    /// Numeric view, if this value is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            PredictionValue::Number(n) => Some(*n),
            PredictionValue::Text(_) => None,
        }
    }

    /// Canonical string form, used to group predictions by value.
    pub fn label(&self) -> String {
        match self {
            PredictionValue::Number(n) => format!("{}", n),
            PredictionValue::Text(s) => s.clone(),
        }
    }

    /// Parse a decision string: numeric text becomes a `Number`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => PredictionValue::Number(n),
            _ => PredictionValue::Text(trimmed.to_string()),
        }
    }
}

impl std::fmt::Display for PredictionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One agent's prediction for one task. Immutable once produced.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Prediction {
    /// Agent that produced the prediction
    pub agent_id: String,
    /// Predicted value
    pub value: PredictionValue,
    /// Confidence score (0-1)
    pub confidence: f64,
}

impl Prediction {
    /// Create a new prediction, clamping confidence into [0, 1].
    pub fn new(agent_id: &str, value: PredictionValue, confidence: f64) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            value,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// One agent's decision as surfaced in a consensus result.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndividualDecision {
    /// Agent that produced the decision
    pub agent_id: String,
    /// Decision label
    pub decision: String,
    /// Justification
    pub justification: String,
    /// Confidence score (0-1)
    pub confidence: f64,
    /// Risk score (0-1)
    pub risk_score: f64,
}

impl IndividualDecision {
    /// Build from an agent's raw decision.
    pub fn from_decision(agent_id: &str, decision: &AgentDecision) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            decision: decision.decision.clone(),
            justification: decision.justification.clone(),
            confidence: decision.confidence.clamp(0.0, 1.0),
            risk_score: decision.risk_score.clamp(0.0, 1.0),
        }
    }
}

/// Static profile of a registered agent: routing weight and per-domain
/// expertise scores.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Agent identifier (must match `Agent::id`)
    pub id: String,
    /// Voting weight (0-1)
    pub weight: f64,
    /// Domain expertise scores (0-1) keyed by domain name
    pub expertise: HashMap<String, f64>,
}

impl AgentProfile {
    /// Create a new profile with weight 1.0 and no expertise data.
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            weight: 1.0,
            expertise: HashMap::new(),
        }
    }

    /// Set the voting weight.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight.clamp(0.0, 1.0);
        self
    }

    /// Add a domain expertise score.
    pub fn with_expertise(mut self, domain: &str, score: f64) -> Self {
        self.expertise
            .insert(domain.to_string(), score.clamp(0.0, 1.0));
        self
    }

    /// Expertise score for a domain, if known.
    pub fn expertise_in(&self, domain: &str) -> Option<f64> {
        self.expertise.get(domain).copied()
    }
}

/// An agent registered with the consensus engine: implementation + profile.
#[derive(Clone)]
pub struct RegisteredAgent {
    /// Static profile
    pub profile: AgentProfile,
    /// Agent implementation
    pub agent: Arc<dyn Agent>,
}

impl RegisteredAgent {
    /// Register an agent with the given profile.
    pub fn new(agent: Arc<dyn Agent>, profile: AgentProfile) -> Self {
        Self { profile, agent }
    }

    /// Register an agent with a default profile derived from its id.
    pub fn with_defaults(agent: Arc<dyn Agent>) -> Self {
        let profile = AgentProfile::new(agent.id());
        Self { profile, agent }
    }
}

impl std::fmt::Debug for RegisteredAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredAgent")
            .field("profile", &self.profile)
            .finish()
    }
}
