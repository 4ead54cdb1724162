//! Compliance policy gate over consensus results.
//!
//! A stateless post-hoc guardrail: it can veto a majority decision but
//! never mutates it. The engine applies the override.

use serde::{Deserialize, Serialize};

/// Reason code for a prohibited-pattern veto.
pub const REASON_PROHIBITED: &str = "PROHIBITED";
/// Reason code for a confidence-floor veto.
pub const REASON_REJECTED: &str = "REJECTED";

/// Compliance outcome attached to a consensus result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComplianceStatus {
    /// All checks passed
    #[serde(rename = "PASS")]
    Pass,
    /// The decision was vetoed
    #[serde(rename = "FAIL")]
    Fail,
}

/// Result of one compliance check. A veto is a normal outcome, not an
/// error.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ComplianceCheck {
    /// Whether the decision is compliant
    pub compliant: bool,
    /// Reason code when non-compliant
    pub reason: Option<String>,
}

impl ComplianceCheck {
    fn pass() -> Self {
        Self {
            compliant: true,
            reason: None,
        }
    }

    fn veto(reason: &str) -> Self {
        Self {
            compliant: false,
            reason: Some(reason.to_string()),
        }
    }
}

/// Stateless compliance policy engine.
///
/// Rules are evaluated in fixed order; the first match wins:
/// 1. prohibited-concentration phrases in the task text
/// 2. confidence below the floor
#[derive(Clone, Debug)]
pub struct PolicyEngine {
    prohibited_phrases: Vec<String>,
    confidence_floor: f64,
}

impl PolicyEngine {
    /// Create with explicit phrases and confidence floor.
    pub fn new(prohibited_phrases: Vec<String>, confidence_floor: f64) -> Self {
        Self {
            prohibited_phrases: prohibited_phrases
                .into_iter()
                .map(|p| p.to_lowercase())
                .collect(),
            confidence_floor,
        }
    }

    /// Check a decision against the compliance rules. Pure: no side
    /// effects, no state.
    pub fn check_compliance(
        &self,
        task: &str,
        _decision: &str,
        confidence: f64,
    ) -> ComplianceCheck {
        let task_lower = task.to_lowercase();
        if self
            .prohibited_phrases
            .iter()
            .any(|phrase| task_lower.contains(phrase.as_str()))
        {
            return ComplianceCheck::veto(REASON_PROHIBITED);
        }
        if confidence < self.confidence_floor {
            return ComplianceCheck::veto(REASON_REJECTED);
        }
        ComplianceCheck::pass()
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new(
            vec![
                "all-in".to_string(),
                "all in".to_string(),
                "100%".to_string(),
            ],
            0.70,
        )
    }
}
