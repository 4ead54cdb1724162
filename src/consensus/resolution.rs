//! Conflict resolution strategies.
//!
//! Resolvers are scanned in registration order; the first whose
//! `can_handle` matches takes the conflict. Weighted voting is the
//! universal fallback.

use crate::consensus::agent::{Prediction, PredictionValue};
use crate::consensus::conflict::{ConflictContext, ConflictType, DetectionContext};
use serde::{Deserialize, Serialize};

/// Synthetic agent id attached to weighted-voting consensus predictions.
pub const WEIGHTED_VOTING_AGENT: &str = "consensus_weighted_voting";

/// Terminal outcome of resolving one conflict.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolutionResult {
    /// The prediction that replaces the conflicting set
    pub resolved_prediction: Prediction,
    /// Resolution method name
    pub method: String,
    /// Signed change applied to the prediction's confidence
    pub confidence_adjustment: f64,
    /// Human-readable account of the resolution
    pub rationale: String,
}

/// A conflict resolution strategy.
pub trait ConflictResolver: Send + Sync {
    /// Resolver name, used in traces and hybrid annotations.
    fn name(&self) -> &str;

    /// Whether this resolver handles the given conflict kind.
    fn can_handle(&self, conflict_type: &ConflictType) -> bool;

    /// Resolve a conflict into a single prediction.
    fn resolve(&self, conflict: &ConflictContext, context: &DetectionContext)
        -> ResolutionResult;
}

/// Route a conflict to the first matching resolver, falling back to
/// weighted voting when none matches.
pub fn route_conflict(
    resolvers: &[Box<dyn ConflictResolver>],
    conflict: &ConflictContext,
    context: &DetectionContext,
) -> ResolutionResult {
    for resolver in resolvers {
        if resolver.can_handle(&conflict.conflict_type) {
            return resolver.resolve(conflict, context);
        }
    }
    WeightedVotingResolver::new().resolve(conflict, context)
}

/// Groups predictions by value and picks the group with the highest
/// `agent_weight x confidence` score.
pub struct WeightedVotingResolver;

impl WeightedVotingResolver {
    /// Create a new weighted-voting resolver.
    pub fn new() -> Self {
        Self
    }
}

impl Default for WeightedVotingResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConflictResolver for WeightedVotingResolver {
    fn name(&self) -> &str {
        "weighted_voting"
    }

    fn can_handle(&self, conflict_type: &ConflictType) -> bool {
        matches!(
            conflict_type,
            ConflictType::ValueDisagreement
                | ConflictType::ConfidenceMismatch
                | ConflictType::Outlier
                | ConflictType::TemporalInconsistency
                | ConflictType::SystematicBias
        )
    }

    fn resolve(
        &self,
        conflict: &ConflictContext,
        context: &DetectionContext,
    ) -> ResolutionResult {
        // Group by value label in first-seen order; score each group by the
        // sum of weight x confidence over its members.
        let mut groups: Vec<(String, Vec<&Prediction>, f64)> = Vec::new();
        for p in &conflict.conflicting_predictions {
            let label = p.value.label();
            let score = context.weight_of(&p.agent_id) * p.confidence;
            match groups.iter_mut().find(|(l, _, _)| *l == label) {
                Some((_, members, total)) => {
                    members.push(p);
                    *total += score;
                }
                None => groups.push((label, vec![p], score)),
            }
        }

        let mut winner = &groups[0];
        for group in &groups[1..] {
            if group.2 > winner.2 {
                winner = group;
            }
        }

        let mean_confidence =
            winner.1.iter().map(|p| p.confidence).sum::<f64>() / winner.1.len() as f64;
        // Strictly reduced to reflect residual disagreement.
        let confidence = 0.9 * mean_confidence;

        let resolved = Prediction::new(
            WEIGHTED_VOTING_AGENT,
            winner.1[0].value.clone(),
            confidence,
        );
        ResolutionResult {
            resolved_prediction: resolved,
            method: "weighted_voting".to_string(),
            confidence_adjustment: confidence - mean_confidence,
            rationale: format!(
                "value '{}' won weighted voting with score {:.3} across {} group(s)",
                winner.0,
                winner.2,
                groups.len()
            ),
        }
    }
}

/// Defers to the single highest-scoring domain expert, falling back to the
/// highest raw confidence when no expertise data exists.
pub struct ExpertiseBasedResolver;

impl ExpertiseBasedResolver {
    /// Create a new expertise-based resolver.
    pub fn new() -> Self {
        Self
    }
}

impl Default for ExpertiseBasedResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConflictResolver for ExpertiseBasedResolver {
    fn name(&self) -> &str {
        "expertise_deference"
    }

    fn can_handle(&self, conflict_type: &ConflictType) -> bool {
        matches!(conflict_type, ConflictType::ExpertiseConflict)
    }

    fn resolve(
        &self,
        conflict: &ConflictContext,
        context: &DetectionContext,
    ) -> ResolutionResult {
        let domain = context.domain.as_deref().unwrap_or("");
        let best_expert = conflict
            .conflicting_predictions
            .iter()
            .filter_map(|p| {
                context
                    .expertise_of(&p.agent_id, domain)
                    .map(|score| (p, score))
            })
            .fold(None::<(&Prediction, f64)>, |best, (p, score)| match best {
                Some((_, best_score)) if best_score >= score => best,
                _ => Some((p, score)),
            });

        match best_expert {
            Some((expert, score)) => ResolutionResult {
                resolved_prediction: expert.clone(),
                method: "expertise_deference".to_string(),
                confidence_adjustment: 0.0,
                rationale: format!(
                    "deferred to {} (expertise {:.2} in '{}')",
                    expert.agent_id, score, domain
                ),
            },
            None => {
                let mut best = &conflict.conflicting_predictions[0];
                for p in &conflict.conflicting_predictions[1..] {
                    if p.confidence > best.confidence {
                        best = p;
                    }
                }
                ResolutionResult {
                    resolved_prediction: best.clone(),
                    method: "expertise_deference".to_string(),
                    confidence_adjustment: 0.0,
                    rationale: format!(
                        "no expertise data; deferred to {} on raw confidence {:.2}",
                        best.agent_id, best.confidence
                    ),
                }
            }
        }
    }
}

/// Splits numeric disagreements by a confidence-weighted midpoint.
pub struct NegotiationResolver;

impl NegotiationResolver {
    /// Create a new negotiation resolver.
    pub fn new() -> Self {
        Self
    }
}

impl Default for NegotiationResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConflictResolver for NegotiationResolver {
    fn name(&self) -> &str {
        "negotiation"
    }

    fn can_handle(&self, conflict_type: &ConflictType) -> bool {
        matches!(conflict_type, ConflictType::ValueDisagreement)
    }

    fn resolve(
        &self,
        conflict: &ConflictContext,
        context: &DetectionContext,
    ) -> ResolutionResult {
        let numeric: Vec<&Prediction> = conflict
            .conflicting_predictions
            .iter()
            .filter(|p| p.value.as_number().is_some())
            .collect();
        // Negotiation only makes sense over a numeric spread.
        if numeric.len() < 2 {
            return WeightedVotingResolver::new().resolve(conflict, context);
        }

        let total: f64 = numeric.iter().map(|p| p.confidence).sum();
        let midpoint = if total > 0.0 {
            numeric
                .iter()
                .map(|p| p.value.as_number().unwrap_or(0.0) * p.confidence)
                .sum::<f64>()
                / total
        } else {
            numeric
                .iter()
                .map(|p| p.value.as_number().unwrap_or(0.0))
                .sum::<f64>()
                / numeric.len() as f64
        };
        let mean_confidence = numeric.iter().map(|p| p.confidence).sum::<f64>()
            / numeric.len() as f64;
        let confidence = 0.9 * mean_confidence;

        ResolutionResult {
            resolved_prediction: Prediction::new(
                "consensus_negotiation",
                PredictionValue::Number(midpoint),
                confidence,
            ),
            method: "negotiation".to_string(),
            confidence_adjustment: confidence - mean_confidence,
            rationale: format!(
                "settled {} numeric positions on weighted midpoint {:.4}",
                numeric.len(),
                midpoint
            ),
        }
    }
}

/// Delegates to the first inner resolver whose `can_handle` matches and
/// annotates the result with which resolver was used; falls back to
/// weighted voting when none matches.
pub struct HybridConflictResolver {
    resolvers: Vec<Box<dyn ConflictResolver>>,
}

impl HybridConflictResolver {
    /// Create with an ordered inner resolver list.
    pub fn new(resolvers: Vec<Box<dyn ConflictResolver>>) -> Self {
        Self { resolvers }
    }

    /// The conventional inner ordering: expertise first, then negotiation,
    /// then weighted voting.
    pub fn with_defaults() -> Self {
        Self::new(vec![
            Box::new(ExpertiseBasedResolver::new()),
            Box::new(NegotiationResolver::new()),
            Box::new(WeightedVotingResolver::new()),
        ])
    }
}

impl ConflictResolver for HybridConflictResolver {
    fn name(&self) -> &str {
        "hybrid"
    }

    fn can_handle(&self, _conflict_type: &ConflictType) -> bool {
        true
    }

    fn resolve(
        &self,
        conflict: &ConflictContext,
        context: &DetectionContext,
    ) -> ResolutionResult {
        for resolver in &self.resolvers {
            if resolver.can_handle(&conflict.conflict_type) {
                let mut result = resolver.resolve(conflict, context);
                result.method = format!("hybrid({})", result.method);
                return result;
            }
        }
        let mut result = WeightedVotingResolver::new().resolve(conflict, context);
        result.method = format!("hybrid({})", result.method);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::conflict::ConflictSeverity;
    use std::collections::{BTreeMap, HashMap};

    fn pred(agent: &str, value: &str, confidence: f64) -> Prediction {
        Prediction::new(agent, PredictionValue::parse(value), confidence)
    }

    fn conflict_of(kind: ConflictType, predictions: Vec<Prediction>) -> ConflictContext {
        ConflictContext {
            task_id: "task-1".to_string(),
            conflict_type: kind,
            severity: ConflictSeverity::High,
            conflicting_predictions: predictions,
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn test_weighted_voting_picks_heaviest_group() {
        let conflict = conflict_of(
            ConflictType::ValueDisagreement,
            vec![
                pred("a1", "approve", 0.9),
                pred("a2", "reject", 0.6),
                pred("a3", "reject", 0.5),
            ],
        );
        let mut ctx = DetectionContext::new("task-1");
        ctx.weights.insert("a1".to_string(), 1.0);
        ctx.weights.insert("a2".to_string(), 0.5);
        ctx.weights.insert("a3".to_string(), 0.5);

        // approve: 1.0*0.9 = 0.9; reject: 0.5*0.6 + 0.5*0.5 = 0.55
        let result = WeightedVotingResolver::new().resolve(&conflict, &ctx);
        assert_eq!(result.resolved_prediction.value.label(), "approve");
        assert_eq!(result.resolved_prediction.agent_id, WEIGHTED_VOTING_AGENT);
        // Confidence strictly reduced: 0.9 * group mean (0.9)
        assert!((result.resolved_prediction.confidence - 0.81).abs() < 1e-9);
        assert!(result.confidence_adjustment < 0.0);
    }

    #[test]
    fn test_expertise_resolver_defers_to_best_expert() {
        let conflict = conflict_of(
            ConflictType::ExpertiseConflict,
            vec![pred("a1", "approve", 0.7), pred("a2", "reject", 0.95)],
        );
        let mut ctx = DetectionContext::new("task-1");
        ctx.domain = Some("defi".to_string());
        ctx.expertise
            .insert("a1".to_string(), HashMap::from([("defi".to_string(), 0.95)]));
        ctx.expertise
            .insert("a2".to_string(), HashMap::from([("defi".to_string(), 0.75)]));

        let result = ExpertiseBasedResolver::new().resolve(&conflict, &ctx);
        // a1 has the higher expertise even though a2 is more confident.
        assert_eq!(result.resolved_prediction.agent_id, "a1");
    }

    #[test]
    fn test_expertise_resolver_falls_back_to_confidence() {
        let conflict = conflict_of(
            ConflictType::ExpertiseConflict,
            vec![pred("a1", "approve", 0.7), pred("a2", "reject", 0.95)],
        );
        let ctx = DetectionContext::new("task-1");
        let result = ExpertiseBasedResolver::new().resolve(&conflict, &ctx);
        assert_eq!(result.resolved_prediction.agent_id, "a2");
    }

    #[test]
    fn test_negotiation_settles_numeric_midpoint() {
        let conflict = conflict_of(
            ConflictType::ValueDisagreement,
            vec![pred("a1", "10", 1.0), pred("a2", "20", 1.0)],
        );
        let ctx = DetectionContext::new("task-1");
        let result = NegotiationResolver::new().resolve(&conflict, &ctx);
        assert_eq!(result.method, "negotiation");
        assert!(
            (result.resolved_prediction.value.as_number().unwrap() - 15.0).abs() < 1e-9
        );
    }

    #[test]
    fn test_hybrid_annotates_inner_resolver() {
        let conflict = conflict_of(
            ConflictType::ValueDisagreement,
            vec![pred("a1", "approve", 0.9), pred("a2", "reject", 0.6)],
        );
        let ctx = DetectionContext::new("task-1");
        let hybrid = HybridConflictResolver::with_defaults();
        let result = hybrid.resolve(&conflict, &ctx);
        // Textual disagreement skips negotiation's numeric path internally,
        // but negotiation still owns ValueDisagreement in the default order.
        assert!(result.method.starts_with("hybrid("));
    }

    #[test]
    fn test_route_conflict_first_match_wins() {
        let resolvers: Vec<Box<dyn ConflictResolver>> = vec![
            Box::new(ExpertiseBasedResolver::new()),
            Box::new(WeightedVotingResolver::new()),
        ];
        let conflict = conflict_of(
            ConflictType::ValueDisagreement,
            vec![pred("a1", "approve", 0.9), pred("a2", "reject", 0.6)],
        );
        let ctx = DetectionContext::new("task-1");
        // Expertise resolver cannot handle ValueDisagreement, so weighted
        // voting takes it.
        let result = route_conflict(&resolvers, &conflict, &ctx);
        assert_eq!(result.method, "weighted_voting");
    }

    #[test]
    fn test_route_conflict_fallback_is_weighted_voting() {
        let resolvers: Vec<Box<dyn ConflictResolver>> = vec![];
        let conflict = conflict_of(
            ConflictType::ConfidenceMismatch,
            vec![pred("a1", "approve", 0.9), pred("a2", "reject", 0.85)],
        );
        let ctx = DetectionContext::new("task-1");
        let result = route_conflict(&resolvers, &conflict, &ctx);
        assert_eq!(result.method, "weighted_voting");
    }
}
