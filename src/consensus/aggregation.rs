//! Aggregation strategies combining a prediction set into one value.
//!
//! All strategies are pure and deterministic for identical inputs.

use crate::consensus::agent::{Prediction, PredictionValue};
use serde::{Deserialize, Serialize};

/// Strategy used to combine predictions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationStrategy {
    /// Most frequent value wins; ties break by first-seen insertion order
    MajorityVote,
    /// Single highest-confidence prediction wins
    TopConfidence,
    /// Confidence-weighted mean over numeric predictions
    WeightedAverage,
}

impl Default for AggregationStrategy {
    fn default() -> Self {
        Self::MajorityVote
    }
}

impl AggregationStrategy {
    /// Method name recorded in consensus results.
    pub fn method_name(&self) -> &'static str {
        match self {
            AggregationStrategy::MajorityVote => "majority_vote",
            AggregationStrategy::TopConfidence => "top_confidence",
            AggregationStrategy::WeightedAverage => "weighted_average",
        }
    }
}

/// Outcome of an aggregation pass.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Aggregate {
    /// Combined value
    pub value: PredictionValue,
    /// Confidence attached to the combined value
    pub confidence: f64,
    /// Method that produced it
    pub method: String,
}

impl AggregationStrategy {
    /// Combine a prediction set. Returns `None` for an empty set.
    pub fn aggregate(&self, predictions: &[Prediction]) -> Option<Aggregate> {
        if predictions.is_empty() {
            return None;
        }
        match self {
            AggregationStrategy::MajorityVote => Some(majority_vote(predictions)),
            AggregationStrategy::TopConfidence => Some(top_confidence(predictions)),
            AggregationStrategy::WeightedAverage => Some(weighted_average(predictions)),
        }
    }
}

/// Group predictions by value label, preserving first-seen order.
fn group_by_label(predictions: &[Prediction]) -> Vec<(String, Vec<&Prediction>)> {
    let mut groups: Vec<(String, Vec<&Prediction>)> = Vec::new();
    for p in predictions {
        let label = p.value.label();
        match groups.iter_mut().find(|(l, _)| *l == label) {
            Some((_, members)) => members.push(p),
            None => groups.push((label, vec![p])),
        }
    }
    groups
}

fn majority_vote(predictions: &[Prediction]) -> Aggregate {
    let groups = group_by_label(predictions);
    // Strict > keeps the earliest group on ties (stable, not random).
    let mut winner = &groups[0];
    for group in &groups[1..] {
        if group.1.len() > winner.1.len() {
            winner = group;
        }
    }
    let confidence =
        winner.1.iter().map(|p| p.confidence).sum::<f64>() / winner.1.len() as f64;
    Aggregate {
        value: winner.1[0].value.clone(),
        confidence,
        method: "majority_vote".to_string(),
    }
}

fn top_confidence(predictions: &[Prediction]) -> Aggregate {
    let mut best = &predictions[0];
    for p in &predictions[1..] {
        if p.confidence > best.confidence {
            best = p;
        }
    }
    Aggregate {
        value: best.value.clone(),
        confidence: best.confidence,
        method: "top_confidence".to_string(),
    }
}

fn weighted_average(predictions: &[Prediction]) -> Aggregate {
    let numeric: Vec<&Prediction> = predictions
        .iter()
        .filter(|p| p.value.as_number().is_some())
        .collect();

    // Weighted averaging only applies to numeric predictions; a purely
    // textual set degrades to majority vote.
    if numeric.is_empty() {
        return majority_vote(predictions);
    }

    let total_confidence: f64 = numeric.iter().map(|p| p.confidence).sum();
    let mean_confidence = total_confidence / numeric.len() as f64;

    let value = if total_confidence > 0.0 {
        numeric
            .iter()
            .map(|p| p.value.as_number().unwrap_or(0.0) * p.confidence)
            .sum::<f64>()
            / total_confidence
    } else {
        // All-zero confidence: unweighted mean, never a division by zero.
        numeric
            .iter()
            .map(|p| p.value.as_number().unwrap_or(0.0))
            .sum::<f64>()
            / numeric.len() as f64
    };

    Aggregate {
        value: PredictionValue::Number(value),
        confidence: mean_confidence,
        method: "weighted_average".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pred(agent: &str, value: &str, confidence: f64) -> Prediction {
        Prediction::new(agent, PredictionValue::parse(value), confidence)
    }

    #[test]
    fn test_empty_set_yields_none() {
        assert!(AggregationStrategy::MajorityVote.aggregate(&[]).is_none());
    }

    #[test]
    fn test_majority_vote_basic() {
        let predictions = vec![
            pred("a1", "approve", 0.9),
            pred("a2", "approve", 0.8),
            pred("a3", "reject", 0.95),
        ];
        let out = AggregationStrategy::MajorityVote
            .aggregate(&predictions)
            .unwrap();
        assert_eq!(out.value.label(), "approve");
        assert_eq!(out.method, "majority_vote");
        assert!((out.confidence - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_majority_vote_tie_breaks_first_seen() {
        let predictions = vec![
            pred("a1", "hold", 0.5),
            pred("a2", "sell", 0.99),
            pred("a3", "sell", 0.99),
            pred("a4", "hold", 0.5),
        ];
        let out = AggregationStrategy::MajorityVote
            .aggregate(&predictions)
            .unwrap();
        // "hold" was seen first; tie must not flip to "sell".
        assert_eq!(out.value.label(), "hold");
    }

    #[test]
    fn test_top_confidence() {
        let predictions = vec![
            pred("a1", "approve", 0.7),
            pred("a2", "reject", 0.91),
            pred("a3", "hold", 0.9),
        ];
        let out = AggregationStrategy::TopConfidence
            .aggregate(&predictions)
            .unwrap();
        assert_eq!(out.value.label(), "reject");
        assert_eq!(out.confidence, 0.91);
    }

    #[test]
    fn test_weighted_average() {
        let predictions = vec![pred("a1", "10", 0.5), pred("a2", "20", 1.0)];
        let out = AggregationStrategy::WeightedAverage
            .aggregate(&predictions)
            .unwrap();
        // (10*0.5 + 20*1.0) / 1.5
        assert!((out.value.as_number().unwrap() - 50.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_weighted_average_zero_confidence_falls_back_to_mean() {
        let predictions = vec![pred("a1", "10", 0.0), pred("a2", "30", 0.0)];
        let out = AggregationStrategy::WeightedAverage
            .aggregate(&predictions)
            .unwrap();
        let value = out.value.as_number().unwrap();
        assert!(value.is_finite());
        assert!((value - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_weighted_average_textual_set_degrades_to_majority() {
        let predictions = vec![pred("a1", "approve", 0.9), pred("a2", "approve", 0.8)];
        let out = AggregationStrategy::WeightedAverage
            .aggregate(&predictions)
            .unwrap();
        assert_eq!(out.value.label(), "approve");
        assert_eq!(out.method, "majority_vote");
    }
}
