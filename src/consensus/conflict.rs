//! Conflict detection over a prediction set.
//!
//! Detectors run in registration order over the raw predictions of a round
//! and emit conflict contexts for the resolution pipeline.

use crate::consensus::agent::Prediction;
use crate::core::TraceValue;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Kind of disagreement detected among predictions.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    /// Predictions disagree on value beyond the dispersion threshold
    ValueDisagreement,
    /// Multiple high-confidence predictions disagree on value
    ConfidenceMismatch,
    /// A numeric prediction lies far outside the population
    Outlier,
    /// Recognized domain experts disagree on value
    ExpertiseConflict,
    /// Predictions contradict earlier rounds
    TemporalInconsistency,
    /// A persistent one-sided skew across agents
    SystematicBias,
}

/// Severity of a detected conflict.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// One detected conflict. Created by a detector, consumed by exactly one
/// resolver, never mutated after creation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConflictContext {
    /// Task the conflict belongs to
    pub task_id: String,
    /// Conflict kind
    pub conflict_type: ConflictType,
    /// Severity
    pub severity: ConflictSeverity,
    /// The predictions in disagreement
    pub conflicting_predictions: Vec<Prediction>,
    /// Detector-specific details
    pub metadata: BTreeMap<String, TraceValue>,
}

/// Round context shared by detectors and resolvers: task identity, inferred
/// domain, and the registered agents' weights and expertise.
#[derive(Clone, Debug, Default)]
pub struct DetectionContext {
    /// Task identifier
    pub task_id: String,
    /// Domain inferred from the task text, if any
    pub domain: Option<String>,
    /// Agent voting weights keyed by agent id
    pub weights: HashMap<String, f64>,
    /// Agent expertise scores keyed by agent id, then domain
    pub expertise: HashMap<String, HashMap<String, f64>>,
}

impl DetectionContext {
    /// Create a context for a task.
    pub fn new(task_id: &str) -> Self {
        Self {
            task_id: task_id.to_string(),
            ..Default::default()
        }
    }

    /// Voting weight for an agent (1.0 when unknown).
    pub fn weight_of(&self, agent_id: &str) -> f64 {
        self.weights.get(agent_id).copied().unwrap_or(1.0)
    }

    /// Expertise score of an agent in a domain, if known.
    pub fn expertise_of(&self, agent_id: &str, domain: &str) -> Option<f64> {
        self.expertise.get(agent_id).and_then(|m| m.get(domain)).copied()
    }
}

/// A conflict detector. Detectors are scanned in registration order.
pub trait ConflictDetector: Send + Sync {
    /// Detector name, used in traces.
    fn name(&self) -> &str;

    /// Analyze a prediction set and emit zero or more conflicts.
    fn detect(&self, predictions: &[Prediction], context: &DetectionContext)
        -> Vec<ConflictContext>;
}

/// Thresholds for statistical conflict detection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Coefficient-of-variation threshold for value disagreement
    pub disagreement_threshold: f64,
    /// Confidence floor for the confidence-mismatch check
    pub confidence_threshold: f64,
    /// Z-score threshold for outlier detection
    pub outlier_threshold: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            disagreement_threshold: 0.3,
            confidence_threshold: 0.8,
            outlier_threshold: 2.0,
        }
    }
}

/// Statistical detector: dispersion, confidence mismatches, outliers.
pub struct StatisticalConflictDetector {
    config: DetectorConfig,
}

impl StatisticalConflictDetector {
    /// Create with the given thresholds.
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    fn numeric(predictions: &[Prediction]) -> Vec<&Prediction> {
        predictions
            .iter()
            .filter(|p| p.value.as_number().is_some())
            .collect()
    }

    fn textual(predictions: &[Prediction]) -> Vec<&Prediction> {
        predictions
            .iter()
            .filter(|p| p.value.as_number().is_none())
            .collect()
    }

    fn severity_for_cv(cv: f64) -> ConflictSeverity {
        if cv > 0.8 {
            ConflictSeverity::Critical
        } else if cv > 0.5 {
            ConflictSeverity::High
        } else if cv > 0.3 {
            ConflictSeverity::Medium
        } else {
            ConflictSeverity::Low
        }
    }

    fn detect_numeric_disagreement(
        &self,
        numeric: &[&Prediction],
        context: &DetectionContext,
    ) -> Option<ConflictContext> {
        let values: Vec<f64> = numeric.iter().filter_map(|p| p.value.as_number()).collect();
        let distinct = {
            let mut seen: Vec<f64> = Vec::new();
            for v in &values {
                if !seen.iter().any(|s| s == v) {
                    seen.push(*v);
                }
            }
            seen.len()
        };
        if distinct < 2 {
            return None;
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance =
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        let stdev = variance.sqrt();
        let cv = stdev / mean.abs().max(1.0);
        if cv <= self.config.disagreement_threshold {
            return None;
        }

        let mut metadata = BTreeMap::new();
        metadata.insert("mean".to_string(), TraceValue::number(mean));
        metadata.insert("stdev".to_string(), TraceValue::number(stdev));
        metadata.insert("coefficient_of_variation".to_string(), TraceValue::number(cv));
        Some(ConflictContext {
            task_id: context.task_id.clone(),
            conflict_type: ConflictType::ValueDisagreement,
            severity: Self::severity_for_cv(cv),
            conflicting_predictions: numeric.iter().map(|p| (*p).clone()).collect(),
            metadata,
        })
    }

    fn detect_textual_disagreement(
        &self,
        textual: &[&Prediction],
        context: &DetectionContext,
    ) -> Option<ConflictContext> {
        let mut labels: Vec<String> = Vec::new();
        for p in textual {
            let label = p.value.label();
            if !labels.contains(&label) {
                labels.push(label);
            }
        }
        if labels.len() < 2 {
            return None;
        }

        let severity = if labels.len() >= 3 {
            ConflictSeverity::High
        } else {
            ConflictSeverity::Medium
        };
        let mut metadata = BTreeMap::new();
        metadata.insert(
            "distinct_values".to_string(),
            TraceValue::number(labels.len() as f64),
        );
        Some(ConflictContext {
            task_id: context.task_id.clone(),
            conflict_type: ConflictType::ValueDisagreement,
            severity,
            conflicting_predictions: textual.iter().map(|p| (*p).clone()).collect(),
            metadata,
        })
    }

    fn detect_confidence_mismatch(
        &self,
        predictions: &[Prediction],
        context: &DetectionContext,
    ) -> Option<ConflictContext> {
        let confident: Vec<&Prediction> = predictions
            .iter()
            .filter(|p| p.confidence > self.config.confidence_threshold)
            .collect();
        if confident.len() < 2 {
            return None;
        }
        let first_label = confident[0].value.label();
        if confident.iter().all(|p| p.value.label() == first_label) {
            return None;
        }

        let mut metadata = BTreeMap::new();
        metadata.insert(
            "confident_agents".to_string(),
            TraceValue::number(confident.len() as f64),
        );
        Some(ConflictContext {
            task_id: context.task_id.clone(),
            conflict_type: ConflictType::ConfidenceMismatch,
            severity: ConflictSeverity::High,
            conflicting_predictions: confident.iter().map(|p| (*p).clone()).collect(),
            metadata,
        })
    }

    fn detect_outliers(
        &self,
        numeric: &[&Prediction],
        context: &DetectionContext,
    ) -> Vec<ConflictContext> {
        // Population statistics need at least three numeric points.
        if numeric.len() < 3 {
            return Vec::new();
        }
        let values: Vec<f64> = numeric.iter().filter_map(|p| p.value.as_number()).collect();
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let stdev = variance.sqrt();
        // Zero dispersion leaves z-scores undefined.
        if stdev == 0.0 {
            return Vec::new();
        }

        let mut conflicts = Vec::new();
        for p in numeric {
            let value = match p.value.as_number() {
                Some(v) => v,
                None => continue,
            };
            let z = (value - mean) / stdev;
            if z.abs() > self.config.outlier_threshold {
                let mut metadata = BTreeMap::new();
                metadata.insert("z_score".to_string(), TraceValue::number(z));
                metadata.insert("population_mean".to_string(), TraceValue::number(mean));
                conflicts.push(ConflictContext {
                    task_id: context.task_id.clone(),
                    conflict_type: ConflictType::Outlier,
                    severity: if z.abs() > 2.0 * self.config.outlier_threshold {
                        ConflictSeverity::Critical
                    } else {
                        ConflictSeverity::High
                    },
                    conflicting_predictions: vec![(*p).clone()],
                    metadata,
                });
            }
        }
        conflicts
    }
}

impl Default for StatisticalConflictDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

impl ConflictDetector for StatisticalConflictDetector {
    fn name(&self) -> &str {
        "statistical"
    }

    fn detect(
        &self,
        predictions: &[Prediction],
        context: &DetectionContext,
    ) -> Vec<ConflictContext> {
        if predictions.len() < 2 {
            return Vec::new();
        }

        let numeric = Self::numeric(predictions);
        let textual = Self::textual(predictions);

        let mut conflicts = Vec::new();
        if numeric.len() >= 2 {
            conflicts.extend(self.detect_numeric_disagreement(&numeric, context));
        }
        if textual.len() >= 2 {
            conflicts.extend(self.detect_textual_disagreement(&textual, context));
        }
        conflicts.extend(self.detect_confidence_mismatch(predictions, context));
        conflicts.extend(self.detect_outliers(&numeric, context));
        conflicts
    }
}

/// Domain detector: flags disagreement among recognized experts.
pub struct DomainConflictDetector {
    /// Expertise score above which an agent counts as a domain expert
    expertise_floor: f64,
}

impl DomainConflictDetector {
    /// Create with the default 0.7 expertise floor.
    pub fn new() -> Self {
        Self { expertise_floor: 0.7 }
    }

    /// Override the expertise floor.
    pub fn with_floor(mut self, floor: f64) -> Self {
        self.expertise_floor = floor.clamp(0.0, 1.0);
        self
    }
}

impl Default for DomainConflictDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ConflictDetector for DomainConflictDetector {
    fn name(&self) -> &str {
        "domain"
    }

    fn detect(
        &self,
        predictions: &[Prediction],
        context: &DetectionContext,
    ) -> Vec<ConflictContext> {
        let domain = match &context.domain {
            Some(d) => d,
            None => return Vec::new(),
        };

        let experts: Vec<&Prediction> = predictions
            .iter()
            .filter(|p| {
                context
                    .expertise_of(&p.agent_id, domain)
                    .map(|score| score > self.expertise_floor)
                    .unwrap_or(false)
            })
            .collect();
        if experts.len() < 2 {
            return Vec::new();
        }

        let first_label = experts[0].value.label();
        if experts.iter().all(|p| p.value.label() == first_label) {
            return Vec::new();
        }

        let mut metadata = BTreeMap::new();
        metadata.insert("domain".to_string(), TraceValue::text(domain.clone()));
        let mut scores = BTreeMap::new();
        for p in &experts {
            if let Some(score) = context.expertise_of(&p.agent_id, domain) {
                scores.insert(p.agent_id.clone(), TraceValue::number(score));
            }
        }
        metadata.insert("expertise_scores".to_string(), TraceValue::Map(scores));

        vec![ConflictContext {
            task_id: context.task_id.clone(),
            conflict_type: ConflictType::ExpertiseConflict,
            severity: ConflictSeverity::High,
            conflicting_predictions: experts.iter().map(|p| (*p).clone()).collect(),
            metadata,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::agent::PredictionValue;

    fn pred(agent: &str, value: &str, confidence: f64) -> Prediction {
        Prediction::new(agent, PredictionValue::parse(value), confidence)
    }

    fn context() -> DetectionContext {
        DetectionContext::new("task-1")
    }

    #[test]
    fn test_requires_two_predictions() {
        let detector = StatisticalConflictDetector::default();
        let conflicts = detector.detect(&[pred("a1", "100", 0.9)], &context());
        assert!(conflicts.is_empty());
    }

    #[test]
    fn test_numeric_value_disagreement() {
        let detector = StatisticalConflictDetector::default();
        let predictions = vec![pred("a1", "100", 0.6), pred("a2", "10", 0.6)];
        let conflicts = detector.detect(&predictions, &context());
        assert!(conflicts
            .iter()
            .any(|c| c.conflict_type == ConflictType::ValueDisagreement));
    }

    #[test]
    fn test_agreeing_numbers_no_disagreement() {
        let detector = StatisticalConflictDetector::default();
        let predictions = vec![pred("a1", "100", 0.6), pred("a2", "100", 0.7)];
        let conflicts = detector.detect(&predictions, &context());
        assert!(conflicts.is_empty());
    }

    #[test]
    fn test_confidence_mismatch() {
        let detector = StatisticalConflictDetector::default();
        let predictions = vec![pred("a1", "approve", 0.95), pred("a2", "reject", 0.9)];
        let conflicts = detector.detect(&predictions, &context());
        assert!(conflicts
            .iter()
            .any(|c| c.conflict_type == ConflictType::ConfidenceMismatch));
    }

    #[test]
    fn test_no_outlier_with_two_numeric_predictions() {
        let detector = StatisticalConflictDetector::default();
        // Wildly different, but only two points: outlier detection must stay
        // silent (value disagreement may still fire).
        let predictions = vec![pred("a1", "1", 0.5), pred("a2", "100000", 0.5)];
        let conflicts = detector.detect(&predictions, &context());
        assert!(!conflicts
            .iter()
            .any(|c| c.conflict_type == ConflictType::Outlier));
    }

    #[test]
    fn test_outlier_detected_with_three_predictions() {
        let detector = StatisticalConflictDetector::default();
        // A single extreme point can only exceed |z| = 2 once the population
        // is large enough (max |z| is (n-1)/sqrt(n)).
        let predictions = vec![
            pred("a1", "10", 0.5),
            pred("a2", "10", 0.5),
            pred("a3", "10", 0.5),
            pred("a4", "10", 0.5),
            pred("a5", "10", 0.5),
            pred("a6", "10", 0.5),
            pred("a7", "1000", 0.5),
        ];
        let conflicts = detector.detect(&predictions, &context());
        let outliers: Vec<_> = conflicts
            .iter()
            .filter(|c| c.conflict_type == ConflictType::Outlier)
            .collect();
        assert_eq!(outliers.len(), 1);
        assert_eq!(outliers[0].conflicting_predictions[0].agent_id, "a7");
    }

    #[test]
    fn test_zero_stdev_suppresses_outliers() {
        let detector = StatisticalConflictDetector::default();
        let predictions = vec![
            pred("a1", "10", 0.5),
            pred("a2", "10", 0.5),
            pred("a3", "10", 0.5),
        ];
        let conflicts = detector.detect(&predictions, &context());
        assert!(conflicts.is_empty());
    }

    #[test]
    fn test_expertise_conflict() {
        let detector = DomainConflictDetector::new();
        let mut ctx = context();
        ctx.domain = Some("defi".to_string());
        ctx.expertise.insert(
            "a1".to_string(),
            HashMap::from([("defi".to_string(), 0.9)]),
        );
        ctx.expertise.insert(
            "a2".to_string(),
            HashMap::from([("defi".to_string(), 0.8)]),
        );

        let predictions = vec![pred("a1", "approve", 0.7), pred("a2", "reject", 0.7)];
        let conflicts = detector.detect(&predictions, &ctx);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].conflict_type, ConflictType::ExpertiseConflict);
    }

    #[test]
    fn test_expertise_conflict_needs_two_experts() {
        let detector = DomainConflictDetector::new();
        let mut ctx = context();
        ctx.domain = Some("defi".to_string());
        ctx.expertise.insert(
            "a1".to_string(),
            HashMap::from([("defi".to_string(), 0.9)]),
        );
        // a2 is below the floor
        ctx.expertise.insert(
            "a2".to_string(),
            HashMap::from([("defi".to_string(), 0.5)]),
        );

        let predictions = vec![pred("a1", "approve", 0.7), pred("a2", "reject", 0.7)];
        assert!(detector.detect(&predictions, &ctx).is_empty());
    }
}
