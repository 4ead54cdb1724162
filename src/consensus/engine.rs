//! Consensus engine orchestrating coordination, conflict handling,
//! aggregation and the compliance gate.

use crate::compliance::{ComplianceStatus, PolicyEngine};
use crate::consensus::agent::{IndividualDecision, Prediction, RegisteredAgent};
use crate::consensus::aggregation::AggregationStrategy;
use crate::consensus::conflict::{
    ConflictDetector, DetectionContext, DetectorConfig, DomainConflictDetector,
    StatisticalConflictDetector,
};
use crate::consensus::interaction::{
    default_pattern_rules, select_pattern, CoordinatorConfig, InteractionCoordinator,
    PatternRule,
};
use crate::consensus::resolution::{
    route_conflict, ConflictResolver, ExpertiseBasedResolver, WeightedVotingResolver,
};
use crate::core::{Error, Result, TraceValue};
use crate::enclave::crypto::keccak256;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{info, warn};

/// Final output of one consensus run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConsensusResult {
    /// The decision after aggregation and compliance
    pub final_decision: String,
    /// Every responsive agent's decision
    pub individual_decisions: Vec<IndividualDecision>,
    /// How the final decision was produced
    pub method: String,
    /// Frozen code-identity fingerprint of the engine
    pub model_cid: String,
    /// Compliance outcome
    pub compliance_status: ComplianceStatus,
    /// Explainability trace
    pub xai_trace: BTreeMap<String, TraceValue>,
}

/// Engine metrics.
#[derive(Clone, Debug, Default)]
pub struct EngineMetrics {
    pub total_runs: u64,
    pub vetoed_runs: u64,
    pub conflicts_detected: u64,
    pub conflicts_resolved: u64,
    pub average_confidence: f64,
}

/// Configuration for the consensus engine.
#[derive(Clone, Debug, Default)]
pub struct EngineConfig {
    /// Aggregation strategy
    pub aggregation: AggregationStrategy,
    /// Coordinator timeouts and round caps
    pub coordinator: CoordinatorConfig,
    /// Statistical detector thresholds
    pub detector: DetectorConfig,
}

/// Consensus engine over a fixed agent set.
///
/// Construction is fail-closed: the engine refuses to start when the
/// code-identity fingerprint (`model_cid`) cannot be computed from its
/// integrity inputs.
pub struct ConsensusEngine {
    agents: Vec<RegisteredAgent>,
    detectors: Vec<Box<dyn ConflictDetector>>,
    resolvers: Vec<Box<dyn ConflictResolver>>,
    coordinator: InteractionCoordinator,
    compliance: PolicyEngine,
    aggregation: AggregationStrategy,
    pattern_rules: Vec<PatternRule>,
    model_cid: String,
    metrics: EngineMetrics,
}

impl ConsensusEngine {
    /// Create a new engine. Fails with `Error::Configuration` when no
    /// agents are registered and `Error::Integrity` when the model
    /// fingerprint cannot be computed.
    pub fn new(agents: Vec<RegisteredAgent>, config: EngineConfig) -> Result<Self> {
        if agents.is_empty() {
            return Err(Error::Configuration("no agents registered".to_string()));
        }
        let model_cid = Self::compute_model_cid(&agents)?;

        Ok(Self {
            agents,
            detectors: vec![
                Box::new(StatisticalConflictDetector::new(config.detector.clone())),
                Box::new(DomainConflictDetector::new()),
            ],
            resolvers: vec![
                Box::new(ExpertiseBasedResolver::new()),
                Box::new(WeightedVotingResolver::new()),
            ],
            coordinator: InteractionCoordinator::new(config.coordinator.clone()),
            compliance: PolicyEngine::default(),
            aggregation: config.aggregation,
            pattern_rules: default_pattern_rules(),
            model_cid,
            metrics: EngineMetrics::default(),
        })
    }

    /// Append a conflict detector (scanned in registration order).
    pub fn with_detector(mut self, detector: Box<dyn ConflictDetector>) -> Self {
        self.detectors.push(detector);
        self
    }

    /// Append a conflict resolver (scanned in registration order).
    pub fn with_resolver(mut self, resolver: Box<dyn ConflictResolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    /// Replace the compliance policy engine.
    pub fn with_compliance(mut self, compliance: PolicyEngine) -> Self {
        self.compliance = compliance;
        self
    }

    /// Replace the pattern rule table.
    pub fn with_pattern_rules(mut self, rules: Vec<PatternRule>) -> Self {
        self.pattern_rules = rules;
        self
    }

    /// The frozen code-identity fingerprint.
    pub fn model_cid(&self) -> &str {
        &self.model_cid
    }

    /// Engine metrics.
    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    /// Fingerprint the engine's code identity: crate name/version plus the
    /// sorted agent-id set. Frozen for the engine's lifetime.
    fn compute_model_cid(agents: &[RegisteredAgent]) -> Result<String> {
        let mut ids: Vec<&str> = agents.iter().map(|a| a.profile.id.as_str()).collect();
        if ids.iter().any(|id| id.is_empty()) {
            return Err(Error::Integrity(
                "agent with empty id cannot be fingerprinted".to_string(),
            ));
        }
        ids.sort_unstable();
        if ids.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(Error::Integrity(
                "duplicate agent ids make the fingerprint ambiguous".to_string(),
            ));
        }
        let preimage = format!(
            "{}:{}:{}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            ids.join(",")
        );
        Ok(keccak256(preimage.as_bytes()).to_hex())
    }

    /// Run one consensus round for a task.
    pub async fn run(&mut self, task: &str) -> Result<ConsensusResult> {
        if self.agents.is_empty() {
            return Err(Error::Configuration("no agents registered".to_string()));
        }

        let pattern = select_pattern(task, self.agents.len(), &self.pattern_rules);
        let domain = self.infer_domain(task);
        let outcome = self
            .coordinator
            .run_round(pattern, task, domain.as_deref(), &self.agents)
            .await;
        if outcome.predictions.is_empty() {
            return Err(Error::Internal(
                "no agent produced a prediction within the round timeout".to_string(),
            ));
        }

        let context = self.detection_context(domain);
        let conflicts: Vec<_> = self
            .detectors
            .iter()
            .flat_map(|d| d.detect(&outcome.predictions, &context))
            .collect();
        let resolutions: Vec<_> = conflicts
            .iter()
            .map(|conflict| route_conflict(&self.resolvers, conflict, &context))
            .collect();

        // Aggregate unconflicted predictions plus the resolvers' output.
        let conflicted: HashSet<&str> = conflicts
            .iter()
            .flat_map(|c| c.conflicting_predictions.iter())
            .map(|p| p.agent_id.as_str())
            .collect();
        let mut contributing: Vec<Prediction> = outcome
            .predictions
            .iter()
            .filter(|p| !conflicted.contains(p.agent_id.as_str()))
            .cloned()
            .collect();
        contributing.extend(resolutions.iter().map(|r| r.resolved_prediction.clone()));

        let aggregate = self
            .aggregation
            .aggregate(&contributing)
            .ok_or_else(|| Error::Internal("aggregation over empty set".to_string()))?;
        let overall_confidence = contributing.iter().map(|p| p.confidence).sum::<f64>()
            / contributing.len() as f64;

        let decision_label = aggregate.value.label();
        let check = self
            .compliance
            .check_compliance(task, &decision_label, overall_confidence);
        let (final_decision, method, compliance_status) = if check.compliant {
            (
                decision_label,
                aggregate.method.clone(),
                ComplianceStatus::Pass,
            )
        } else {
            let reason = check.reason.unwrap_or_default();
            warn!(%reason, "compliance veto overrides consensus");
            (
                "reject".to_string(),
                format!("policy_override: {reason}"),
                ComplianceStatus::Fail,
            )
        };

        let mut xai_trace = BTreeMap::new();
        xai_trace.insert("pattern".to_string(), TraceValue::text(pattern.name()));
        if let Some(d) = &context.domain {
            xai_trace.insert("domain".to_string(), TraceValue::text(d.clone()));
        }
        xai_trace.insert(
            "predictions".to_string(),
            TraceValue::number(outcome.predictions.len() as f64),
        );
        xai_trace.insert(
            "excluded_agents".to_string(),
            TraceValue::number(outcome.excluded.len() as f64),
        );
        xai_trace.insert(
            "conflicts".to_string(),
            TraceValue::number(conflicts.len() as f64),
        );
        if !resolutions.is_empty() {
            let mut methods = BTreeMap::new();
            for (i, r) in resolutions.iter().enumerate() {
                methods.insert(format!("{i}"), TraceValue::text(r.method.clone()));
            }
            xai_trace.insert("resolutions".to_string(), TraceValue::Map(methods));
        }
        xai_trace.insert(
            "aggregation".to_string(),
            TraceValue::text(aggregate.method.clone()),
        );
        xai_trace.insert(
            "overall_confidence".to_string(),
            TraceValue::number(overall_confidence),
        );

        self.update_metrics(
            &compliance_status,
            conflicts.len(),
            resolutions.len(),
            overall_confidence,
        );
        info!(
            pattern = pattern.name(),
            decision = %final_decision,
            conflicts = conflicts.len(),
            confidence = overall_confidence,
            "consensus round complete"
        );

        Ok(ConsensusResult {
            final_decision,
            individual_decisions: outcome.decisions,
            method,
            model_cid: self.model_cid.clone(),
            compliance_status,
            xai_trace,
        })
    }

    fn detection_context(&self, domain: Option<String>) -> DetectionContext {
        let mut context = DetectionContext::new(&uuid::Uuid::new_v4().to_string());
        context.domain = domain;
        for agent in &self.agents {
            context
                .weights
                .insert(agent.profile.id.clone(), agent.profile.weight);
            context
                .expertise
                .insert(agent.profile.id.clone(), agent.profile.expertise.clone());
        }
        context
    }

    /// Infer a task domain from the registered agents' expertise keys:
    /// the lexicographically first domain mentioned in the task text.
    fn infer_domain(&self, task: &str) -> Option<String> {
        let task_lower = task.to_lowercase();
        let mut domains: Vec<&String> = self
            .agents
            .iter()
            .flat_map(|a| a.profile.expertise.keys())
            .collect();
        domains.sort_unstable();
        domains.dedup();
        domains
            .into_iter()
            .find(|d| task_lower.contains(&d.to_lowercase()))
            .cloned()
    }

    fn update_metrics(
        &mut self,
        status: &ComplianceStatus,
        conflicts: usize,
        resolutions: usize,
        confidence: f64,
    ) {
        self.metrics.total_runs += 1;
        if *status == ComplianceStatus::Fail {
            self.metrics.vetoed_runs += 1;
        }
        self.metrics.conflicts_detected += conflicts as u64;
        self.metrics.conflicts_resolved += resolutions as u64;
        self.metrics.average_confidence = (self.metrics.average_confidence
            * (self.metrics.total_runs - 1) as f64
            + confidence)
            / self.metrics.total_runs as f64;
    }
}
