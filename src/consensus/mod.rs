//! Consensus Module
//!
//! Multi-agent decision making:
//! - Agent boundary and prediction model
//! - Interaction patterns with deterministic selection
//! - Statistical and domain conflict detection
//! - Pluggable conflict resolution
//! - Consensus engine with a frozen code-identity fingerprint

pub mod agent;
pub mod aggregation;
pub mod conflict;
pub mod engine;
pub mod interaction;
pub mod resolution;

pub use agent::{
    Agent, AgentDecision, AgentProfile, IndividualDecision, Prediction, PredictionValue,
    RegisteredAgent,
};
pub use aggregation::{Aggregate, AggregationStrategy};
pub use conflict::{
    ConflictContext, ConflictDetector, ConflictSeverity, ConflictType, DetectionContext,
    DetectorConfig, DomainConflictDetector, StatisticalConflictDetector,
};
pub use engine::{ConsensusEngine, ConsensusResult, EngineConfig, EngineMetrics};
pub use interaction::{
    default_pattern_rules, select_pattern, CoordinatorConfig, InteractionChannel,
    InteractionCoordinator, InteractionPattern, PatternRule,
};
pub use resolution::{
    ConflictResolver, ExpertiseBasedResolver, HybridConflictResolver, NegotiationResolver,
    ResolutionResult, WeightedVotingResolver,
};
