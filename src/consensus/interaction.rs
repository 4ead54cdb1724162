//! Interaction patterns and the round coordinator.
//!
//! Runs N agents against a task under a selected pattern. Pattern selection
//! is a deterministic keyword rule table, not learned, so behavior stays
//! auditable.

use crate::consensus::agent::{
    IndividualDecision, Prediction, PredictionValue, RegisteredAgent,
};
use crate::core::{now, Error, Result, Timestamp};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// How a round's agents interact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionPattern {
    /// All agents answer independently and concurrently
    Broadcast,
    /// Subordinates answer first; the lead agent decides last
    Hierarchical,
    /// Agents draft, then revise after reading peers' drafts
    PeerReview,
    /// Repeated broadcast rounds until unanimity or the round cap
    ConsensusRounds,
    /// Only recognized domain experts are consulted
    ExpertConsultation,
    /// All agents answer; only the most confident survives
    Competitive,
}

impl InteractionPattern {
    /// Pattern name used in traces.
    pub fn name(&self) -> &'static str {
        match self {
            InteractionPattern::Broadcast => "broadcast",
            InteractionPattern::Hierarchical => "hierarchical",
            InteractionPattern::PeerReview => "peer_review",
            InteractionPattern::ConsensusRounds => "consensus_rounds",
            InteractionPattern::ExpertConsultation => "expert_consultation",
            InteractionPattern::Competitive => "competitive",
        }
    }
}

/// One row of the pattern-selection rule table.
#[derive(Clone, Debug)]
pub struct PatternRule {
    /// Pattern selected when the rule matches
    pub pattern: InteractionPattern,
    /// Keywords; any match in the lowercased task text triggers the rule
    pub keywords: Vec<String>,
    /// Minimum registered agents for the rule to apply
    pub min_agents: usize,
}

impl PatternRule {
    /// Create a rule.
    pub fn new(pattern: InteractionPattern, keywords: &[&str]) -> Self {
        Self {
            pattern,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            min_agents: 1,
        }
    }

    /// Require a minimum agent count.
    pub fn with_min_agents(mut self, min_agents: usize) -> Self {
        self.min_agents = min_agents;
        self
    }

    fn matches(&self, task_lower: &str, agent_count: usize) -> bool {
        agent_count >= self.min_agents
            && self.keywords.iter().any(|k| task_lower.contains(k.as_str()))
    }
}

/// Default rule table. Order matters: the first matching rule wins.
pub fn default_pattern_rules() -> Vec<PatternRule> {
    vec![
        PatternRule::new(
            InteractionPattern::Broadcast,
            &["urgent", "immediately", "asap", "emergency"],
        ),
        PatternRule::new(
            InteractionPattern::PeerReview,
            &["audit", "review", "verify", "double-check"],
        ),
        PatternRule::new(
            InteractionPattern::Hierarchical,
            &["escalate", "approval", "sign-off", "supervisor"],
        ),
        PatternRule::new(
            InteractionPattern::Competitive,
            &["compare", "competitive", "best alternative", "strongest case"],
        ),
        PatternRule::new(
            InteractionPattern::ExpertConsultation,
            &["specialist", "expert", "deep dive"],
        ),
        PatternRule::new(
            InteractionPattern::ConsensusRounds,
            &["consensus", "deliberate", "vote"],
        )
        .with_min_agents(3),
    ]
}

/// Select a pattern for a task by linear scan over the rule table.
/// Falls back to broadcast when nothing matches.
pub fn select_pattern(
    task: &str,
    agent_count: usize,
    rules: &[PatternRule],
) -> InteractionPattern {
    let task_lower = task.to_lowercase();
    rules
        .iter()
        .find(|rule| rule.matches(&task_lower, agent_count))
        .map(|rule| rule.pattern)
        .unwrap_or(InteractionPattern::Broadcast)
}

/// A message between agents within one round.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Message ID
    pub id: String,
    /// Sending agent
    pub sender: String,
    /// Receiving agent
    pub recipient: String,
    /// Message body
    pub body: String,
    /// Timestamp
    pub timestamp: Timestamp,
}

/// In-memory mailboxes for one round of staged interaction.
///
/// A single coarse lock per channel instance keeps sends and broadcasts
/// atomic with respect to each other.
pub struct InteractionChannel {
    mailboxes: Mutex<HashMap<String, VecDeque<ChannelMessage>>>,
}

impl InteractionChannel {
    /// Create an empty channel.
    pub fn new() -> Self {
        Self {
            mailboxes: Mutex::new(HashMap::new()),
        }
    }

    /// Register an agent mailbox.
    pub fn register(&self, agent_id: &str) {
        let mut boxes = self.mailboxes.lock().expect("channel lock poisoned");
        boxes.entry(agent_id.to_string()).or_default();
    }

    /// Send a message to one agent.
    pub fn send(&self, sender: &str, recipient: &str, body: &str) -> Result<()> {
        let mut boxes = self.mailboxes.lock().expect("channel lock poisoned");
        let mailbox = boxes
            .get_mut(recipient)
            .ok_or_else(|| Error::Internal(format!("unknown recipient {recipient}")))?;
        mailbox.push_back(ChannelMessage {
            id: uuid::Uuid::new_v4().to_string(),
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            body: body.to_string(),
            timestamp: now(),
        });
        Ok(())
    }

    /// Send a message to every registered agent except the sender.
    pub fn broadcast(&self, sender: &str, body: &str) {
        let mut boxes = self.mailboxes.lock().expect("channel lock poisoned");
        for (recipient, mailbox) in boxes.iter_mut() {
            if recipient == sender {
                continue;
            }
            mailbox.push_back(ChannelMessage {
                id: uuid::Uuid::new_v4().to_string(),
                sender: sender.to_string(),
                recipient: recipient.clone(),
                body: body.to_string(),
                timestamp: now(),
            });
        }
    }

    /// Drain an agent's mailbox in arrival order.
    pub fn drain(&self, agent_id: &str) -> Vec<ChannelMessage> {
        let mut boxes = self.mailboxes.lock().expect("channel lock poisoned");
        boxes
            .get_mut(agent_id)
            .map(|mailbox| mailbox.drain(..).collect())
            .unwrap_or_default()
    }
}

impl Default for InteractionChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Coordinator configuration.
#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    /// Hard wall-clock timeout per agent invocation within a round
    pub round_timeout: Duration,
    /// Maximum consensus rounds before settling on the last round
    pub max_rounds: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            round_timeout: Duration::from_secs(30),
            max_rounds: 3,
        }
    }
}

/// Raw result of one coordinated round.
#[derive(Clone, Debug)]
pub struct RoundOutcome {
    /// The pattern the round ran under
    pub pattern: InteractionPattern,
    /// Predictions produced by responsive agents
    pub predictions: Vec<Prediction>,
    /// The underlying individual decisions
    pub decisions: Vec<IndividualDecision>,
    /// Agents excluded for exceeding the round timeout
    pub excluded: Vec<String>,
}

enum Invocation {
    Responded(Prediction, IndividualDecision),
    TimedOut(String),
}

/// Runs agents against a task under an interaction pattern.
pub struct InteractionCoordinator {
    config: CoordinatorConfig,
}

impl InteractionCoordinator {
    /// Create a coordinator.
    pub fn new(config: CoordinatorConfig) -> Self {
        Self { config }
    }

    /// Run one round under the given pattern.
    pub async fn run_round(
        &self,
        pattern: InteractionPattern,
        task: &str,
        domain: Option<&str>,
        agents: &[RegisteredAgent],
    ) -> RoundOutcome {
        debug!(pattern = pattern.name(), agents = agents.len(), "starting round");
        let (predictions, decisions, excluded) = match pattern {
            InteractionPattern::Broadcast => self.broadcast_round(task, agents).await,
            InteractionPattern::Hierarchical => self.hierarchical_round(task, agents).await,
            InteractionPattern::PeerReview => self.peer_review_round(task, agents).await,
            InteractionPattern::ConsensusRounds => {
                self.consensus_rounds(task, agents).await
            }
            InteractionPattern::ExpertConsultation => {
                let experts: Vec<RegisteredAgent> = match domain {
                    Some(d) => agents
                        .iter()
                        .filter(|a| {
                            a.profile.expertise_in(d).map(|s| s > 0.7).unwrap_or(false)
                        })
                        .cloned()
                        .collect(),
                    None => Vec::new(),
                };
                if experts.is_empty() {
                    self.broadcast_round(task, agents).await
                } else {
                    self.broadcast_round(task, &experts).await
                }
            }
            InteractionPattern::Competitive => {
                let (mut predictions, decisions, excluded) =
                    self.broadcast_round(task, agents).await;
                // Only the strongest proposal survives a competitive round.
                if !predictions.is_empty() {
                    let mut best = 0;
                    for (i, p) in predictions.iter().enumerate() {
                        if p.confidence > predictions[best].confidence {
                            best = i;
                        }
                    }
                    let winner = predictions.swap_remove(best);
                    predictions = vec![winner];
                }
                (predictions, decisions, excluded)
            }
        };
        RoundOutcome {
            pattern,
            predictions,
            decisions,
            excluded,
        }
    }

    /// Invoke one agent under the round timeout. Errors are coerced to a
    /// fallback abstention; timeouts exclude the agent from the round.
    async fn invoke(&self, registered: &RegisteredAgent, task: &str) -> Invocation {
        let agent_id = registered.profile.id.clone();
        match tokio::time::timeout(self.config.round_timeout, registered.agent.run(task))
            .await
        {
            Ok(Ok(decision)) => {
                let prediction = Prediction::new(
                    &agent_id,
                    PredictionValue::parse(&decision.decision),
                    decision.confidence,
                );
                Invocation::Responded(
                    prediction,
                    IndividualDecision::from_decision(&agent_id, &decision),
                )
            }
            Ok(Err(err)) => {
                warn!(agent = %agent_id, error = %err, "agent failed; coercing to abstention");
                let prediction =
                    Prediction::new(&agent_id, PredictionValue::Text("abstain".into()), 0.0);
                let decision = IndividualDecision {
                    agent_id: agent_id.clone(),
                    decision: "abstain".to_string(),
                    justification: format!("agent error: {err}"),
                    confidence: 0.0,
                    risk_score: 1.0,
                };
                Invocation::Responded(prediction, decision)
            }
            Err(_) => {
                warn!(agent = %agent_id, "agent exceeded round timeout; excluded");
                Invocation::TimedOut(agent_id)
            }
        }
    }

    async fn broadcast_round(
        &self,
        task: &str,
        agents: &[RegisteredAgent],
    ) -> (Vec<Prediction>, Vec<IndividualDecision>, Vec<String>) {
        let invocations = join_all(agents.iter().map(|a| self.invoke(a, task))).await;
        collect(invocations)
    }

    async fn hierarchical_round(
        &self,
        task: &str,
        agents: &[RegisteredAgent],
    ) -> (Vec<Prediction>, Vec<IndividualDecision>, Vec<String>) {
        if agents.len() < 2 {
            return self.broadcast_round(task, agents).await;
        }
        let lead = &agents[0];
        let subordinates = &agents[1..];

        let channel = InteractionChannel::new();
        channel.register(&lead.profile.id);
        for sub in subordinates {
            channel.register(&sub.profile.id);
        }

        // Stage 1: subordinates answer concurrently.
        let (mut predictions, mut decisions, mut excluded) =
            self.broadcast_round(task, subordinates).await;
        for p in &predictions {
            let _ = channel.send(
                &p.agent_id,
                &lead.profile.id,
                &format!("{} (confidence {:.2})", p.value.label(), p.confidence),
            );
        }

        // Stage 2: the lead decides strictly after stage 1 completes.
        let assessments = channel
            .drain(&lead.profile.id)
            .into_iter()
            .map(|m| format!("- {}: {}", m.sender, m.body))
            .collect::<Vec<_>>()
            .join("\n");
        let lead_task = format!("{task}\n\nSubordinate assessments:\n{assessments}");
        match self.invoke(lead, &lead_task).await {
            Invocation::Responded(p, d) => {
                predictions.push(p);
                decisions.push(d);
            }
            Invocation::TimedOut(id) => excluded.push(id),
        }
        (predictions, decisions, excluded)
    }

    async fn peer_review_round(
        &self,
        task: &str,
        agents: &[RegisteredAgent],
    ) -> (Vec<Prediction>, Vec<IndividualDecision>, Vec<String>) {
        // Stage 1: independent drafts.
        let (drafts, _, mut excluded) = self.broadcast_round(task, agents).await;
        if drafts.is_empty() {
            return (Vec::new(), Vec::new(), excluded);
        }

        let channel = InteractionChannel::new();
        let responsive: Vec<&RegisteredAgent> = agents
            .iter()
            .filter(|a| drafts.iter().any(|p| p.agent_id == a.profile.id))
            .collect();
        for agent in &responsive {
            channel.register(&agent.profile.id);
        }
        for draft in &drafts {
            channel.broadcast(
                &draft.agent_id,
                &format!("{} (confidence {:.2})", draft.value.label(), draft.confidence),
            );
        }

        // Stage 2: each responsive agent revises with its peers' drafts.
        let review_tasks: Vec<(usize, String)> = responsive
            .iter()
            .enumerate()
            .map(|(i, agent)| {
                let peers = channel
                    .drain(&agent.profile.id)
                    .into_iter()
                    .map(|m| format!("- {}: {}", m.sender, m.body))
                    .collect::<Vec<_>>()
                    .join("\n");
                (i, format!("{task}\n\nPeer drafts:\n{peers}"))
            })
            .collect();
        let invocations = join_all(
            review_tasks
                .iter()
                .map(|(i, review_task)| self.invoke(responsive[*i], review_task)),
        )
        .await;
        let (predictions, decisions, late_excluded) = collect(invocations);
        excluded.extend(late_excluded);
        (predictions, decisions, excluded)
    }

    async fn consensus_rounds(
        &self,
        task: &str,
        agents: &[RegisteredAgent],
    ) -> (Vec<Prediction>, Vec<IndividualDecision>, Vec<String>) {
        let mut current_task = task.to_string();
        let mut last = (Vec::new(), Vec::new(), Vec::new());
        for round in 1..=self.config.max_rounds.max(1) {
            last = self.broadcast_round(&current_task, agents).await;
            let (predictions, _, _) = &last;
            if unanimous(predictions) {
                debug!(round, "consensus rounds converged");
                break;
            }
            let positions = predictions
                .iter()
                .map(|p| format!("- {}: {} (confidence {:.2})", p.agent_id, p.value.label(), p.confidence))
                .collect::<Vec<_>>()
                .join("\n");
            current_task =
                format!("{task}\n\nPositions after round {round}:\n{positions}");
        }
        last
    }
}

impl Default for InteractionCoordinator {
    fn default() -> Self {
        Self::new(CoordinatorConfig::default())
    }
}

fn collect(
    invocations: Vec<Invocation>,
) -> (Vec<Prediction>, Vec<IndividualDecision>, Vec<String>) {
    let mut predictions = Vec::new();
    let mut decisions = Vec::new();
    let mut excluded = Vec::new();
    for invocation in invocations {
        match invocation {
            Invocation::Responded(p, d) => {
                predictions.push(p);
                decisions.push(d);
            }
            Invocation::TimedOut(id) => excluded.push(id),
        }
    }
    (predictions, decisions, excluded)
}

fn unanimous(predictions: &[Prediction]) -> bool {
    match predictions.first() {
        Some(first) => {
            let label = first.value.label();
            predictions.iter().all(|p| p.value.label() == label)
        }
        None => false,
    }
}
