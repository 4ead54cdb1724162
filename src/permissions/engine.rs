//! Transaction permission engine.
//!
//! Gates any wallet operation the agents trigger. Every enabled policy is
//! evaluated independently and conjunctively; the returned action is the
//! most restrictive across all violations, and no violation is silently
//! swallowed.

use crate::core::now;
use crate::permissions::history::{HistoryEntry, TransactionHistory};
use crate::permissions::policy::{PolicyAction, PolicyViolation, TransactionPolicy};
use chrono::{Duration, Timelike};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Wei per native token unit.
pub const WEI_PER_NATIVE: f64 = 1e18;

/// A concrete transaction awaiting permission.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionRequest {
    /// Destination address
    pub to: String,
    /// Value in wei
    pub value_wei: u128,
    /// Calldata (empty for plain transfers)
    pub data: Vec<u8>,
    /// Gas price in wei, if set
    pub gas_price: Option<u128>,
    /// Gas limit, if set
    pub gas_limit: Option<u64>,
}

impl TransactionRequest {
    /// Create a plain transfer.
    pub fn new(to: &str, value_wei: u128) -> Self {
        Self {
            to: to.to_string(),
            value_wei,
            data: Vec::new(),
            gas_price: None,
            gas_limit: None,
        }
    }

    /// Attach calldata (a contract interaction).
    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    /// Set the gas price in wei.
    pub fn with_gas_price(mut self, wei: u128) -> Self {
        self.gas_price = Some(wei);
        self
    }

    /// Set the gas limit.
    pub fn with_gas_limit(mut self, limit: u64) -> Self {
        self.gas_limit = Some(limit);
        self
    }

    /// Value normalized from wei to decimal native units.
    pub fn value_native(&self) -> f64 {
        self.value_wei as f64 / WEI_PER_NATIVE
    }
}

/// Verdict of one evaluation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PermissionDecision {
    /// Most restrictive action across all violations
    pub action: PolicyAction,
    /// Every violation found, in policy order
    pub violations: Vec<PolicyViolation>,
}

impl PermissionDecision {
    /// Whether the transaction may be signed without further steps.
    pub fn allowed(&self) -> bool {
        self.action == PolicyAction::Allow
    }
}

/// Policy gate evaluated against any concrete transaction before signing.
pub struct TransactionPermissionEngine {
    policies: Vec<TransactionPolicy>,
    history: TransactionHistory,
}

impl TransactionPermissionEngine {
    /// Create an engine with no policies (everything allowed).
    pub fn new() -> Self {
        Self {
            policies: Vec::new(),
            history: TransactionHistory::new(),
        }
    }

    /// Add a policy.
    pub fn with_policy(mut self, policy: TransactionPolicy) -> Self {
        self.policies.push(policy);
        self
    }

    /// The backing history ledger.
    pub fn history(&self) -> &TransactionHistory {
        &self.history
    }

    /// Evaluate a transaction for a wallet against every enabled policy.
    pub fn evaluate(
        &self,
        transaction: &TransactionRequest,
        wallet_id: &str,
    ) -> PermissionDecision {
        let mut violations = Vec::new();
        for policy in self.policies.iter().filter(|p| p.enabled) {
            violations.extend(self.check_policy(policy, transaction, wallet_id));
        }

        let action = violations
            .iter()
            .map(|v| v.suggested_action)
            .max()
            .unwrap_or(PolicyAction::Allow);
        if action != PolicyAction::Allow {
            warn!(
                wallet = wallet_id,
                ?action,
                violations = violations.len(),
                "transaction restricted"
            );
        } else {
            debug!(wallet = wallet_id, "transaction allowed");
        }
        PermissionDecision { action, violations }
    }

    /// Record a successfully executed transaction so the next evaluation
    /// sees it in the rolling windows.
    pub fn record_execution(
        &self,
        wallet_id: &str,
        tx_hash: &str,
        transaction: &TransactionRequest,
    ) {
        self.history.record(
            wallet_id,
            HistoryEntry::new(tx_hash, transaction.value_native(), &transaction.to),
        );
    }

    fn check_policy(
        &self,
        policy: &TransactionPolicy,
        transaction: &TransactionRequest,
        wallet_id: &str,
    ) -> Vec<PolicyViolation> {
        let mut violations = Vec::new();
        let value = transaction.value_native();
        let deny = |violation_type: &str, description: String| PolicyViolation {
            policy_name: policy.name.clone(),
            violation_type: violation_type.to_string(),
            description,
            suggested_action: PolicyAction::Deny,
        };

        if let Some(max) = policy.max_transaction_value {
            if value > max {
                violations.push(deny(
                    "max_transaction_value",
                    format!("value {value} exceeds per-transaction cap {max}"),
                ));
            }
        }

        if let Some(limit) = policy.daily_spending_limit {
            let spent = self.history.spent_within(wallet_id, Duration::hours(24));
            if spent + value > limit {
                violations.push(deny(
                    "daily_spending_limit",
                    format!("daily spend {spent} + {value} exceeds cap {limit}"),
                ));
            }
        }

        // Blocked list takes precedence and is evaluated first.
        let destination = transaction.to.as_str();
        if policy
            .blocked_destinations
            .iter()
            .any(|d| d.eq_ignore_ascii_case(destination))
        {
            violations.push(deny(
                "blocked_destination",
                format!("destination {destination} is blocked"),
            ));
        } else if !policy.allowed_destinations.is_empty()
            && !policy
                .allowed_destinations
                .iter()
                .any(|d| d.eq_ignore_ascii_case(destination))
        {
            violations.push(deny(
                "destination_not_allowed",
                format!("destination {destination} is not on the allow-list"),
            ));
        }

        if !policy.allow_contract_interactions && !transaction.data.is_empty() {
            violations.push(deny(
                "contract_interaction",
                "contract interactions are disabled".to_string(),
            ));
        }

        if !policy.allowed_hours_utc.is_empty() {
            let hour = now().hour() as u8;
            if !policy.allowed_hours_utc.contains(&hour) {
                violations.push(deny(
                    "outside_allowed_hours",
                    format!("hour {hour} UTC is outside the allowed window"),
                ));
            }
        }

        // Gas ceilings are suspicious, not malicious: require approval
        // rather than denying outright.
        if let (Some(max), Some(price)) = (policy.max_gas_price, transaction.gas_price) {
            if price > max {
                violations.push(PolicyViolation {
                    policy_name: policy.name.clone(),
                    violation_type: "max_gas_price".to_string(),
                    description: format!("gas price {price} exceeds ceiling {max}"),
                    suggested_action: PolicyAction::RequireApproval,
                });
            }
        }
        if let (Some(max), Some(limit)) = (policy.max_gas_limit, transaction.gas_limit) {
            if limit > max {
                violations.push(PolicyViolation {
                    policy_name: policy.name.clone(),
                    violation_type: "max_gas_limit".to_string(),
                    description: format!("gas limit {limit} exceeds ceiling {max}"),
                    suggested_action: PolicyAction::RequireApproval,
                });
            }
        }

        for window in &policy.time_windows {
            let trailing = Duration::seconds(window.duration_secs as i64);
            if let Some(max) = window.max_transactions {
                let count = self.history.count_within(wallet_id, trailing);
                if count as u32 + 1 > max {
                    violations.push(deny(
                        "time_window_rate",
                        format!(
                            "{count} prior transactions in {}s window (max {max})",
                            window.duration_secs
                        ),
                    ));
                }
            }
            if let Some(max) = window.max_total_value {
                let spent = self.history.spent_within(wallet_id, trailing);
                if spent + value > max {
                    violations.push(deny(
                        "time_window_value",
                        format!(
                            "window spend {spent} + {value} exceeds cap {max}",
                        ),
                    ));
                }
            }
        }

        violations
    }
}

impl Default for TransactionPermissionEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::policy::TimeWindow;
    use chrono::Timelike;

    const TENTH_NATIVE: u128 = 100_000_000_000_000_000; // 0.1 in wei

    fn engine_with(policy: TransactionPolicy) -> TransactionPermissionEngine {
        TransactionPermissionEngine::new().with_policy(policy)
    }

    #[test]
    fn test_value_normalization() {
        let tx = TransactionRequest::new("0xdest", 2 * TENTH_NATIVE);
        assert!((tx.value_native() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_max_value_denied_and_under_cap_allowed() {
        let engine = engine_with(
            TransactionPolicy::new("cap").with_max_transaction_value(0.1),
        );

        // 0.2 over a 0.1 cap is denied with the specific violation.
        let over = TransactionRequest::new("0xdest", 2 * TENTH_NATIVE);
        let decision = engine.evaluate(&over, "w1");
        assert_eq!(decision.action, PolicyAction::Deny);
        assert!(decision
            .violations
            .iter()
            .any(|v| v.violation_type == "max_transaction_value"));

        // 0.05 with no prior spend today is allowed.
        let under = TransactionRequest::new("0xdest", TENTH_NATIVE / 2);
        let decision = engine.evaluate(&under, "w1");
        assert!(decision.allowed());
        assert!(decision.violations.is_empty());
    }

    #[test]
    fn test_deny_dominates_other_actions() {
        let engine = engine_with(
            TransactionPolicy::new("strict")
                .with_max_transaction_value(0.1)
                .with_max_gas_price(1_000_000),
        );
        let tx = TransactionRequest::new("0xdest", 2 * TENTH_NATIVE)
            .with_gas_price(2_000_000);
        let decision = engine.evaluate(&tx, "w1");
        // Both a Deny and a RequireApproval violation exist; Deny wins.
        assert_eq!(decision.action, PolicyAction::Deny);
        assert_eq!(decision.violations.len(), 2);
    }

    #[test]
    fn test_daily_spending_limit_counts_history() {
        let engine = engine_with(
            TransactionPolicy::new("daily").with_daily_spending_limit(0.6),
        );
        let prior = TransactionRequest::new("0xdest", 5 * TENTH_NATIVE);
        engine.record_execution("w1", "0xaaa", &prior);

        // 0.5 spent + 0.2 requested > 0.6 cap.
        let tx = TransactionRequest::new("0xdest", 2 * TENTH_NATIVE);
        let decision = engine.evaluate(&tx, "w1");
        assert_eq!(decision.action, PolicyAction::Deny);
        assert!(decision
            .violations
            .iter()
            .any(|v| v.violation_type == "daily_spending_limit"));

        // A different wallet is unaffected.
        assert!(engine.evaluate(&tx, "w2").allowed());
    }

    #[test]
    fn test_blocked_destination_takes_precedence() {
        let engine = engine_with(
            TransactionPolicy::new("dest")
                .with_allowed_destination("0xdest")
                .with_blocked_destination("0xdest"),
        );
        let decision = engine.evaluate(&TransactionRequest::new("0xDEST", 1), "w1");
        assert_eq!(decision.action, PolicyAction::Deny);
        assert_eq!(decision.violations.len(), 1);
        assert_eq!(decision.violations[0].violation_type, "blocked_destination");
    }

    #[test]
    fn test_allow_list_restricts_destinations() {
        let engine = engine_with(
            TransactionPolicy::new("dest").with_allowed_destination("0xgood"),
        );
        assert!(engine
            .evaluate(&TransactionRequest::new("0xgood", 1), "w1")
            .allowed());
        let decision = engine.evaluate(&TransactionRequest::new("0xother", 1), "w1");
        assert!(decision
            .violations
            .iter()
            .any(|v| v.violation_type == "destination_not_allowed"));
    }

    #[test]
    fn test_contract_interaction_block() {
        let engine = engine_with(
            TransactionPolicy::new("transfers-only").deny_contract_interactions(),
        );
        assert!(engine
            .evaluate(&TransactionRequest::new("0xdest", 1), "w1")
            .allowed());
        let call = TransactionRequest::new("0xdest", 1).with_data(vec![0xa9, 0x05]);
        let decision = engine.evaluate(&call, "w1");
        assert_eq!(decision.action, PolicyAction::Deny);
    }

    #[test]
    fn test_gas_ceilings_require_approval_not_deny() {
        let engine = engine_with(
            TransactionPolicy::new("gas")
                .with_max_gas_price(1_000_000)
                .with_max_gas_limit(21_000),
        );
        let tx = TransactionRequest::new("0xdest", 1)
            .with_gas_price(5_000_000)
            .with_gas_limit(100_000);
        let decision = engine.evaluate(&tx, "w1");
        assert_eq!(decision.action, PolicyAction::RequireApproval);
        assert_eq!(decision.violations.len(), 2);
        assert!(decision
            .violations
            .iter()
            .all(|v| v.suggested_action == PolicyAction::RequireApproval));
    }

    #[test]
    fn test_time_window_rate_limit() {
        let engine = engine_with(
            TransactionPolicy::new("rate")
                .with_time_window(TimeWindow::new(3600).with_max_transactions(2)),
        );
        let tx = TransactionRequest::new("0xdest", 1);
        engine.record_execution("w1", "0xaaa", &tx);
        engine.record_execution("w1", "0xbbb", &tx);

        let decision = engine.evaluate(&tx, "w1");
        assert_eq!(decision.action, PolicyAction::Deny);
        assert!(decision
            .violations
            .iter()
            .any(|v| v.violation_type == "time_window_rate"));
    }

    #[test]
    fn test_time_window_value_limit() {
        let engine = engine_with(
            TransactionPolicy::new("volume")
                .with_time_window(TimeWindow::new(3600).with_max_total_value(0.5)),
        );
        let prior = TransactionRequest::new("0xdest", 4 * TENTH_NATIVE);
        engine.record_execution("w1", "0xaaa", &prior);

        let tx = TransactionRequest::new("0xdest", 2 * TENTH_NATIVE);
        let decision = engine.evaluate(&tx, "w1");
        assert!(decision
            .violations
            .iter()
            .any(|v| v.violation_type == "time_window_value"));
    }

    #[test]
    fn test_disabled_policy_is_skipped() {
        let engine = engine_with(
            TransactionPolicy::new("cap")
                .with_max_transaction_value(0.1)
                .disabled(),
        );
        let tx = TransactionRequest::new("0xdest", 2 * TENTH_NATIVE);
        assert!(engine.evaluate(&tx, "w1").allowed());
    }

    #[test]
    fn test_allowed_hours_restriction() {
        let this_hour = now().hour() as u8;
        let next_hour = (this_hour + 1) % 24;

        let open = engine_with(
            TransactionPolicy::new("hours").with_allowed_hours(&[this_hour]),
        );
        assert!(open
            .evaluate(&TransactionRequest::new("0xdest", 1), "w1")
            .allowed());

        let closed = engine_with(
            TransactionPolicy::new("hours").with_allowed_hours(&[next_hour]),
        );
        let decision = closed.evaluate(&TransactionRequest::new("0xdest", 1), "w1");
        assert!(decision
            .violations
            .iter()
            .any(|v| v.violation_type == "outside_allowed_hours"));
    }

    #[test]
    fn test_policies_apply_conjunctively() {
        let engine = TransactionPermissionEngine::new()
            .with_policy(TransactionPolicy::new("cap").with_max_transaction_value(0.1))
            .with_policy(TransactionPolicy::new("dest").with_blocked_destination("0xdest"));
        let tx = TransactionRequest::new("0xdest", 2 * TENTH_NATIVE);
        let decision = engine.evaluate(&tx, "w1");
        // Both policies contribute violations; none are swallowed.
        assert_eq!(decision.violations.len(), 2);
        let policies: Vec<&str> = decision
            .violations
            .iter()
            .map(|v| v.policy_name.as_str())
            .collect();
        assert!(policies.contains(&"cap"));
        assert!(policies.contains(&"dest"));
    }
}
