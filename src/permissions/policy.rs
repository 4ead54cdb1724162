//! Transaction policy model.
//!
//! Policies are named constraint sets; multiple enabled policies apply
//! conjunctively and evaluation never mutates them.

use serde::{Deserialize, Serialize};

/// Action suggested by a violation, and the final verdict of an
/// evaluation. Variant order encodes restrictiveness: `Deny` >
/// `RequireApproval` > `Allow`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PolicyAction {
    /// Transaction may proceed
    Allow,
    /// Suspend pending external confirmation
    RequireApproval,
    /// Transaction must not be signed
    Deny,
}

/// A rolling rate/volume limit over a trailing duration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Trailing window length in seconds
    pub duration_secs: u64,
    /// Maximum transaction count within the window
    pub max_transactions: Option<u32>,
    /// Maximum cumulative value within the window (native units)
    pub max_total_value: Option<f64>,
}

impl TimeWindow {
    /// Create a window with no limits set.
    pub fn new(duration_secs: u64) -> Self {
        Self {
            duration_secs,
            max_transactions: None,
            max_total_value: None,
        }
    }

    /// Cap the transaction count.
    pub fn with_max_transactions(mut self, count: u32) -> Self {
        self.max_transactions = Some(count);
        self
    }

    /// Cap the cumulative value.
    pub fn with_max_total_value(mut self, value: f64) -> Self {
        self.max_total_value = Some(value);
        self
    }
}

/// A named, enabled/disabled set of transaction constraints. Values are in
/// decimal native-token units unless stated otherwise.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionPolicy {
    /// Policy name
    pub name: String,
    /// Whether the policy participates in evaluation
    pub enabled: bool,
    /// Maximum single-transaction value
    pub max_transaction_value: Option<f64>,
    /// Rolling 24h spending cap
    pub daily_spending_limit: Option<f64>,
    /// Rolling rate/volume windows
    pub time_windows: Vec<TimeWindow>,
    /// Destination allow-list (empty = all allowed)
    pub allowed_destinations: Vec<String>,
    /// Destination deny-list (takes precedence, checked first)
    pub blocked_destinations: Vec<String>,
    /// Whether transactions with calldata are permitted
    pub allow_contract_interactions: bool,
    /// Allowed hours of day, UTC (empty = all hours)
    pub allowed_hours_utc: Vec<u8>,
    /// Gas price ceiling in wei
    pub max_gas_price: Option<u128>,
    /// Gas limit ceiling
    pub max_gas_limit: Option<u64>,
}

impl TransactionPolicy {
    /// Create an enabled policy with no constraints.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            enabled: true,
            max_transaction_value: None,
            daily_spending_limit: None,
            time_windows: Vec::new(),
            allowed_destinations: Vec::new(),
            blocked_destinations: Vec::new(),
            allow_contract_interactions: true,
            allowed_hours_utc: Vec::new(),
            max_gas_price: None,
            max_gas_limit: None,
        }
    }

    /// Cap single-transaction value.
    pub fn with_max_transaction_value(mut self, value: f64) -> Self {
        self.max_transaction_value = Some(value);
        self
    }

    /// Cap rolling daily spend.
    pub fn with_daily_spending_limit(mut self, value: f64) -> Self {
        self.daily_spending_limit = Some(value);
        self
    }

    /// Add a rolling time window limit.
    pub fn with_time_window(mut self, window: TimeWindow) -> Self {
        self.time_windows.push(window);
        self
    }

    /// Add an allowed destination.
    pub fn with_allowed_destination(mut self, destination: &str) -> Self {
        self.allowed_destinations.push(destination.to_string());
        self
    }

    /// Add a blocked destination.
    pub fn with_blocked_destination(mut self, destination: &str) -> Self {
        self.blocked_destinations.push(destination.to_string());
        self
    }

    /// Deny transactions that carry calldata.
    pub fn deny_contract_interactions(mut self) -> Self {
        self.allow_contract_interactions = false;
        self
    }

    /// Restrict to the given UTC hours.
    pub fn with_allowed_hours(mut self, hours: &[u8]) -> Self {
        self.allowed_hours_utc = hours.to_vec();
        self
    }

    /// Cap gas price (wei).
    pub fn with_max_gas_price(mut self, wei: u128) -> Self {
        self.max_gas_price = Some(wei);
        self
    }

    /// Cap gas limit.
    pub fn with_max_gas_limit(mut self, limit: u64) -> Self {
        self.max_gas_limit = Some(limit);
        self
    }

    /// Disable the policy without removing it.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// One constraint breach found during evaluation. Ephemeral, produced per
/// evaluation call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolicyViolation {
    /// Policy that was breached
    pub policy_name: String,
    /// Which constraint was breached
    pub violation_type: String,
    /// Human-readable description
    pub description: String,
    /// Suggested action
    pub suggested_action: PolicyAction,
}
