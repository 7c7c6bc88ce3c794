//! Insurance policies.

use crate::core::{now, AccountId, Amount, Timestamp};
use crate::oracle::{FlightKey, FlightStatus};
use serde::{Deserialize, Serialize};

/// Unique policy key: one policy per passenger per flight departure.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PolicyKey {
    pub passenger: AccountId,
    pub flight: FlightKey,
}

impl PolicyKey {
    /// Create a new policy key.
    pub fn new(passenger: AccountId, flight: FlightKey) -> Self {
        Self { passenger, flight }
    }
}

impl std::fmt::Display for PolicyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.passenger, self.flight)
    }
}

/// How a policy was closed out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Final flight status applied
    pub status: FlightStatus,
    /// Credit granted (zero unless the airline was at fault)
    pub credited: Amount,
    /// When the policy was settled
    pub settled_at: Timestamp,
}

/// A purchased policy. Kept forever for audit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Policy {
    pub key: PolicyKey,
    pub premium: Amount,
    pub purchased_at: Timestamp,
    pub settlement: Option<Settlement>,
}

impl Policy {
    /// Create an unsettled policy.
    pub fn new(key: PolicyKey, premium: Amount) -> Self {
        Self {
            key,
            premium,
            purchased_at: now(),
            settlement: None,
        }
    }

    /// Whether the consensus outcome was already applied.
    pub fn is_settled(&self) -> bool {
        self.settlement.is_some()
    }
}
