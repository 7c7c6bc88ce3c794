//! Flight status requests and response aggregation.

use crate::core::{now, sha3_256_multi, AccountId, Hash256, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Flight status reported by oracles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FlightStatus {
    Unknown,
    OnTime,
    LateAirline,
    LateWeather,
    LateTechnical,
    LateOther,
}

impl FlightStatus {
    /// Numeric status code.
    pub fn code(&self) -> u8 {
        match self {
            FlightStatus::Unknown => 0,
            FlightStatus::OnTime => 10,
            FlightStatus::LateAirline => 20,
            FlightStatus::LateWeather => 30,
            FlightStatus::LateTechnical => 40,
            FlightStatus::LateOther => 50,
        }
    }

    /// Parse a numeric status code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(FlightStatus::Unknown),
            10 => Some(FlightStatus::OnTime),
            20 => Some(FlightStatus::LateAirline),
            30 => Some(FlightStatus::LateWeather),
            40 => Some(FlightStatus::LateTechnical),
            50 => Some(FlightStatus::LateOther),
            _ => None,
        }
    }

    /// Whether the delay is the airline's fault, the only payable outcome.
    pub fn is_airline_fault(&self) -> bool {
        *self == FlightStatus::LateAirline
    }
}

/// Identifies one flight departure: (airline, flight code, timestamp).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FlightKey {
    pub airline: AccountId,
    pub flight: String,
    /// Scheduled departure, seconds since the Unix epoch
    pub timestamp: u64,
}

impl FlightKey {
    /// Create a new flight key.
    pub fn new(airline: AccountId, flight: impl Into<String>, timestamp: u64) -> Self {
        Self {
            airline,
            flight: flight.into(),
            timestamp,
        }
    }

    /// Content hash of the key.
    pub fn digest(&self) -> Hash256 {
        sha3_256_multi(&[
            self.airline.as_str().as_bytes(),
            self.flight.as_bytes(),
            &self.timestamp.to_be_bytes(),
        ])
    }
}

impl std::fmt::Display for FlightKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}", self.airline, self.flight, self.timestamp)
    }
}

/// Handling of an oracle that answers again with a different status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevotePolicy {
    /// Keep the first answer and ignore the new one
    Reject,
    /// Move the oracle's vote to the new status
    Overwrite,
}

/// Result of recording one response against a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VoteRecord {
    /// Vote stored; carries the bucket size for that status
    Counted(usize),
    /// Same oracle, same status: nothing changed
    Duplicate,
    /// Same oracle, different status, rejected by policy
    Conflicting,
    /// Vote stored and the bucket reached quorum
    Quorum,
    /// Request already finalized
    Closed,
}

/// An open or finalized flight status request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusRequest {
    /// Flight this request is about
    pub key: FlightKey,
    /// Capability index allowed to answer
    pub index: u8,
    /// Who asked
    pub requester: AccountId,
    /// Oracles that reported each status
    pub responses: BTreeMap<FlightStatus, BTreeSet<AccountId>>,
    /// Winning status once quorum is reached
    pub finalized: Option<FlightStatus>,
    /// When the request was opened
    pub opened_at: Timestamp,
}

impl StatusRequest {
    /// Open a new request.
    pub fn open(key: FlightKey, index: u8, requester: AccountId) -> Self {
        Self {
            key,
            index,
            requester,
            responses: BTreeMap::new(),
            finalized: None,
            opened_at: now(),
        }
    }

    /// Whether the request still accepts responses.
    pub fn is_open(&self) -> bool {
        self.finalized.is_none()
    }

    /// The status this oracle currently votes for, if any.
    pub fn vote_of(&self, oracle: &AccountId) -> Option<FlightStatus> {
        self.responses
            .iter()
            .find(|(_, voters)| voters.contains(oracle))
            .map(|(status, _)| *status)
    }

    /// Number of oracles reporting `status`.
    pub fn votes_for(&self, status: FlightStatus) -> usize {
        self.responses.get(&status).map_or(0, |v| v.len())
    }

    /// What recording this response would do, without changing anything.
    pub fn preview(
        &self,
        oracle: &AccountId,
        status: FlightStatus,
        policy: RevotePolicy,
        quorum: usize,
    ) -> VoteRecord {
        if !self.is_open() {
            return VoteRecord::Closed;
        }

        match self.vote_of(oracle) {
            Some(previous) if previous == status => return VoteRecord::Duplicate,
            Some(_) if policy == RevotePolicy::Reject => return VoteRecord::Conflicting,
            _ => {}
        }

        // The oracle is not in the `status` bucket yet.
        let count = self.votes_for(status) + 1;
        if count >= quorum {
            VoteRecord::Quorum
        } else {
            VoteRecord::Counted(count)
        }
    }

    /// Record a response. An oracle sits in at most one bucket; the first
    /// bucket to reach `quorum` finalizes the request.
    pub fn record(
        &mut self,
        oracle: &AccountId,
        status: FlightStatus,
        policy: RevotePolicy,
        quorum: usize,
    ) -> VoteRecord {
        let outcome = self.preview(oracle, status, policy, quorum);
        if !matches!(outcome, VoteRecord::Counted(_) | VoteRecord::Quorum) {
            return outcome;
        }

        if let Some(previous) = self.vote_of(oracle) {
            if let Some(voters) = self.responses.get_mut(&previous) {
                voters.remove(oracle);
                if voters.is_empty() {
                    self.responses.remove(&previous);
                }
            }
        }
        self.responses
            .entry(status)
            .or_default()
            .insert(oracle.clone());

        if outcome == VoteRecord::Quorum {
            self.finalized = Some(status);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> StatusRequest {
        let key = FlightKey::new(AccountId::from("airline-1"), "ND1309", 1_600_000_000);
        StatusRequest::open(key, 4, AccountId::from("airline-1"))
    }

    fn oracle(n: usize) -> AccountId {
        AccountId::new(format!("oracle-{}", n))
    }

    #[test]
    fn test_status_codes_roundtrip() {
        for code in [0u8, 10, 20, 30, 40, 50] {
            assert_eq!(FlightStatus::from_code(code).unwrap().code(), code);
        }
        assert!(FlightStatus::from_code(15).is_none());
        assert!(FlightStatus::LateAirline.is_airline_fault());
        assert!(!FlightStatus::LateWeather.is_airline_fault());
    }

    #[test]
    fn test_flight_key_digest() {
        let a = FlightKey::new(AccountId::from("a"), "F1", 1);
        let b = FlightKey::new(AccountId::from("a"), "F1", 2);
        assert_eq!(a.digest(), a.clone().digest());
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn test_quorum_finalizes_once() {
        let mut req = request();
        let vote = |req: &mut StatusRequest, n, status| {
            req.record(&oracle(n), status, RevotePolicy::Reject, 3)
        };
        assert_eq!(vote(&mut req, 1, FlightStatus::OnTime), VoteRecord::Counted(1));
        assert_eq!(vote(&mut req, 2, FlightStatus::OnTime), VoteRecord::Counted(2));
        assert_eq!(vote(&mut req, 3, FlightStatus::OnTime), VoteRecord::Quorum);
        assert_eq!(req.finalized, Some(FlightStatus::OnTime));

        assert_eq!(vote(&mut req, 4, FlightStatus::OnTime), VoteRecord::Closed);
        assert_eq!(vote(&mut req, 5, FlightStatus::LateOther), VoteRecord::Closed);
        assert_eq!(req.votes_for(FlightStatus::OnTime), 3);
    }

    #[test]
    fn test_preview_leaves_request_untouched() {
        let mut req = request();
        req.record(&oracle(1), FlightStatus::LateAirline, RevotePolicy::Reject, 3);
        req.record(&oracle(2), FlightStatus::LateAirline, RevotePolicy::Reject, 3);

        let preview = req.preview(&oracle(3), FlightStatus::LateAirline, RevotePolicy::Reject, 3);
        assert_eq!(preview, VoteRecord::Quorum);
        assert!(req.is_open());
        assert_eq!(req.votes_for(FlightStatus::LateAirline), 2);
        assert_eq!(req.vote_of(&oracle(3)), None);

        let conflicting = req.preview(&oracle(1), FlightStatus::OnTime, RevotePolicy::Reject, 3);
        assert_eq!(conflicting, VoteRecord::Conflicting);
        let moved = req.preview(&oracle(1), FlightStatus::OnTime, RevotePolicy::Overwrite, 3);
        assert_eq!(moved, VoteRecord::Counted(1));
        assert_eq!(req.vote_of(&oracle(1)), Some(FlightStatus::LateAirline));
    }

    #[test]
    fn test_duplicate_vote_idempotent() {
        let mut req = request();
        req.record(&oracle(1), FlightStatus::LateAirline, RevotePolicy::Reject, 3);
        let again = req.record(&oracle(1), FlightStatus::LateAirline, RevotePolicy::Reject, 3);
        assert_eq!(again, VoteRecord::Duplicate);
        assert_eq!(req.votes_for(FlightStatus::LateAirline), 1);
    }

    #[test]
    fn test_reject_policy_keeps_first_vote() {
        let mut req = request();
        req.record(&oracle(1), FlightStatus::OnTime, RevotePolicy::Reject, 3);
        let result = req.record(&oracle(1), FlightStatus::LateWeather, RevotePolicy::Reject, 3);
        assert_eq!(result, VoteRecord::Conflicting);
        assert_eq!(req.vote_of(&oracle(1)), Some(FlightStatus::OnTime));
    }

    #[test]
    fn test_overwrite_policy_moves_vote() {
        let mut req = request();
        req.record(&oracle(1), FlightStatus::OnTime, RevotePolicy::Overwrite, 3);
        let result = req.record(&oracle(1), FlightStatus::LateWeather, RevotePolicy::Overwrite, 3);
        assert_eq!(result, VoteRecord::Counted(1));
        assert_eq!(req.vote_of(&oracle(1)), Some(FlightStatus::LateWeather));
        assert_eq!(req.votes_for(FlightStatus::OnTime), 0);
        assert!(!req.responses.contains_key(&FlightStatus::OnTime));
    }

    #[test]
    fn test_split_votes_do_not_finalize() {
        let mut req = request();
        req.record(&oracle(1), FlightStatus::OnTime, RevotePolicy::Reject, 3);
        req.record(&oracle(2), FlightStatus::OnTime, RevotePolicy::Reject, 3);
        req.record(&oracle(3), FlightStatus::LateWeather, RevotePolicy::Reject, 3);
        req.record(&oracle(4), FlightStatus::LateWeather, RevotePolicy::Reject, 3);
        assert!(req.is_open());
    }
}
