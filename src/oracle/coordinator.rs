//! Oracle registration and status-request aggregation.
//!
//! Response mismatches are expected races between independently acting
//! workers. They are reported as [`ResponseOutcome::Ignored`], never as errors.

use crate::airline::AirlineRegistry;
use crate::core::{now, AccountId, Amount, EngineConfig, Error, Result, Timestamp};
use crate::gate::OperationalGate;
use crate::oracle::entropy::IndexGenerator;
use crate::oracle::request::{FlightKey, FlightStatus, RevotePolicy, StatusRequest, VoteRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// A registered oracle worker.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OracleWorker {
    /// Worker identity
    pub id: AccountId,
    /// Capability indices, assigned once
    pub indices: Vec<u8>,
    /// Fee paid at registration
    pub fee_paid: Amount,
    /// Registration timestamp
    pub registered_at: Timestamp,
}

impl OracleWorker {
    /// Whether this worker holds `index`.
    pub fn has_index(&self, index: u8) -> bool {
        self.indices.contains(&index)
    }
}

/// Why a response was ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IgnoreReason {
    /// Worker never registered
    UnknownOracle,
    /// Worker does not hold the submitted index
    IndexNotAssigned,
    /// No request exists for the key
    NoOpenRequest,
    /// Request was opened for a different index
    IndexMismatch,
    /// Request already reached quorum
    AlreadyFinalized,
    /// Same worker already reported this status
    DuplicateVote,
    /// Same worker reported a different status and revotes are rejected
    ConflictingVote,
}

/// A finalized status.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub key: FlightKey,
    pub status: FlightStatus,
}

/// Outcome of a response submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// Dropped without any state change
    Ignored(IgnoreReason),
    /// Vote counted; request still open
    Recorded { status: FlightStatus, votes: usize },
    /// Vote counted and the request finalized
    Finalized(StatusUpdate),
}

impl ResponseOutcome {
    /// Whether the response changed any state.
    pub fn accepted(&self) -> bool {
        !matches!(self, ResponseOutcome::Ignored(_))
    }
}

/// Outcome of a status fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A new request was opened for this index
    Opened { index: u8 },
    /// A request is already open; its index is broadcast again
    AlreadyOpen { index: u8 },
    /// The flight already has a final status
    AlreadyFinalized { status: FlightStatus },
}

impl FetchOutcome {
    /// Index workers should answer on, if the request is open.
    pub fn index(&self) -> Option<u8> {
        match self {
            FetchOutcome::Opened { index } | FetchOutcome::AlreadyOpen { index } => Some(*index),
            FetchOutcome::AlreadyFinalized { .. } => None,
        }
    }
}

/// Coordinates oracle workers and status requests.
pub struct OracleCoordinator {
    oracles: HashMap<AccountId, OracleWorker>,
    requests: HashMap<FlightKey, StatusRequest>,
    generator: IndexGenerator,
    registration_fee: Amount,
    indices_per_oracle: usize,
    quorum: usize,
    revote_policy: RevotePolicy,
}

impl OracleCoordinator {
    /// Create a coordinator using the oracle settings of `config`.
    pub fn new(config: &EngineConfig, generator: IndexGenerator) -> Self {
        Self {
            oracles: HashMap::new(),
            requests: HashMap::new(),
            generator,
            registration_fee: config.registration_fee,
            indices_per_oracle: config.indices_per_oracle,
            quorum: config.quorum,
            revote_policy: config.revote_policy,
        }
    }

    /// Register a worker and assign its capability indices.
    pub fn register_oracle(
        &mut self,
        gate: &OperationalGate,
        worker: &AccountId,
        fee_paid: Amount,
    ) -> Result<Vec<u8>> {
        gate.require_operational()?;

        if fee_paid < self.registration_fee {
            return Err(Error::InsufficientFee {
                required: self.registration_fee,
                provided: fee_paid,
            });
        }
        if self.oracles.contains_key(worker) {
            return Err(Error::OracleAlreadyRegistered(worker.to_string()));
        }

        let indices = self.generator.distinct(worker, self.indices_per_oracle);
        self.oracles.insert(
            worker.clone(),
            OracleWorker {
                id: worker.clone(),
                indices: indices.clone(),
                fee_paid,
                registered_at: now(),
            },
        );

        info!(oracle = %worker, indices = ?indices, "oracle registered");
        Ok(indices)
    }

    /// Open a status request for a flight of an admitted airline.
    pub fn fetch_flight_status(
        &mut self,
        gate: &OperationalGate,
        registry: &AirlineRegistry,
        key: &FlightKey,
    ) -> Result<FetchOutcome> {
        gate.require_operational()?;

        if !registry.is_registered_airline(&key.airline) {
            return Err(Error::UnknownAirline(key.airline.to_string()));
        }

        if let Some(existing) = self.requests.get(key) {
            return Ok(match existing.finalized {
                Some(status) => FetchOutcome::AlreadyFinalized { status },
                None => FetchOutcome::AlreadyOpen {
                    index: existing.index,
                },
            });
        }

        let index = self.generator.index(&key.airline);
        self.requests.insert(
            key.clone(),
            StatusRequest::open(key.clone(), index, key.airline.clone()),
        );

        info!(flight = %key, index, "status requested");
        Ok(FetchOutcome::Opened { index })
    }

    /// Record an oracle's answer for a flight.
    ///
    /// Only a closed gate is an error; every mismatch is silently ignored.
    pub fn submit_oracle_response(
        &mut self,
        gate: &OperationalGate,
        index: u8,
        key: &FlightKey,
        status: FlightStatus,
        worker: &AccountId,
    ) -> Result<ResponseOutcome> {
        gate.require_operational()?;

        let outcome = self.apply_response(index, key, status, worker);
        match &outcome {
            ResponseOutcome::Ignored(reason) => {
                debug!(oracle = %worker, flight = %key, ?reason, "oracle response ignored");
            }
            ResponseOutcome::Recorded { status, votes } => {
                debug!(oracle = %worker, flight = %key, ?status, votes, "oracle response recorded");
            }
            ResponseOutcome::Finalized(update) => {
                info!(flight = %key, status = update.status.code(), "status finalized");
            }
        }
        Ok(outcome)
    }

    /// Outcome `submit_oracle_response` would produce, without recording it.
    ///
    /// Lets a caller prepare dependent work for a finalizing vote before the
    /// request is closed.
    pub fn preview_response(
        &self,
        index: u8,
        key: &FlightKey,
        status: FlightStatus,
        worker: &AccountId,
    ) -> ResponseOutcome {
        match self.eligible_request(index, key, worker) {
            Ok(request) => Self::outcome_of(
                request.preview(worker, status, self.revote_policy, self.quorum),
                key,
                status,
            ),
            Err(reason) => ResponseOutcome::Ignored(reason),
        }
    }

    fn apply_response(
        &mut self,
        index: u8,
        key: &FlightKey,
        status: FlightStatus,
        worker: &AccountId,
    ) -> ResponseOutcome {
        if let Err(reason) = self.eligible_request(index, key, worker) {
            return ResponseOutcome::Ignored(reason);
        }
        let Some(request) = self.requests.get_mut(key) else {
            return ResponseOutcome::Ignored(IgnoreReason::NoOpenRequest);
        };
        let record = request.record(worker, status, self.revote_policy, self.quorum);
        Self::outcome_of(record, key, status)
    }

    fn eligible_request(
        &self,
        index: u8,
        key: &FlightKey,
        worker: &AccountId,
    ) -> std::result::Result<&StatusRequest, IgnoreReason> {
        let oracle = self.oracles.get(worker).ok_or(IgnoreReason::UnknownOracle)?;
        if !oracle.has_index(index) {
            return Err(IgnoreReason::IndexNotAssigned);
        }
        let request = self.requests.get(key).ok_or(IgnoreReason::NoOpenRequest)?;
        if !request.is_open() {
            return Err(IgnoreReason::AlreadyFinalized);
        }
        if request.index != index {
            return Err(IgnoreReason::IndexMismatch);
        }
        Ok(request)
    }

    fn outcome_of(record: VoteRecord, key: &FlightKey, status: FlightStatus) -> ResponseOutcome {
        match record {
            VoteRecord::Counted(votes) => ResponseOutcome::Recorded { status, votes },
            VoteRecord::Quorum => ResponseOutcome::Finalized(StatusUpdate {
                key: key.clone(),
                status,
            }),
            VoteRecord::Duplicate => ResponseOutcome::Ignored(IgnoreReason::DuplicateVote),
            VoteRecord::Conflicting => ResponseOutcome::Ignored(IgnoreReason::ConflictingVote),
            VoteRecord::Closed => ResponseOutcome::Ignored(IgnoreReason::AlreadyFinalized),
        }
    }

    /// Capability indices of a worker ("get my indexes").
    pub fn oracle_indexes(&self, worker: &AccountId) -> Option<&[u8]> {
        self.oracles.get(worker).map(|o| o.indices.as_slice())
    }

    /// Whether `worker` is registered.
    pub fn is_registered_oracle(&self, worker: &AccountId) -> bool {
        self.oracles.contains_key(worker)
    }

    /// Get a worker record.
    pub fn oracle(&self, worker: &AccountId) -> Option<&OracleWorker> {
        self.oracles.get(worker)
    }

    /// Number of registered workers.
    pub fn oracle_count(&self) -> usize {
        self.oracles.len()
    }

    /// Get a status request.
    pub fn status_request(&self, key: &FlightKey) -> Option<&StatusRequest> {
        self.requests.get(key)
    }

    /// Requests that have not reached quorum.
    pub fn open_requests(&self) -> impl Iterator<Item = &StatusRequest> {
        self.requests.values().filter(|r| r.is_open())
    }

    /// Registration fee in base units.
    pub fn registration_fee(&self) -> Amount {
        self.registration_fee
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::airline::AdmissionRule;
    use crate::core::UNIT;
    use crate::oracle::entropy::IndexSource;
    use std::collections::VecDeque;

    /// Replays a fixed list of draws.
    struct Scripted(VecDeque<u8>);

    impl IndexSource for Scripted {
        fn draw(&mut self, _identity: &AccountId, _range: u8) -> u8 {
            self.0.pop_front().unwrap_or(0)
        }
    }

    struct Fixture {
        gate: OperationalGate,
        registry: AirlineRegistry,
        coordinator: OracleCoordinator,
        key: FlightKey,
    }

    /// Oracles 1..=4 get indices [1,2,3]; oracle 5 gets [7,8,9].
    /// The first fetch draws index 2.
    fn fixture(config: EngineConfig) -> Fixture {
        let mut draws = VecDeque::new();
        for _ in 0..4 {
            draws.extend([1, 2, 3]);
        }
        draws.extend([7, 8, 9]);
        draws.push_back(2);

        let generator = IndexGenerator::new(Box::new(Scripted(draws)), config.index_range);
        let mut coordinator = OracleCoordinator::new(&config, generator);
        let gate = OperationalGate::new(AccountId::from("owner"));
        let airline = AccountId::from("airline-1");
        let registry = AirlineRegistry::new(airline.clone(), AdmissionRule::default(), 10 * UNIT);

        for n in 1..=5 {
            coordinator.register_oracle(&gate, &oracle(n), UNIT).unwrap();
        }

        Fixture {
            gate,
            registry,
            coordinator,
            key: FlightKey::new(airline, "ND1309", 1_600_000_000),
        }
    }

    fn oracle(n: usize) -> AccountId {
        AccountId::new(format!("oracle-{}", n))
    }

    fn submit(f: &mut Fixture, n: usize, index: u8, status: FlightStatus) -> ResponseOutcome {
        f.coordinator
            .submit_oracle_response(&f.gate, index, &f.key, status, &oracle(n))
            .unwrap()
    }

    #[test]
    fn test_register_requires_fee() {
        let mut f = fixture(EngineConfig::default());
        let result = f.coordinator.register_oracle(&f.gate, &oracle(9), UNIT - 1);
        assert!(matches!(result, Err(Error::InsufficientFee { .. })));
        assert!(!f.coordinator.is_registered_oracle(&oracle(9)));
    }

    #[test]
    fn test_indices_immutable() {
        let mut f = fixture(EngineConfig::default());
        assert_eq!(f.coordinator.oracle_indexes(&oracle(1)), Some(&[1u8, 2, 3][..]));
        let result = f.coordinator.register_oracle(&f.gate, &oracle(1), UNIT);
        assert!(matches!(result, Err(Error::OracleAlreadyRegistered(_))));
        assert_eq!(f.coordinator.oracle_indexes(&oracle(1)), Some(&[1u8, 2, 3][..]));
    }

    #[test]
    fn test_fetch_requires_admitted_airline() {
        let mut f = fixture(EngineConfig::default());
        let key = FlightKey::new(AccountId::from("nobody"), "X1", 1);
        let result = f.coordinator.fetch_flight_status(&f.gate, &f.registry, &key);
        assert!(matches!(result, Err(Error::UnknownAirline(_))));
    }

    #[test]
    fn test_quorum_finalizes() {
        let mut f = fixture(EngineConfig::default());
        let key = f.key.clone();
        let fetched = f.coordinator.fetch_flight_status(&f.gate, &f.registry, &key).unwrap();
        assert_eq!(fetched, FetchOutcome::Opened { index: 2 });

        assert_eq!(
            submit(&mut f, 1, 2, FlightStatus::LateAirline),
            ResponseOutcome::Recorded { status: FlightStatus::LateAirline, votes: 1 }
        );
        submit(&mut f, 2, 2, FlightStatus::LateAirline);
        let third = submit(&mut f, 3, 2, FlightStatus::LateAirline);
        assert_eq!(
            third,
            ResponseOutcome::Finalized(StatusUpdate {
                key: f.key.clone(),
                status: FlightStatus::LateAirline
            })
        );

        let fourth = submit(&mut f, 4, 2, FlightStatus::OnTime);
        assert_eq!(fourth, ResponseOutcome::Ignored(IgnoreReason::AlreadyFinalized));
        let request = f.coordinator.status_request(&f.key).unwrap();
        assert_eq!(request.finalized, Some(FlightStatus::LateAirline));
        assert_eq!(request.votes_for(FlightStatus::OnTime), 0);
    }

    #[test]
    fn test_preview_matches_submit_without_recording() {
        let mut f = fixture(EngineConfig::default());
        let key = f.key.clone();
        f.coordinator.fetch_flight_status(&f.gate, &f.registry, &key).unwrap();
        submit(&mut f, 1, 2, FlightStatus::LateAirline);
        submit(&mut f, 2, 2, FlightStatus::LateAirline);

        let preview = f
            .coordinator
            .preview_response(2, &key, FlightStatus::LateAirline, &oracle(3));
        assert!(matches!(preview, ResponseOutcome::Finalized(_)));
        assert!(f.coordinator.status_request(&key).unwrap().is_open());

        let ignored = f.coordinator.preview_response(7, &key, FlightStatus::OnTime, &oracle(5));
        assert_eq!(ignored, ResponseOutcome::Ignored(IgnoreReason::IndexMismatch));

        assert_eq!(submit(&mut f, 3, 2, FlightStatus::LateAirline), preview);
    }

    #[test]
    fn test_unassigned_index_ignored() {
        let mut f = fixture(EngineConfig::default());
        f.coordinator.fetch_flight_status(&f.gate, &f.registry, &f.key.clone()).unwrap();

        let outcome = submit(&mut f, 5, 2, FlightStatus::OnTime);
        assert_eq!(outcome, ResponseOutcome::Ignored(IgnoreReason::IndexNotAssigned));

        let outcome = submit(&mut f, 5, 7, FlightStatus::OnTime);
        assert_eq!(outcome, ResponseOutcome::Ignored(IgnoreReason::IndexMismatch));

        let request = f.coordinator.status_request(&f.key).unwrap();
        assert!(request.responses.is_empty());
    }

    #[test]
    fn test_no_request_ignored() {
        let mut f = fixture(EngineConfig::default());
        let outcome = submit(&mut f, 1, 2, FlightStatus::OnTime);
        assert_eq!(outcome, ResponseOutcome::Ignored(IgnoreReason::NoOpenRequest));

        let ghost = AccountId::from("ghost");
        let stranger = f
            .coordinator
            .submit_oracle_response(&f.gate, 2, &f.key, FlightStatus::OnTime, &ghost)
            .unwrap();
        assert_eq!(stranger, ResponseOutcome::Ignored(IgnoreReason::UnknownOracle));
    }

    #[test]
    fn test_refetch_rebroadcasts() {
        let mut f = fixture(EngineConfig::default());
        let key = f.key.clone();
        f.coordinator.fetch_flight_status(&f.gate, &f.registry, &key).unwrap();
        let again = f.coordinator.fetch_flight_status(&f.gate, &f.registry, &key).unwrap();
        assert_eq!(again, FetchOutcome::AlreadyOpen { index: 2 });

        for n in 1..=3 {
            submit(&mut f, n, 2, FlightStatus::OnTime);
        }
        let after = f.coordinator.fetch_flight_status(&f.gate, &f.registry, &key).unwrap();
        assert_eq!(after, FetchOutcome::AlreadyFinalized { status: FlightStatus::OnTime });
        assert_eq!(after.index(), None);
    }

    #[test]
    fn test_overwrite_policy() {
        let config = EngineConfig {
            revote_policy: RevotePolicy::Overwrite,
            ..Default::default()
        };
        let mut f = fixture(config);
        f.coordinator.fetch_flight_status(&f.gate, &f.registry, &f.key.clone()).unwrap();

        submit(&mut f, 1, 2, FlightStatus::OnTime);
        submit(&mut f, 2, 2, FlightStatus::OnTime);
        submit(&mut f, 1, 2, FlightStatus::LateWeather);
        let outcome = submit(&mut f, 3, 2, FlightStatus::OnTime);
        assert_eq!(
            outcome,
            ResponseOutcome::Recorded { status: FlightStatus::OnTime, votes: 2 }
        );
    }

    #[test]
    fn test_reject_policy() {
        let mut f = fixture(EngineConfig::default());
        f.coordinator.fetch_flight_status(&f.gate, &f.registry, &f.key.clone()).unwrap();

        submit(&mut f, 1, 2, FlightStatus::OnTime);
        let outcome = submit(&mut f, 1, 2, FlightStatus::LateWeather);
        assert_eq!(outcome, ResponseOutcome::Ignored(IgnoreReason::ConflictingVote));
        let outcome = submit(&mut f, 1, 2, FlightStatus::OnTime);
        assert_eq!(outcome, ResponseOutcome::Ignored(IgnoreReason::DuplicateVote));
    }

    #[test]
    fn test_closed_gate() {
        let mut f = fixture(EngineConfig::default());
        f.gate.set_operating_status(&AccountId::from("owner"), false).unwrap();
        let result = f.coordinator.register_oracle(&f.gate, &oracle(9), UNIT);
        assert!(matches!(result, Err(Error::NotOperational)));
    }
}
