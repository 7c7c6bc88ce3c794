//! The flight insurance engine: one state store, every entry point.
//!
//! Components never reach into each other's state. The engine passes the
//! gate and registry by reference where a component needs them, routes
//! finalized statuses from the coordinator into the ledger, and emits
//! signals for external observers.

use crate::airline::{Admission, AdmissionRule, Airline, AirlineRegistry, AirlineStatus};
use crate::core::{AccountId, Amount, EngineConfig, Error, Result};
use crate::gate::OperationalGate;
use crate::insurance::{InsuranceLedger, Policy, PolicyKey, TransferSink};
use crate::oracle::{
    FetchOutcome, FlightKey, FlightStatus, IndexGenerator, IndexSource, OracleCoordinator,
    ResponseOutcome, SeededIndexSource, StatusRequest,
};
use crate::signals::{Signal, SignalBus, SignalRecord};
use tokio::sync::broadcast;
use tracing::info;

/// Flight-delay insurance engine.
pub struct FlightSurety {
    config: EngineConfig,
    gate: OperationalGate,
    airlines: AirlineRegistry,
    oracles: OracleCoordinator,
    ledger: InsuranceLedger,
    signals: SignalBus,
}

impl FlightSurety {
    /// Create an engine with clock-seeded index assignment.
    pub fn new(config: EngineConfig, admin: AccountId, genesis_airline: AccountId) -> Result<Self> {
        Self::with_index_source(
            config,
            admin,
            genesis_airline,
            Box::new(SeededIndexSource::default()),
        )
    }

    /// Create an engine drawing capability indices from `source`.
    pub fn with_index_source(
        config: EngineConfig,
        admin: AccountId,
        genesis_airline: AccountId,
        source: Box<dyn IndexSource>,
    ) -> Result<Self> {
        config.validate()?;

        let rule = AdmissionRule::new(config.founding_cohort, config.consensus_basis);
        let generator = IndexGenerator::new(source, config.index_range);

        info!(admin = %admin, genesis = %genesis_airline, "engine initialized");
        Ok(Self {
            gate: OperationalGate::new(admin),
            airlines: AirlineRegistry::new(genesis_airline, rule, config.funding_floor),
            oracles: OracleCoordinator::new(&config, generator),
            ledger: InsuranceLedger::new(&config),
            signals: SignalBus::new(config.signal_capacity),
            config,
        })
    }

    // Operational gate

    /// Whether mutating calls are accepted.
    pub fn is_operational(&self) -> bool {
        self.gate.is_operational()
    }

    /// Open or close the gate. Admin only.
    pub fn set_operating_status(&mut self, caller: &AccountId, mode: bool) -> Result<()> {
        if self.gate.set_operating_status(caller, mode)? {
            self.signals
                .emit(Signal::OperatingStatusChanged { operational: mode });
        }
        Ok(())
    }

    // Airline governance

    /// Vote to admit `candidate`, on behalf of `sponsor`.
    pub fn register_airline(
        &mut self,
        candidate: &AccountId,
        sponsor: &AccountId,
    ) -> Result<Admission> {
        let admission = self.airlines.register_airline(&self.gate, candidate, sponsor)?;
        if admission.admitted() {
            self.signals.emit(Signal::AirlineAdmitted {
                airline: candidate.clone(),
                votes: admission.tally.votes,
            });
        }
        Ok(admission)
    }

    /// Fund an admitted airline.
    pub fn fund(&mut self, airline: &AccountId, amount: Amount) -> Result<()> {
        self.gate.require_operational()?;
        self.ensure_depositable(amount)?;

        self.airlines.fund(&self.gate, airline, amount)?;
        self.ledger.deposit(amount)?;
        self.signals.emit(Signal::AirlineFunded {
            airline: airline.clone(),
            amount,
        });
        Ok(())
    }

    /// Whether the airline is at least registered.
    pub fn is_registered_airline(&self, id: &AccountId) -> bool {
        self.airlines.is_registered_airline(id)
    }

    /// Whether the airline is funded.
    pub fn is_funded_airline(&self, id: &AccountId) -> bool {
        self.airlines.is_funded_airline(id)
    }

    /// Admitted airlines in admission order.
    pub fn get_airlines(&self) -> Vec<AccountId> {
        self.airlines.airlines().to_vec()
    }

    /// Numeric airline status code.
    pub fn get_airline_status(&self, id: &AccountId) -> u8 {
        self.airline_status(id).code()
    }

    /// Airline status.
    pub fn airline_status(&self, id: &AccountId) -> AirlineStatus {
        self.airlines.status(id)
    }

    /// Full airline record.
    pub fn airline(&self, id: &AccountId) -> Option<&Airline> {
        self.airlines.get(id)
    }

    // Oracle consensus

    /// Register an oracle worker; returns its capability indices.
    pub fn register_oracle(&mut self, worker: &AccountId, fee_paid: Amount) -> Result<Vec<u8>> {
        self.gate.require_operational()?;
        self.ensure_depositable(fee_paid)?;

        let indices = self.oracles.register_oracle(&self.gate, worker, fee_paid)?;
        self.ledger.deposit(fee_paid)?;
        self.signals.emit(Signal::OracleRegistered {
            oracle: worker.clone(),
            indices: indices.clone(),
        });
        Ok(indices)
    }

    /// Capability indices of a registered worker.
    pub fn oracle_indexes(&self, worker: &AccountId) -> Option<Vec<u8>> {
        self.oracles.oracle_indexes(worker).map(<[u8]>::to_vec)
    }

    /// Ask oracles for a flight's status. An open request is broadcast again.
    pub fn fetch_flight_status(
        &mut self,
        airline: &AccountId,
        flight: &str,
        timestamp: u64,
    ) -> Result<FetchOutcome> {
        let key = FlightKey::new(airline.clone(), flight, timestamp);
        let outcome = self
            .oracles
            .fetch_flight_status(&self.gate, &self.airlines, &key)?;

        if let Some(index) = outcome.index() {
            self.signals.emit(Signal::StatusRequested { index, key });
        }
        Ok(outcome)
    }

    /// Submit an oracle's answer. On quorum, matching policies are settled.
    ///
    /// A finalizing vote is all-or-nothing: the settlement is staged before
    /// the vote is recorded, so a settlement error leaves the request open
    /// and emits nothing.
    pub fn submit_oracle_response(
        &mut self,
        index: u8,
        airline: &AccountId,
        flight: &str,
        timestamp: u64,
        status: FlightStatus,
        worker: &AccountId,
    ) -> Result<ResponseOutcome> {
        self.gate.require_operational()?;

        let key = FlightKey::new(airline.clone(), flight, timestamp);
        let staged = match self.oracles.preview_response(index, &key, status, worker) {
            ResponseOutcome::Finalized(update) => Some(self.ledger.stage_status(&update)?),
            _ => None,
        };

        let outcome = self
            .oracles
            .submit_oracle_response(&self.gate, index, &key, status, worker)?;

        if let ResponseOutcome::Finalized(update) = &outcome {
            let staged = match staged {
                Some(staged) => staged,
                None => self.ledger.stage_status(update)?,
            };
            self.ledger.commit_settlement(staged);
            self.signals.emit(Signal::StatusFinalized {
                key: update.key.clone(),
                status: update.status,
            });
        }
        Ok(outcome)
    }

    /// Inspect a status request.
    pub fn status_request(
        &self,
        airline: &AccountId,
        flight: &str,
        timestamp: u64,
    ) -> Option<&StatusRequest> {
        self.oracles
            .status_request(&FlightKey::new(airline.clone(), flight, timestamp))
    }

    // Insurance ledger

    /// Buy a policy on a flight.
    pub fn buy(
        &mut self,
        passenger: &AccountId,
        airline: &AccountId,
        flight: &str,
        timestamp: u64,
        premium: Amount,
    ) -> Result<PolicyKey> {
        let flight = FlightKey::new(airline.clone(), flight, timestamp);
        let key = self
            .ledger
            .buy(&self.gate, &self.airlines, passenger, &flight, premium)?;
        self.signals.emit(Signal::PolicyPurchased {
            key: key.clone(),
            premium,
        });
        Ok(key)
    }

    /// Withdraw the passenger's full credit through `sink`.
    pub fn pay(&mut self, passenger: &AccountId, sink: &mut dyn TransferSink) -> Result<Amount> {
        let amount = self.ledger.pay(&self.gate, passenger, sink)?;
        self.signals.emit(Signal::CreditWithdrawn {
            passenger: passenger.clone(),
            amount,
        });
        Ok(amount)
    }

    /// Accrued credit of a passenger.
    pub fn get_credit(&self, passenger: &AccountId) -> Amount {
        self.ledger.get_credit(passenger)
    }

    /// Look up a policy.
    pub fn get_insurance_data(&self, key: &PolicyKey) -> Option<&Policy> {
        self.ledger.get_insurance_data(key)
    }

    /// Unsettled policies of a passenger.
    pub fn get_active_insurance_keys(&self, passenger: &AccountId) -> Vec<PolicyKey> {
        self.ledger.get_active_insurance_keys(passenger)
    }

    /// Value held by the engine.
    pub fn reserves(&self) -> Amount {
        self.ledger.reserves()
    }

    // Signals and settings

    /// Live signal subscription.
    pub fn subscribe(&self) -> broadcast::Receiver<SignalRecord> {
        self.signals.subscribe()
    }

    /// Journaled signals from `cursor` on.
    pub fn poll_signals(&self, cursor: u64) -> &[SignalRecord] {
        self.signals.poll_since(cursor)
    }

    /// Drop journaled signals below `cursor` once every relay has seen them.
    pub fn compact_signals(&mut self, cursor: u64) -> usize {
        self.signals.compact_before(cursor)
    }

    /// The signal bus.
    pub fn signals(&self) -> &SignalBus {
        &self.signals
    }

    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Oracle registration fee.
    pub fn registration_fee(&self) -> Amount {
        self.oracles.registration_fee()
    }

    fn ensure_depositable(&self, amount: Amount) -> Result<()> {
        self.ledger
            .reserves()
            .checked_add(amount)
            .map(|_| ())
            .ok_or(Error::ArithmeticOverflow)
    }
}
