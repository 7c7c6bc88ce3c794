//! Serialized access to one engine from many async callers.
//!
//! Every call takes the whole-store lock for its full duration, so calls
//! never interleave below the granularity of one operation.

use crate::airline::Admission;
use crate::core::{AccountId, Amount, Result};
use crate::engine::surety::FlightSurety;
use crate::insurance::{PolicyKey, TransferSink};
use crate::oracle::{FetchOutcome, FlightStatus, ResponseOutcome};
use crate::signals::SignalRecord;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, MutexGuard};

/// Cloneable handle to a lock-guarded engine.
#[derive(Clone)]
pub struct SharedFlightSurety {
    inner: Arc<Mutex<FlightSurety>>,
}

impl SharedFlightSurety {
    /// Wrap an engine.
    pub fn new(engine: FlightSurety) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Lock the engine for a multi-step read or a custom operation.
    pub async fn lock(&self) -> MutexGuard<'_, FlightSurety> {
        self.inner.lock().await
    }

    /// Open or close the operational gate. Admin only.
    pub async fn set_operating_status(&self, caller: &AccountId, mode: bool) -> Result<()> {
        self.inner.lock().await.set_operating_status(caller, mode)
    }

    /// Vote to admit `candidate`, on behalf of `sponsor`.
    pub async fn register_airline(
        &self,
        candidate: &AccountId,
        sponsor: &AccountId,
    ) -> Result<Admission> {
        self.inner.lock().await.register_airline(candidate, sponsor)
    }

    /// Fund an admitted airline.
    pub async fn fund(&self, airline: &AccountId, amount: Amount) -> Result<()> {
        self.inner.lock().await.fund(airline, amount)
    }

    /// Register an oracle worker; returns its capability indices.
    pub async fn register_oracle(&self, worker: &AccountId, fee_paid: Amount) -> Result<Vec<u8>> {
        self.inner.lock().await.register_oracle(worker, fee_paid)
    }

    /// Ask oracles for a flight's status.
    pub async fn fetch_flight_status(
        &self,
        airline: &AccountId,
        flight: &str,
        timestamp: u64,
    ) -> Result<FetchOutcome> {
        self.inner
            .lock()
            .await
            .fetch_flight_status(airline, flight, timestamp)
    }

    /// Submit an oracle's answer.
    pub async fn submit_oracle_response(
        &self,
        index: u8,
        airline: &AccountId,
        flight: &str,
        timestamp: u64,
        status: FlightStatus,
        worker: &AccountId,
    ) -> Result<ResponseOutcome> {
        self.inner
            .lock()
            .await
            .submit_oracle_response(index, airline, flight, timestamp, status, worker)
    }

    /// Buy a policy on a flight.
    pub async fn buy(
        &self,
        passenger: &AccountId,
        airline: &AccountId,
        flight: &str,
        timestamp: u64,
        premium: Amount,
    ) -> Result<PolicyKey> {
        self.inner
            .lock()
            .await
            .buy(passenger, airline, flight, timestamp, premium)
    }

    /// Withdraw credit. The lock is held across the transfer, so a concurrent
    /// `pay` for the same passenger waits and then finds no credit.
    pub async fn pay(
        &self,
        passenger: &AccountId,
        sink: &mut (dyn TransferSink + Send),
    ) -> Result<Amount> {
        self.inner.lock().await.pay(passenger, sink)
    }

    /// Accrued credit of a passenger.
    pub async fn get_credit(&self, passenger: &AccountId) -> Amount {
        self.inner.lock().await.get_credit(passenger)
    }

    /// Capability indices of a registered worker.
    pub async fn oracle_indexes(&self, worker: &AccountId) -> Option<Vec<u8>> {
        self.inner.lock().await.oracle_indexes(worker)
    }

    /// Live signal subscription.
    pub async fn subscribe(&self) -> broadcast::Receiver<SignalRecord> {
        self.inner.lock().await.subscribe()
    }

    /// Owned copy of journaled signals from `cursor` on.
    pub async fn poll_signals(&self, cursor: u64) -> Vec<SignalRecord> {
        self.inner.lock().await.poll_signals(cursor).to_vec()
    }

    /// Drop journaled signals below an acknowledged cursor.
    pub async fn compact_signals(&self, cursor: u64) -> usize {
        self.inner.lock().await.compact_signals(cursor)
    }
}
