//! Outbound signal bus.
//!
//! Every signal is appended to a sequence-numbered journal and pushed to live
//! subscribers. A subscriber that lags or reconnects replays from its last
//! seen sequence with [`SignalBus::poll_since`], which gives at-least-once
//! delivery regardless of the live channel dropping messages.
//!
//! The journal is retained until the host calls [`SignalBus::compact_before`]
//! with a cursor every relay has acknowledged. Replay is only possible from
//! [`SignalBus::first_sequence`] on.

use crate::core::{now, AccountId, Amount, Result, Timestamp};
use crate::insurance::PolicyKey;
use crate::oracle::{FlightKey, FlightStatus};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Observable engine signal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    /// Oracles holding `index` should report on `key`
    StatusRequested { index: u8, key: FlightKey },
    /// A status request reached quorum
    StatusFinalized { key: FlightKey, status: FlightStatus },
    AirlineAdmitted { airline: AccountId, votes: usize },
    AirlineFunded { airline: AccountId, amount: Amount },
    OracleRegistered { oracle: AccountId, indices: Vec<u8> },
    PolicyPurchased { key: PolicyKey, premium: Amount },
    CreditWithdrawn { passenger: AccountId, amount: Amount },
    OperatingStatusChanged { operational: bool },
}

/// A journaled signal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalRecord {
    /// Position in the journal, starting at zero
    pub sequence: u64,
    pub emitted_at: Timestamp,
    pub signal: Signal,
}

/// Journal plus live broadcast of engine signals.
pub struct SignalBus {
    journal: Vec<SignalRecord>,
    /// Sequence of `journal[0]`
    base: u64,
    sender: broadcast::Sender<SignalRecord>,
}

impl SignalBus {
    /// Create a bus whose live channel buffers `capacity` records.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            journal: Vec::new(),
            base: 0,
            sender,
        }
    }

    /// Append and broadcast a signal. Returns its sequence number.
    pub fn emit(&mut self, signal: Signal) -> u64 {
        let record = SignalRecord {
            sequence: self.next_sequence(),
            emitted_at: now(),
            signal,
        };
        let sequence = record.sequence;

        // No live subscribers is fine; the journal still has it.
        let _ = self.sender.send(record.clone());
        trace!(sequence, "signal emitted");

        self.journal.push(record);
        sequence
    }

    /// Live subscription to signals emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SignalRecord> {
        self.sender.subscribe()
    }

    /// Every retained record with `sequence >= cursor`.
    pub fn poll_since(&self, cursor: u64) -> &[SignalRecord] {
        let start = usize::try_from(cursor.saturating_sub(self.base))
            .unwrap_or(usize::MAX)
            .min(self.journal.len());
        &self.journal[start..]
    }

    /// Sequence the next signal will get.
    pub fn next_sequence(&self) -> u64 {
        self.base + self.journal.len() as u64
    }

    /// Oldest sequence still replayable. A relay whose cursor is below this
    /// has missed records.
    pub fn first_sequence(&self) -> u64 {
        self.base
    }

    /// Drop every record with `sequence < cursor`. Returns how many were dropped.
    pub fn compact_before(&mut self, cursor: u64) -> usize {
        let cursor = cursor.min(self.next_sequence());
        let dropped = usize::try_from(cursor.saturating_sub(self.base)).unwrap_or(usize::MAX);
        let dropped = dropped.min(self.journal.len());
        if dropped > 0 {
            self.journal.drain(..dropped);
            self.base += dropped as u64;
            debug!(dropped, first = self.base, "signal journal compacted");
        }
        dropped
    }

    /// Number of retained records.
    pub fn retained(&self) -> usize {
        self.journal.len()
    }

    /// Records about one flight, oldest first.
    pub fn history_for(&self, flight: &FlightKey) -> Vec<&SignalRecord> {
        self.journal
            .iter()
            .filter(|r| match &r.signal {
                Signal::StatusRequested { key, .. } | Signal::StatusFinalized { key, .. } => {
                    key == flight
                }
                Signal::PolicyPurchased { key, .. } => &key.flight == flight,
                _ => false,
            })
            .collect()
    }

    /// Export the journal to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.journal)?)
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new(256)
    }
}
