//! Policy bookkeeping and credit settlement.
//!
//! Withdrawal is split into two steps so the ordering is explicit and
//! testable: [`InsuranceLedger::begin_withdrawal`] zeroes the passenger's
//! credit and debits reserves, and only afterwards does the caller hand the
//! [`Withdrawal`] to a [`TransferSink`]. A second withdrawal attempted while
//! the transfer is in flight finds no credit.

use crate::airline::AirlineRegistry;
use crate::core::{now, AccountId, Amount, EngineConfig, Error, Result};
use crate::gate::OperationalGate;
use crate::insurance::policy::{Policy, PolicyKey, Settlement};
use crate::oracle::{FlightKey, StatusUpdate};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Destination of withdrawn value.
pub trait TransferSink {
    /// Move `amount` to `to`. Any error rolls the withdrawal back.
    fn transfer(&mut self, to: &AccountId, amount: Amount) -> Result<()>;
}

/// Credit taken out of the ledger and awaiting transfer.
#[must_use = "a withdrawal must be transferred or restored"]
#[derive(Debug, PartialEq, Eq)]
pub struct Withdrawal {
    pub passenger: AccountId,
    pub amount: Amount,
}

/// One policy settled by a status update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettledPolicy {
    pub key: PolicyKey,
    pub credited: Amount,
}

/// Settlement computed against the current ledger, not yet applied.
#[must_use = "a staged settlement does nothing until committed"]
#[derive(Debug)]
pub struct StagedSettlement {
    update: StatusUpdate,
    settled: Vec<SettledPolicy>,
    /// New credit totals of the touched passengers only
    balances: HashMap<AccountId, Amount>,
}

impl StagedSettlement {
    /// Policies this settlement closes.
    pub fn settled(&self) -> &[SettledPolicy] {
        &self.settled
    }
}

/// Insurance ledger.
pub struct InsuranceLedger {
    policies: HashMap<PolicyKey, Policy>,
    by_flight: HashMap<FlightKey, Vec<PolicyKey>>,
    by_passenger: HashMap<AccountId, Vec<PolicyKey>>,
    credits: HashMap<AccountId, Amount>,
    /// Value held by the engine: premiums, fees and airline funding
    reserves: Amount,
    premium_cap: Amount,
    payout_numerator: Amount,
    payout_denominator: Amount,
}

impl InsuranceLedger {
    /// Create an empty ledger using the payout settings of `config`.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            policies: HashMap::new(),
            by_flight: HashMap::new(),
            by_passenger: HashMap::new(),
            credits: HashMap::new(),
            reserves: 0,
            premium_cap: config.premium_cap,
            payout_numerator: config.payout_numerator,
            payout_denominator: config.payout_denominator,
        }
    }

    /// Buy a policy for `flight`.
    pub fn buy(
        &mut self,
        gate: &OperationalGate,
        registry: &AirlineRegistry,
        passenger: &AccountId,
        flight: &FlightKey,
        premium: Amount,
    ) -> Result<PolicyKey> {
        gate.require_operational()?;

        if !registry.is_registered_airline(&flight.airline) {
            return Err(Error::UnknownAirline(flight.airline.to_string()));
        }
        if premium > self.premium_cap {
            return Err(Error::PremiumExceedsCap {
                premium,
                cap: self.premium_cap,
            });
        }

        let key = PolicyKey::new(passenger.clone(), flight.clone());
        if self.policies.contains_key(&key) {
            return Err(Error::DuplicatePolicy(key.to_string()));
        }
        let reserves = self
            .reserves
            .checked_add(premium)
            .ok_or(Error::ArithmeticOverflow)?;

        self.reserves = reserves;
        self.policies.insert(key.clone(), Policy::new(key.clone(), premium));
        self.by_flight
            .entry(flight.clone())
            .or_default()
            .push(key.clone());
        self.by_passenger
            .entry(passenger.clone())
            .or_default()
            .push(key.clone());

        info!(passenger = %passenger, flight = %flight, premium = %premium, "policy purchased");
        Ok(key)
    }

    /// Payout owed for a premium: `premium * numerator / denominator`,
    /// multiplied before dividing.
    pub fn payout_for(&self, premium: Amount) -> Result<Amount> {
        premium
            .checked_mul(self.payout_numerator)
            .map(|scaled| scaled / self.payout_denominator)
            .ok_or(Error::ArithmeticOverflow)
    }

    /// Apply a finalized status to every unsettled policy on the flight.
    ///
    /// Airline-fault delays credit the passenger; any other status settles
    /// with zero credit. Already settled policies are skipped, so replaying
    /// the same update is harmless.
    pub fn apply_status(&mut self, update: &StatusUpdate) -> Result<Vec<SettledPolicy>> {
        let staged = self.stage_status(update)?;
        Ok(self.commit_settlement(staged))
    }

    /// Compute what `apply_status` would do without changing the ledger.
    ///
    /// Fails on arithmetic overflow; the ledger is untouched either way.
    pub fn stage_status(&self, update: &StatusUpdate) -> Result<StagedSettlement> {
        let mut staged = StagedSettlement {
            update: update.clone(),
            settled: Vec::new(),
            balances: HashMap::new(),
        };
        let Some(keys) = self.by_flight.get(&update.key) else {
            return Ok(staged);
        };

        for key in keys {
            let Some(policy) = self.policies.get(key) else {
                continue;
            };
            if policy.is_settled() {
                continue;
            }
            let credited = if update.status.is_airline_fault() {
                self.payout_for(policy.premium)?
            } else {
                0
            };
            let balance = staged
                .balances
                .entry(key.passenger.clone())
                .or_insert_with(|| self.get_credit(&key.passenger));
            *balance = balance.checked_add(credited).ok_or(Error::ArithmeticOverflow)?;
            staged.settled.push(SettledPolicy {
                key: key.clone(),
                credited,
            });
        }
        Ok(staged)
    }

    /// Apply a staged settlement. Cannot fail.
    pub fn commit_settlement(&mut self, staged: StagedSettlement) -> Vec<SettledPolicy> {
        let StagedSettlement {
            update,
            settled,
            balances,
        } = staged;

        let settled_at = now();
        for entry in &settled {
            if let Some(policy) = self.policies.get_mut(&entry.key) {
                policy.settlement = Some(Settlement {
                    status: update.status,
                    credited: entry.credited,
                    settled_at,
                });
            }
            debug!(policy = %entry.key, credited = %entry.credited, "policy settled");
        }
        for (passenger, balance) in balances {
            if balance > 0 {
                self.credits.insert(passenger, balance);
            }
        }

        if !settled.is_empty() {
            info!(
                flight = %update.key,
                status = update.status.code(),
                policies = settled.len(),
                "status applied to policies"
            );
        }
        settled
    }

    /// First step of `pay`: zero the passenger's credit and debit reserves.
    pub fn begin_withdrawal(
        &mut self,
        gate: &OperationalGate,
        passenger: &AccountId,
    ) -> Result<Withdrawal> {
        gate.require_operational()?;

        let amount = self.get_credit(passenger);
        if amount == 0 {
            return Err(Error::NoCredit(passenger.to_string()));
        }
        if amount > self.reserves {
            return Err(Error::InsufficientReserves {
                requested: amount,
                available: self.reserves,
            });
        }

        self.credits.remove(passenger);
        self.reserves -= amount;

        Ok(Withdrawal {
            passenger: passenger.clone(),
            amount,
        })
    }

    /// Undo a withdrawal whose transfer failed.
    pub fn restore(&mut self, withdrawal: Withdrawal) {
        warn!(
            passenger = %withdrawal.passenger,
            amount = %withdrawal.amount,
            "withdrawal restored"
        );
        *self.credits.entry(withdrawal.passenger).or_insert(0) += withdrawal.amount;
        self.reserves += withdrawal.amount;
    }

    /// Withdraw the passenger's full credit through `sink`.
    pub fn pay(
        &mut self,
        gate: &OperationalGate,
        passenger: &AccountId,
        sink: &mut dyn TransferSink,
    ) -> Result<Amount> {
        let withdrawal = self.begin_withdrawal(gate, passenger)?;
        let amount = withdrawal.amount;

        match sink.transfer(&withdrawal.passenger, amount) {
            Ok(()) => {
                info!(passenger = %passenger, amount = %amount, "credit withdrawn");
                Ok(amount)
            }
            Err(err) => {
                self.restore(withdrawal);
                Err(err)
            }
        }
    }

    /// Add value to reserves (oracle fees, airline funding).
    pub fn deposit(&mut self, amount: Amount) -> Result<()> {
        self.reserves = self
            .reserves
            .checked_add(amount)
            .ok_or(Error::ArithmeticOverflow)?;
        Ok(())
    }

    /// Accrued credit of a passenger.
    pub fn get_credit(&self, passenger: &AccountId) -> Amount {
        self.credits.get(passenger).copied().unwrap_or(0)
    }

    /// Get a policy.
    pub fn get_insurance_data(&self, key: &PolicyKey) -> Option<&Policy> {
        self.policies.get(key)
    }

    /// Unsettled policy keys of a passenger, in purchase order.
    pub fn get_active_insurance_keys(&self, passenger: &AccountId) -> Vec<PolicyKey> {
        self.by_passenger
            .get(passenger)
            .map(|keys| {
                keys.iter()
                    .filter(|k| self.policies.get(*k).is_some_and(|p| !p.is_settled()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every policy on a flight.
    pub fn policies_for_flight(&self, flight: &FlightKey) -> Vec<&Policy> {
        self.by_flight
            .get(flight)
            .map(|keys| keys.iter().filter_map(|k| self.policies.get(k)).collect())
            .unwrap_or_default()
    }

    /// Value currently held.
    pub fn reserves(&self) -> Amount {
        self.reserves
    }

    /// Maximum premium per policy.
    pub fn premium_cap(&self) -> Amount {
        self.premium_cap
    }
}
