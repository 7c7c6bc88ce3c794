//! Airline membership state machine.
//!
//! Airlines move forward only: `Unregistered -> InRegistration -> Registered -> Funded`.
//! A genesis airline is admitted (unfunded) when the registry is created.

use crate::airline::voting::{AdmissionRule, AdmissionTally, ConsensusBasis};
use crate::core::{now, AccountId, Amount, Error, Result, Timestamp};
use crate::gate::OperationalGate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

/// Membership status of an airline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AirlineStatus {
    /// Not known to the federation
    Unregistered,
    /// Collecting sponsor votes
    InRegistration,
    /// Admitted, not yet funded
    Registered,
    /// Admitted and funded; may sponsor and vote
    Funded,
}

impl AirlineStatus {
    /// Numeric status code.
    pub fn code(&self) -> u8 {
        match self {
            AirlineStatus::Unregistered => 0,
            AirlineStatus::InRegistration => 10,
            AirlineStatus::Registered => 20,
            AirlineStatus::Funded => 30,
        }
    }

    /// Whether the airline has been admitted to the federation.
    pub fn is_admitted(&self) -> bool {
        *self >= AirlineStatus::Registered
    }
}

impl std::fmt::Display for AirlineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AirlineStatus::Unregistered => write!(f, "unregistered"),
            AirlineStatus::InRegistration => write!(f, "in_registration"),
            AirlineStatus::Registered => write!(f, "registered"),
            AirlineStatus::Funded => write!(f, "funded"),
        }
    }
}

/// An airline known to the registry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Airline {
    /// Airline identity
    pub id: AccountId,
    /// Current status
    pub status: AirlineStatus,
    /// Sponsors that voted to admit this airline
    pub voters: BTreeSet<AccountId>,
    /// Total value paid through `fund`
    pub funded_amount: Amount,
    /// When the airline was admitted
    pub admitted_at: Option<Timestamp>,
}

impl Airline {
    fn candidate(id: AccountId) -> Self {
        Self {
            id,
            status: AirlineStatus::InRegistration,
            voters: BTreeSet::new(),
            funded_amount: 0,
            admitted_at: None,
        }
    }
}

/// Result of a `register_airline` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Admission {
    /// The candidate airline
    pub candidate: AccountId,
    /// Candidate status after the call
    pub status: AirlineStatus,
    /// Vote tally after the call
    pub tally: AdmissionTally,
    /// True when the sponsor had already voted and nothing changed
    pub duplicate_vote: bool,
}

impl Admission {
    /// Whether this call admitted the candidate.
    pub fn admitted(&self) -> bool {
        self.status.is_admitted()
    }
}

/// Registry of federation airlines.
pub struct AirlineRegistry {
    airlines: HashMap<AccountId, Airline>,
    /// Admitted airlines in admission order
    admitted: Vec<AccountId>,
    rule: AdmissionRule,
    funding_floor: Amount,
}

impl AirlineRegistry {
    /// Create a registry with `genesis` admitted and unfunded.
    pub fn new(genesis: AccountId, rule: AdmissionRule, funding_floor: Amount) -> Self {
        let mut airline = Airline::candidate(genesis.clone());
        airline.status = AirlineStatus::Registered;
        airline.admitted_at = Some(now());

        let mut airlines = HashMap::new();
        airlines.insert(genesis.clone(), airline);
        info!(airline = %genesis, "genesis airline registered");

        Self {
            airlines,
            admitted: vec![genesis],
            rule,
            funding_floor,
        }
    }

    /// Vote for `candidate` on behalf of `sponsor`.
    pub fn register_airline(
        &mut self,
        gate: &OperationalGate,
        candidate: &AccountId,
        sponsor: &AccountId,
    ) -> Result<Admission> {
        gate.require_operational()?;

        if !self.is_funded_airline(sponsor) {
            return Err(Error::Unauthorized(format!(
                "sponsor {} is not a funded airline",
                sponsor
            )));
        }
        if candidate == sponsor {
            return Err(Error::Unauthorized(format!("{} cannot vote for itself", sponsor)));
        }
        if self.is_registered_airline(candidate) {
            return Err(Error::AlreadyRegistered(candidate.to_string()));
        }

        let federation_size = self.federation_size();
        let voter_base = self.voter_base();

        let airline = self
            .airlines
            .entry(candidate.clone())
            .or_insert_with(|| Airline::candidate(candidate.clone()));

        let duplicate_vote = !airline.voters.insert(sponsor.clone());
        let tally = self.rule.tally(airline.voters.len(), federation_size, voter_base);

        if duplicate_vote {
            debug!(candidate = %candidate, sponsor = %sponsor, "duplicate admission vote ignored");
        } else {
            debug!(
                candidate = %candidate,
                sponsor = %sponsor,
                votes = tally.votes,
                required = tally.required,
                "admission vote recorded"
            );
        }

        if tally.admitted {
            airline.status = AirlineStatus::Registered;
            airline.admitted_at = Some(now());
            self.admitted.push(candidate.clone());
            info!(airline = %candidate, votes = tally.votes, "airline registered");
        }

        Ok(Admission {
            candidate: candidate.clone(),
            status: airline.status,
            tally,
            duplicate_vote,
        })
    }

    /// Fund an admitted airline. The floor applies to each payment and is not
    /// accumulated across payments.
    pub fn fund(
        &mut self,
        gate: &OperationalGate,
        airline: &AccountId,
        amount: Amount,
    ) -> Result<AirlineStatus> {
        gate.require_operational()?;

        let entry = match self.airlines.get_mut(airline) {
            Some(entry) if entry.status.is_admitted() => entry,
            _ => return Err(Error::NotRegistered(airline.to_string())),
        };

        if amount < self.funding_floor {
            return Err(Error::InsufficientFunds {
                required: self.funding_floor,
                provided: amount,
            });
        }

        entry.funded_amount = entry
            .funded_amount
            .checked_add(amount)
            .ok_or(Error::ArithmeticOverflow)?;
        entry.status = AirlineStatus::Funded;

        info!(airline = %airline, amount = %amount, "airline funded");
        Ok(entry.status)
    }

    /// Status of an airline; unknown identities are `Unregistered`.
    pub fn status(&self, id: &AccountId) -> AirlineStatus {
        self.airlines
            .get(id)
            .map(|a| a.status)
            .unwrap_or(AirlineStatus::Unregistered)
    }

    /// Whether the airline is at least `Registered`.
    pub fn is_registered_airline(&self, id: &AccountId) -> bool {
        self.status(id).is_admitted()
    }

    /// Whether the airline is `Funded`.
    pub fn is_funded_airline(&self, id: &AccountId) -> bool {
        self.status(id) == AirlineStatus::Funded
    }

    /// Get an airline record.
    pub fn get(&self, id: &AccountId) -> Option<&Airline> {
        self.airlines.get(id)
    }

    /// Admitted airlines in admission order.
    pub fn airlines(&self) -> &[AccountId] {
        &self.admitted
    }

    /// Number of airlines ever admitted, genesis included.
    pub fn federation_size(&self) -> usize {
        self.admitted.len()
    }

    /// Number of currently funded airlines.
    pub fn funded_count(&self) -> usize {
        self.airlines
            .values()
            .filter(|a| a.status == AirlineStatus::Funded)
            .count()
    }

    fn voter_base(&self) -> usize {
        match self.rule.basis {
            ConsensusBasis::FundedAirlines => self.funded_count(),
            ConsensusBasis::AdmittedAirlines => self.federation_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::UNIT;

    const FLOOR: Amount = 10 * UNIT;

    fn id(n: usize) -> AccountId {
        AccountId::new(format!("airline-{}", n))
    }

    fn setup(basis: ConsensusBasis) -> (AirlineRegistry, OperationalGate) {
        let registry = AirlineRegistry::new(id(1), AdmissionRule::new(4, basis), FLOOR);
        let gate = OperationalGate::new(AccountId::from("owner"));
        (registry, gate)
    }

    /// Admit and fund airlines 2..=4 through the founding-phase rule.
    fn founding_cohort(registry: &mut AirlineRegistry, gate: &OperationalGate) {
        registry.fund(gate, &id(1), FLOOR).unwrap();
        for n in 2..=4 {
            let admission = registry.register_airline(gate, &id(n), &id(n - 1)).unwrap();
            assert!(admission.admitted());
            registry.fund(gate, &id(n), FLOOR).unwrap();
        }
    }

    #[test]
    fn test_genesis_registered_unfunded() {
        let (registry, _) = setup(ConsensusBasis::FundedAirlines);
        assert!(registry.is_registered_airline(&id(1)));
        assert!(!registry.is_funded_airline(&id(1)));
        assert_eq!(registry.federation_size(), 1);
    }

    #[test]
    fn test_unfunded_sponsor_unauthorized() {
        let (mut registry, gate) = setup(ConsensusBasis::FundedAirlines);
        let result = registry.register_airline(&gate, &id(2), &id(1));
        assert!(matches!(result, Err(Error::Unauthorized(_))));
        assert_eq!(registry.status(&id(2)), AirlineStatus::Unregistered);
    }

    #[test]
    fn test_fund_requires_registration() {
        let (mut registry, gate) = setup(ConsensusBasis::FundedAirlines);
        let result = registry.fund(&gate, &id(3), FLOOR);
        assert!(matches!(result, Err(Error::NotRegistered(_))));
    }

    #[test]
    fn test_fund_below_floor() {
        let (mut registry, gate) = setup(ConsensusBasis::FundedAirlines);
        let result = registry.fund(&gate, &id(1), FLOOR - 1);
        assert!(matches!(result, Err(Error::InsufficientFunds { .. })));
        assert!(!registry.is_funded_airline(&id(1)));
    }

    #[test]
    fn test_founding_cohort_single_vote() {
        let (mut registry, gate) = setup(ConsensusBasis::FundedAirlines);
        founding_cohort(&mut registry, &gate);
        assert_eq!(registry.federation_size(), 4);
        assert_eq!(registry.funded_count(), 4);
    }

    #[test]
    fn test_fifth_airline_needs_two_votes() {
        let (mut registry, gate) = setup(ConsensusBasis::FundedAirlines);
        founding_cohort(&mut registry, &gate);

        let first = registry.register_airline(&gate, &id(5), &id(2)).unwrap();
        assert!(!first.admitted());
        assert_eq!(first.status, AirlineStatus::InRegistration);
        assert!(!registry.is_registered_airline(&id(5)));

        let second = registry.register_airline(&gate, &id(5), &id(3)).unwrap();
        assert!(second.admitted());
        assert_eq!(second.tally.votes, 2);
    }

    #[test]
    fn test_duplicate_vote_not_counted() {
        let (mut registry, gate) = setup(ConsensusBasis::FundedAirlines);
        founding_cohort(&mut registry, &gate);

        registry.register_airline(&gate, &id(5), &id(2)).unwrap();
        let again = registry.register_airline(&gate, &id(5), &id(2)).unwrap();
        assert!(again.duplicate_vote);
        assert_eq!(again.tally.votes, 1);
        assert!(!registry.is_registered_airline(&id(5)));
    }

    #[test]
    fn test_self_vote_unauthorized() {
        let (mut registry, gate) = setup(ConsensusBasis::AdmittedAirlines);
        registry.fund(&gate, &id(1), FLOOR).unwrap();

        // Checked before the already-registered rule.
        let result = registry.register_airline(&gate, &id(1), &id(1));
        match result {
            Err(Error::Unauthorized(reason)) => assert!(reason.contains("itself")),
            other => panic!("expected Unauthorized, got {:?}", other),
        }
        assert_eq!(registry.status(&id(1)), AirlineStatus::Funded);
        assert_eq!(registry.get(&id(1)).unwrap().voters.len(), 0);
    }

    #[test]
    fn test_already_registered_candidate() {
        let (mut registry, gate) = setup(ConsensusBasis::FundedAirlines);
        founding_cohort(&mut registry, &gate);
        let result = registry.register_airline(&gate, &id(3), &id(2));
        assert!(matches!(result, Err(Error::AlreadyRegistered(_))));
    }

    #[test]
    fn test_sixth_airline_threshold_by_basis() {
        // Airline 5 is admitted but not funded: 4 funded, 5 admitted.
        for (basis, required) in [
            (ConsensusBasis::FundedAirlines, 2),
            (ConsensusBasis::AdmittedAirlines, 3),
        ] {
            let (mut registry, gate) = setup(basis);
            founding_cohort(&mut registry, &gate);
            registry.register_airline(&gate, &id(5), &id(2)).unwrap();
            registry.register_airline(&gate, &id(5), &id(3)).unwrap();
            assert!(registry.is_registered_airline(&id(5)));

            let mut last = None;
            for sponsor in 2..2 + required {
                assert!(!registry.is_registered_airline(&id(6)));
                last = Some(registry.register_airline(&gate, &id(6), &id(sponsor)).unwrap());
            }
            let last = last.unwrap();
            assert!(last.admitted());
            assert_eq!(last.tally.required, required);
        }
    }

    #[test]
    fn test_closed_gate_blocks_mutation() {
        let (mut registry, mut gate) = setup(ConsensusBasis::FundedAirlines);
        gate.set_operating_status(&AccountId::from("owner"), false).unwrap();
        assert!(matches!(registry.fund(&gate, &id(1), FLOOR), Err(Error::NotOperational)));
        assert!(registry.is_registered_airline(&id(1)));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AirlineStatus::Unregistered.code(), 0);
        assert_eq!(AirlineStatus::InRegistration.code(), 10);
        assert_eq!(AirlineStatus::Registered.code(), 20);
        assert_eq!(AirlineStatus::Funded.code(), 30);
    }
}
