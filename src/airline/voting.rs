//! Graduated admission consensus.
//!
//! A small founding cohort admits by a single sponsor vote. Once the
//! federation reaches the cohort size, a candidate needs a strict majority
//! (ties rounded up) of the configured voter base.

use serde::{Deserialize, Serialize};

/// Which airline count the admission majority is computed over.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsensusBasis {
    /// Majority of airlines that are currently funded
    FundedAirlines,
    /// Majority of all admitted airlines, funded or not
    AdmittedAirlines,
}

/// Outcome of applying a vote against the admission rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionTally {
    /// Distinct sponsors that voted for the candidate
    pub votes: usize,
    /// Votes needed at the time of tallying
    pub required: usize,
    /// Whether the candidate is admitted
    pub admitted: bool,
}

/// Admission threshold rule.
#[derive(Clone, Debug)]
pub struct AdmissionRule {
    /// Federation size from which multiparty consensus applies
    pub founding_cohort: usize,
    /// Voter base for the majority
    pub basis: ConsensusBasis,
}

impl AdmissionRule {
    /// Create a new rule.
    pub fn new(founding_cohort: usize, basis: ConsensusBasis) -> Self {
        Self {
            founding_cohort,
            basis,
        }
    }

    /// Whether a federation of this size still admits by single vote.
    pub fn is_founding_phase(&self, federation_size: usize) -> bool {
        federation_size < self.founding_cohort
    }

    /// Votes required given the current voter base: `ceil(base / 2)`, at least one.
    pub fn required_votes(&self, voter_base: usize) -> usize {
        voter_base.div_ceil(2).max(1)
    }

    /// Tally `votes` against the rule.
    pub fn tally(&self, votes: usize, federation_size: usize, voter_base: usize) -> AdmissionTally {
        let required = if self.is_founding_phase(federation_size) {
            1
        } else {
            self.required_votes(voter_base)
        };

        AdmissionTally {
            votes,
            required,
            admitted: votes >= required,
        }
    }
}

impl Default for AdmissionRule {
    fn default() -> Self {
        Self::new(4, ConsensusBasis::AdmittedAirlines)
    }
}
