//! Engine configuration.
//!
//! Every fixed constant of the insurance rules lives here so deployments can
//! audit and override them from JSON.

use crate::airline::ConsensusBasis;
use crate::core::{Amount, Error, Result, UNIT};
use crate::oracle::RevotePolicy;
use serde::{Deserialize, Serialize};

/// Engine configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum single payment that funds an airline
    pub funding_floor: Amount,
    /// Fee an oracle worker pays to register
    pub registration_fee: Amount,
    /// Maximum premium for one policy
    pub premium_cap: Amount,
    /// Federation size below which a single sponsor admits a candidate
    pub founding_cohort: usize,
    /// Which airline count the admission majority is computed over
    pub consensus_basis: ConsensusBasis,
    /// Capability indices are drawn from `0..index_range`
    pub index_range: u8,
    /// Number of distinct indices assigned to each oracle
    pub indices_per_oracle: usize,
    /// Matching responses needed to finalize a status request
    pub quorum: usize,
    /// Payout multiplier numerator
    pub payout_numerator: Amount,
    /// Payout multiplier denominator
    pub payout_denominator: Amount,
    /// How a second, different answer from the same oracle is handled
    pub revote_policy: RevotePolicy,
    /// Buffer size of the live signal channel
    pub signal_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            funding_floor: 10 * UNIT,
            registration_fee: UNIT,
            premium_cap: UNIT,
            founding_cohort: 4,
            consensus_basis: ConsensusBasis::AdmittedAirlines,
            index_range: 10,
            indices_per_oracle: 3,
            quorum: 3,
            payout_numerator: 3,
            payout_denominator: 2,
            revote_policy: RevotePolicy::Reject,
            signal_capacity: 256,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Export configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<()> {
        if self.index_range == 0 {
            return Err(Error::InvalidConfig("index_range must be positive".into()));
        }
        if self.indices_per_oracle == 0 || self.indices_per_oracle > self.index_range as usize {
            return Err(Error::InvalidConfig(format!(
                "indices_per_oracle must be in 1..={}",
                self.index_range
            )));
        }
        if self.quorum == 0 {
            return Err(Error::InvalidConfig("quorum must be positive".into()));
        }
        if self.payout_denominator == 0 {
            return Err(Error::InvalidConfig("payout_denominator must be positive".into()));
        }
        if self.premium_cap.checked_mul(self.payout_numerator).is_none() {
            return Err(Error::InvalidConfig(
                "premium_cap * payout_numerator overflows".into(),
            ));
        }
        if self.signal_capacity == 0 {
            return Err(Error::InvalidConfig("signal_capacity must be positive".into()));
        }
        Ok(())
    }
}
