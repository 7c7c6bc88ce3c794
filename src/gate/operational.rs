//! Operating status switch owned by an administrative identity.

use crate::core::{AccountId, Error, Result};
use tracing::warn;

/// Boolean switch gating all mutating operations.
#[derive(Clone, Debug)]
pub struct OperationalGate {
    admin: AccountId,
    operational: bool,
}

impl OperationalGate {
    /// Create an open gate administered by `admin`.
    pub fn new(admin: AccountId) -> Self {
        Self {
            admin,
            operational: true,
        }
    }

    /// Whether mutating operations are currently allowed.
    pub fn is_operational(&self) -> bool {
        self.operational
    }

    /// The administrative identity.
    pub fn admin(&self) -> &AccountId {
        &self.admin
    }

    /// Fail with `NotOperational` when the gate is closed.
    pub fn require_operational(&self) -> Result<()> {
        if self.operational {
            Ok(())
        } else {
            Err(Error::NotOperational)
        }
    }

    /// Flip the switch. Only the admin may do this, and it works while closed.
    /// Returns whether the status changed.
    pub fn set_operating_status(&mut self, caller: &AccountId, mode: bool) -> Result<bool> {
        if caller != &self.admin {
            return Err(Error::Unauthorized(format!(
                "{} cannot change operating status",
                caller
            )));
        }
        let changed = self.operational != mode;
        if changed {
            warn!(operational = mode, "operating status changed");
        }
        self.operational = mode;
        Ok(changed)
    }
}
