//! Airline Registry
//!
//! Controlled admission of airlines into the voting federation:
//! - Founding-phase single-sponsor admission
//! - Majority consensus once the federation is large enough
//! - Funding floor gating sponsorship rights

pub mod registry;
pub mod voting;

pub use registry::{Admission, Airline, AirlineRegistry, AirlineStatus};
pub use voting::{AdmissionRule, AdmissionTally, ConsensusBasis};
