//! Oracle Coordinator
//!
//! Flight status consensus across independent oracle workers:
//! - Pseudo-random capability index assignment
//! - Status request fan-out by index
//! - First status to reach quorum wins

pub mod coordinator;
pub mod entropy;
pub mod request;

pub use coordinator::{
    FetchOutcome, IgnoreReason, OracleCoordinator, OracleWorker, ResponseOutcome, StatusUpdate,
};
pub use entropy::{
    ClockEntropy, EntropySource, FixedEntropy, IndexGenerator, IndexSource, SeededIndexSource,
};
pub use request::{FlightKey, FlightStatus, RevotePolicy, StatusRequest, VoteRecord};
