//! # FlightSure - Flight-Delay Insurance Engine
//!
//! A platform-independent logic engine providing:
//! - **Airline governance**: funded, consensus-gated admission to the federation
//! - **Oracle consensus**: pseudo-random capability indices and quorum detection
//! - **Insurance ledger**: capped premiums, 1.5x credit on airline-fault delays, safe withdrawal
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use flightsure::core::{AccountId, EngineConfig, UNIT};
//! use flightsure::engine::FlightSurety;
//!
//! let owner = AccountId::from("owner");
//! let genesis = AccountId::from("airline-1");
//! let mut engine = FlightSurety::new(EngineConfig::default(), owner, genesis.clone()).unwrap();
//! engine.fund(&genesis, 10 * UNIT).unwrap();
//! engine.buy(&AccountId::from("passenger"), &genesis, "ND1309", 1_600_000_000, UNIT).unwrap();
//! ```

pub mod airline;
pub mod core;
pub mod engine;
pub mod gate;
pub mod insurance;
pub mod monitoring;
pub mod oracle;
pub mod signals;

pub use crate::core::error::{Error, Result};
pub use engine::{FlightSurety, SharedFlightSurety};
