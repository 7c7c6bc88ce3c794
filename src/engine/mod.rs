//! Engine
//!
//! Owns the single state store and exposes the call surface:
//! - [`FlightSurety`] for single-writer use
//! - [`SharedFlightSurety`] for many async callers behind one lock

pub mod shared;
pub mod surety;

pub use shared::SharedFlightSurety;
pub use surety::FlightSurety;
