//! Operational Gate
//!
//! Process-wide switch consulted by every mutating entry point.

pub mod operational;

pub use operational::OperationalGate;
