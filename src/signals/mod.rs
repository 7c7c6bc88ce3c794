//! Signals
//!
//! Observable notifications consumed by oracle workers, relays and UIs.

pub mod bus;

pub use bus::{Signal, SignalBus, SignalRecord};
