//! Monitoring Module
//!
//! Structured logging for embedding processes.

pub mod logging;

pub use logging::{init_logging, LogFormat, LogLevel, LoggerConfig};
