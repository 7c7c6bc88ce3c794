//! Error types for the flight insurance engine.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in engine operations.
///
/// Every variant is a local, synchronous failure: the call that returns it
/// has left no partial effect behind.
#[derive(Error, Debug)]
pub enum Error {
    // Gate errors
    #[error("Engine is not operational")]
    NotOperational,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // Airline errors
    #[error("Airline not registered: {0}")]
    NotRegistered(String),

    #[error("Unknown airline: {0}")]
    UnknownAirline(String),

    #[error("Airline already registered: {0}")]
    AlreadyRegistered(String),

    // Value errors
    #[error("Insufficient funds: required {required}, got {provided}")]
    InsufficientFunds { required: u128, provided: u128 },

    #[error("Insufficient fee: required {required}, got {provided}")]
    InsufficientFee { required: u128, provided: u128 },

    #[error("Premium {premium} exceeds cap {cap}")]
    PremiumExceedsCap { premium: u128, cap: u128 },

    #[error("Insufficient reserves: requested {requested}, available {available}")]
    InsufficientReserves { requested: u128, available: u128 },

    #[error("Arithmetic overflow")]
    ArithmeticOverflow,

    // Oracle errors
    #[error("Oracle already registered: {0}")]
    OracleAlreadyRegistered(String),

    // Ledger errors
    #[error("Policy already exists: {0}")]
    DuplicatePolicy(String),

    #[error("No credit available for {0}")]
    NoCredit(String),

    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}
