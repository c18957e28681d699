//! Error types for the ledger

use crate::types::{Address, Amount, Nonce, Timestamp};
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
///
/// Every variant aborts the operation that raised it; nothing is partially applied.
#[derive(Error, Debug)]
pub enum Error {
    /// Fixed-width accumulator would exceed its maximum
    #[error("Arithmetic overflow: {0}")]
    Overflow(&'static str),

    /// Well-formed signature from someone other than the expected signer
    #[error("Bad signature: not signed by {signer}")]
    BadSignature {
        /// Account the instruction claims to come from
        signer: Address,
    },

    /// Signature encoding cannot be recovered
    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    /// Authorization already spent or signed for another nonce
    #[error("Nonce mismatch for {account}: current nonce is {current}")]
    NonceMismatch {
        /// Signing account
        account: Address,
        /// Nonce the account must sign with next
        current: Nonce,
    },

    /// Deadline has passed
    #[error("Expired: deadline {deadline} is before ledger time {now}")]
    Expired {
        /// Deadline carried by the message
        deadline: Timestamp,
        /// Ledger time at verification
        now: Timestamp,
    },

    /// Delegated spend exceeds the granted ceiling
    #[error("Insufficient allowance: {spender} may spend {available} of {owner}, requested {requested}")]
    InsufficientAllowance {
        /// Granting account
        owner: Address,
        /// Spending account
        spender: Address,
        /// Remaining allowance
        available: Amount,
        /// Attempted spend
        requested: Amount,
    },

    /// Account list does not describe a cycle
    #[error("No cycle: {0}")]
    NoCycle(String),

    /// A cycle edge carries no debt
    #[error("Broken cycle: no debt from {debtor} to {creditor}")]
    BrokenCycle {
        /// Edge start
        debtor: Address,
        /// Edge end
        creditor: Address,
    },

    /// Batch columns disagree in length
    #[error("Malformed batch: {0}")]
    MalformedBatch(String),

    /// Invalid argument (address text, key material, etc.)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invariant violation (supply accounting, etc.)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// Binary serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable label for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Overflow(_) => "overflow",
            Error::BadSignature { .. } => "bad_signature",
            Error::MalformedSignature(_) => "malformed_signature",
            Error::NonceMismatch { .. } => "nonce_mismatch",
            Error::Expired { .. } => "expired",
            Error::InsufficientAllowance { .. } => "insufficient_allowance",
            Error::NoCycle(_) => "no_cycle",
            Error::BrokenCycle { .. } => "broken_cycle",
            Error::MalformedBatch(_) => "malformed_batch",
            Error::InvalidInput(_) => "invalid_input",
            Error::InvariantViolation(_) => "invariant_violation",
            Error::Config(_) => "config",
            Error::Metrics(_) => "metrics",
            Error::Serialization(_) => "serialization",
            Error::Json(_) => "json",
            Error::Io(_) => "io",
        }
    }
}

impl From<prometheus::Error> for Error {
    fn from(err: prometheus::Error) -> Self {
        Error::Metrics(err.to_string())
    }
}
