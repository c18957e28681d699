//! Error types for the spender relay

use karma_ledger::Address;
use thiserror::Error;

/// Result type for relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Relay errors
#[derive(Error, Debug)]
pub enum Error {
    /// Rejected by the signature checks or by the ledger
    #[error(transparent)]
    Ledger(#[from] karma_ledger::Error),

    /// Administrative call from someone other than the admin
    #[error("Unauthorized: {caller} is not the relay admin")]
    Unauthorized {
        /// Submitting account
        caller: Address,
    },

    /// No ledger to spend on
    #[error("Ledger reference not configured")]
    LedgerNotConfigured,

    /// A fee was requested but nobody is set to receive it
    #[error("Beneficiary not configured")]
    BeneficiaryNotConfigured,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Ledger(e) => e.kind(),
            Error::Unauthorized { .. } => "unauthorized",
            Error::LedgerNotConfigured => "ledger_not_configured",
            Error::BeneficiaryNotConfigured => "beneficiary_not_configured",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
        }
    }
}
