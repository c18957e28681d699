//! Trusted Spender
//!
//! Relay that spends Karma ledger allowances on behalf of users. It owns a
//! signing domain and nonce space separate from the ledger's, so a signature
//! meant for one can never be replayed against the other.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod config;
pub mod error;
pub mod spender;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use spender::TrustedSpender;
