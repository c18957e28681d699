//! Karma Ledger Core
//!
//! Mutual-credit ledger: balances are IOUs. A transfer never moves value, it
//! issues debt from the sender to the recipient. Circular debt can be netted
//! away, and off-line signed instructions let relayers act for users.
//!
//! # Architecture
//!
//! - **Typed signing**: Instructions are EIP-712 messages bound to a per-instance domain
//! - **Replay guard**: Per-account nonces, deadlines and a spent-signature registry
//! - **Transactional writes**: Every operation commits completely or not at all
//! - **Cycle netting**: Caller-nominated loops are cancelled by their smallest edge

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]
//!
//! # Invariants
//!
//! - Supply conservation: total supply == Σ(balances) after every commit
//! - Monotonic nonces: a nonce advances by exactly one per accepted signature
//! - Atomicity: a failed operation leaves no observable trace

pub mod batch;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod domain;
pub mod error;
pub mod handle;
pub mod ledger;
pub mod metrics;
pub mod netting;
pub mod replay;
pub mod snapshot;
pub mod state;
pub mod types;

// Re-exports
pub use batch::{SignedTransfer, TransferBatch};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, NettingConfig};
pub use crypto::KeyPair;
pub use domain::{DomainSeparator, TypedMessage};
pub use error::{Error, Result};
pub use handle::LedgerHandle;
pub use ledger::{Ledger, Operation};
pub use netting::{Cycle, CycleNetting};
pub use replay::{NonceSpace, NonceTable};
pub use snapshot::LedgerSnapshot;
pub use types::{Account, Address, Amount, Hash, LedgerEvent, Nonce, Signature, Timestamp};
