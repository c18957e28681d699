//! Point-in-time copies of ledger state
//!
//! Snapshots list every record in a deterministic order, so equal states
//! always encode to equal bytes. Restoring checks the supply invariant before
//! the state is handed to a ledger.

use crate::{
    state::State,
    types::{Account, Address, Amount, Hash},
    Error, Result,
};
use serde::{Deserialize, Serialize};

/// Amount attached to an ordered pair of accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairEntry {
    /// Debtor or owner
    pub first: Address,
    /// Creditor or spender
    pub second: Address,
    /// Amount
    pub amount: Amount,
}

/// Serializable ledger state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Account records, by address
    pub accounts: Vec<(Address, Account)>,
    /// Non-zero debt edges
    pub debts: Vec<PairEntry>,
    /// Non-zero allowances
    pub allowances: Vec<PairEntry>,
    /// Accepted signature fingerprints
    pub spent: Vec<(Address, Hash)>,
    /// Sum of balances
    pub total_supply: Amount,
}

impl LedgerSnapshot {
    pub(crate) fn from_state(state: &State) -> Self {
        let mut accounts: Vec<_> = state.accounts.iter().map(|(a, r)| (*a, *r)).collect();
        accounts.sort_by(|a, b| a.0.cmp(&b.0));

        let pairs = |map: &std::collections::HashMap<(Address, Address), Amount>| {
            let mut entries: Vec<_> = map
                .iter()
                .filter(|(_, amount)| **amount > 0)
                .map(|((first, second), amount)| PairEntry {
                    first: *first,
                    second: *second,
                    amount: *amount,
                })
                .collect();
            entries.sort_by(|a, b| (a.first, a.second).cmp(&(b.first, b.second)));
            entries
        };

        let mut spent: Vec<_> = state.spent.iter().copied().collect();
        spent.sort();

        Self {
            accounts,
            debts: pairs(&state.debts),
            allowances: pairs(&state.allowances),
            spent,
            total_supply: state.total_supply(),
        }
    }

    pub(crate) fn into_state(self) -> Result<State> {
        let mut state = State::default();

        for (address, account) in self.accounts {
            if state.accounts.insert(address, account).is_some() {
                return Err(Error::InvalidInput(format!(
                    "account {} listed twice in snapshot",
                    address
                )));
            }
        }
        for entry in self.debts {
            state.debts.insert((entry.first, entry.second), entry.amount);
        }
        for entry in self.allowances {
            state.allowances.insert((entry.first, entry.second), entry.amount);
        }
        state.spent.extend(self.spent);

        let total_supply = state.total_supply();
        if total_supply != self.total_supply {
            return Err(Error::InvariantViolation(format!(
                "recorded total supply {} differs from balance sum {}",
                self.total_supply, total_supply
            )));
        }
        state.check_invariants()?;
        Ok(state)
    }

    /// Encode with bincode
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode from bincode
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Write to a JSON file
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Read from a JSON file
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
