//! Cycle netting
//!
//! Cancels circular debt along a caller-nominated loop of accounts.
//!
//! # Algorithm
//!
//! 1. Read the edge from every account to its successor (the last wraps to the first)
//! 2. Reject the loop if any edge is zero
//! 3. Take the smallest edge as the netted amount
//! 4. Reduce every edge by that amount
//! 5. Credit each participant its configured cycle reward
//!
//! With balance reduction enabled, step 4 also takes the netted amount off each
//! participant's outstanding balance before the reward is credited.
//!
//! # Example
//!
//! ```text
//! Edges:     A -> B: 50    B -> C: 40    C -> A: 30
//! Netted:    30
//! After:     A -> B: 20    B -> C: 10    C -> A: 0
//!
//! Balances (reward 1 each):          A 50 -> 51   B 40 -> 41   C 30 -> 31
//! Balances with balance reduction:   A 50 -> 21   B 40 -> 11   C 30 -> 1
//! ```

use crate::{
    state::Transaction,
    types::{Address, Amount, LedgerEvent},
    Error, Result,
};
use std::collections::HashSet;

/// One edge of a validated cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleEdge {
    /// Edge start
    pub debtor: Address,
    /// Edge end
    pub creditor: Address,
    /// Debt on the edge before netting
    pub amount: Amount,
}

/// A loop of accounts whose every edge carries debt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    /// Edges in loop order
    pub edges: Vec<CycleEdge>,
    /// Amount every edge will be reduced by
    pub net_amount: Amount,
}

/// Result of a committed netting pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleSettlement {
    /// Amount removed from every edge
    pub net_amount: Amount,
    /// Sum of participant rewards issued
    pub rewards_issued: Amount,
}

/// Cycle netting engine
#[derive(Debug, Clone)]
pub struct CycleNetting {
    /// Longest loop accepted in one call
    max_cycle_length: usize,

    /// Take the netted amount off participant balances
    reduce_balances: bool,
}

impl CycleNetting {
    /// Create new netting engine
    pub fn new(max_cycle_length: usize) -> Self {
        Self {
            max_cycle_length,
            reduce_balances: false,
        }
    }

    /// Enable or disable balance reduction
    pub fn with_balance_reduction(mut self, enabled: bool) -> Self {
        self.reduce_balances = enabled;
        self
    }

    /// Validate `accounts` as a cycle against the transaction's view
    pub fn find_cycle(&self, tx: &Transaction<'_>, accounts: &[Address]) -> Result<Cycle> {
        if accounts.len() < 2 {
            return Err(Error::NoCycle(format!(
                "a cycle needs at least two accounts, got {}",
                accounts.len()
            )));
        }

        if accounts.len() > self.max_cycle_length {
            return Err(Error::NoCycle(format!(
                "{} accounts exceed the limit of {}",
                accounts.len(),
                self.max_cycle_length
            )));
        }

        let mut seen = HashSet::with_capacity(accounts.len());
        for account in accounts {
            if !seen.insert(account) {
                return Err(Error::NoCycle(format!("{} appears more than once", account)));
            }
        }

        let mut edges = Vec::with_capacity(accounts.len());
        for (i, debtor) in accounts.iter().enumerate() {
            let creditor = accounts[(i + 1) % accounts.len()];
            let amount = tx.debt(debtor, &creditor);

            if amount == 0 {
                return Err(Error::BrokenCycle {
                    debtor: *debtor,
                    creditor,
                });
            }

            edges.push(CycleEdge {
                debtor: *debtor,
                creditor,
                amount,
            });
        }

        let net_amount = edges.iter().map(|e| e.amount).min().unwrap_or(0);

        Ok(Cycle { edges, net_amount })
    }

    /// Net the cycle and pay participant rewards
    pub fn settle(
        &self,
        tx: &mut Transaction<'_>,
        miner: Address,
        accounts: &[Address],
    ) -> Result<CycleSettlement> {
        let cycle = self.find_cycle(tx, accounts)?;
        let net_amount = cycle.net_amount;

        for edge in &cycle.edges {
            tx.reduce_debt(edge.debtor, edge.creditor, net_amount)?;
        }

        let mut rewards_issued: Amount = 0;
        for account in accounts {
            if self.reduce_balances {
                tx.debit(*account, net_amount)?;
            }

            let reward = tx.account(account).cycle_reward;
            tx.credit(*account, reward)?;
            rewards_issued = rewards_issued
                .checked_add(reward)
                .ok_or(Error::Overflow("cycle rewards"))?;
        }

        tx.emit(LedgerEvent::CycleMined {
            miner,
            accounts: accounts.to_vec(),
            amount: net_amount,
        });

        Ok(CycleSettlement {
            net_amount,
            rewards_issued,
        })
    }
}

impl Default for CycleNetting {
    fn default() -> Self {
        Self::new(64)
    }
}
