//! Ledger state and its transactional view
//!
//! [`State`] is the committed keyed store. Operations never write to it
//! directly: they run against a [`Transaction`], which reads through to the
//! committed state and buffers every write. A transaction that returns an error
//! is dropped and leaves no trace; a successful one is turned into a
//! [`StateDelta`] and applied in one step.

use crate::{
    replay::NonceSpace,
    types::{Account, Address, Amount, Hash, LedgerEvent, Nonce},
    Error, Result,
};
use std::collections::{HashMap, HashSet};

/// Ordered `(debtor, creditor)` or `(owner, spender)` pair
pub type Pair = (Address, Address);

/// Committed ledger state
#[derive(Debug, Clone, Default)]
pub struct State {
    pub(crate) accounts: HashMap<Address, Account>,
    pub(crate) debts: HashMap<Pair, Amount>,
    pub(crate) allowances: HashMap<Pair, Amount>,
    pub(crate) spent: HashSet<(Address, Hash)>,
}

impl State {
    /// Account record (default for never-seen accounts)
    pub fn account(&self, address: &Address) -> Account {
        self.accounts.get(address).copied().unwrap_or_default()
    }

    /// Debt owed by `debtor` to `creditor`
    pub fn debt(&self, debtor: &Address, creditor: &Address) -> Amount {
        self.debts.get(&(*debtor, *creditor)).copied().unwrap_or(0)
    }

    /// Amount `spender` may still spend on behalf of `owner`
    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances.get(&(*owner, *spender)).copied().unwrap_or(0)
    }

    /// Sum of all balances, saturating at `Amount::MAX`
    ///
    /// Computed on read so that no account's issuance can make another
    /// account's transfer overflow.
    pub fn total_supply(&self) -> Amount {
        self.accounts
            .values()
            .fold(0, |sum: Amount, account| sum.saturating_add(account.balance))
    }

    /// Number of accounts ever written
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    /// Apply the writes of a committed transaction
    pub fn apply(&mut self, delta: StateDelta) {
        self.accounts.extend(delta.accounts);
        for (pair, amount) in delta.debts {
            if amount == 0 {
                self.debts.remove(&pair);
            } else {
                self.debts.insert(pair, amount);
            }
        }
        for (pair, amount) in delta.allowances {
            if amount == 0 {
                self.allowances.remove(&pair);
            } else {
                self.allowances.insert(pair, amount);
            }
        }
        self.spent.extend(delta.spent);
    }

    /// Check that no account owes more than its balance
    ///
    /// Issuance raises a balance and an outgoing edge together, and netting
    /// never takes more off a balance than off that account's edge in the cycle.
    pub fn check_invariants(&self) -> Result<()> {
        let mut owed: HashMap<Address, Amount> = HashMap::new();
        for ((debtor, creditor), amount) in &self.debts {
            let total = owed.entry(*debtor).or_insert(0);
            *total = total.checked_add(*amount).ok_or_else(|| {
                Error::InvariantViolation(format!(
                    "debts of {} exceed the amount range at {}",
                    debtor, creditor
                ))
            })?;
        }

        for (debtor, total) in owed {
            let balance = self.account(&debtor).balance;
            if total > balance {
                return Err(Error::InvariantViolation(format!(
                    "{} owes {} against a balance of {}",
                    debtor, total, balance
                )));
            }
        }
        Ok(())
    }
}

/// Buffered writes of one successful transaction
#[derive(Debug, Default)]
pub struct StateDelta {
    accounts: HashMap<Address, Account>,
    debts: HashMap<Pair, Amount>,
    allowances: HashMap<Pair, Amount>,
    spent: HashSet<(Address, Hash)>,
    events: Vec<LedgerEvent>,
}

impl StateDelta {
    /// Events emitted by the transaction, in order
    pub fn take_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }
}

/// Read-through, write-buffered view of [`State`]
#[derive(Debug)]
pub struct Transaction<'a> {
    base: &'a State,
    accounts: HashMap<Address, Account>,
    debts: HashMap<Pair, Amount>,
    allowances: HashMap<Pair, Amount>,
    spent: HashSet<(Address, Hash)>,
    events: Vec<LedgerEvent>,
}

impl<'a> Transaction<'a> {
    /// Open a view over committed state
    pub fn new(base: &'a State) -> Self {
        Self {
            base,
            accounts: HashMap::new(),
            debts: HashMap::new(),
            allowances: HashMap::new(),
            spent: HashSet::new(),
            events: Vec::new(),
        }
    }

    /// Account record as seen by this transaction
    pub fn account(&self, address: &Address) -> Account {
        self.accounts
            .get(address)
            .copied()
            .unwrap_or_else(|| self.base.account(address))
    }

    /// Debt as seen by this transaction
    pub fn debt(&self, debtor: &Address, creditor: &Address) -> Amount {
        self.debts
            .get(&(*debtor, *creditor))
            .copied()
            .unwrap_or_else(|| self.base.debt(debtor, creditor))
    }

    /// Allowance as seen by this transaction
    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(&(*owner, *spender))
            .copied()
            .unwrap_or_else(|| self.base.allowance(owner, spender))
    }

    fn update_account(&mut self, address: Address, f: impl FnOnce(&mut Account)) {
        let mut account = self.account(&address);
        f(&mut account);
        self.accounts.insert(address, account);
    }

    /// Issue `amount` of debt from `from` to `to`
    ///
    /// Raises the issuer's balance and the `(from, to)` edge together; fails
    /// without writing if either would overflow.
    pub fn issue(&mut self, from: Address, to: Address, amount: Amount) -> Result<()> {
        let balance = self
            .account(&from)
            .balance
            .checked_add(amount)
            .ok_or(Error::Overflow("balance"))?;
        let debt = self
            .debt(&from, &to)
            .checked_add(amount)
            .ok_or(Error::Overflow("debt"))?;

        self.update_account(from, |account| account.balance = balance);
        self.debts.insert((from, to), debt);
        self.events.push(LedgerEvent::Transfer { from, to, amount });
        Ok(())
    }

    /// Cancel `amount` of the `(debtor, creditor)` edge
    pub fn reduce_debt(&mut self, debtor: Address, creditor: Address, amount: Amount) -> Result<()> {
        let debt = self.debt(&debtor, &creditor).checked_sub(amount).ok_or_else(|| {
            Error::InvariantViolation(format!(
                "debt {} -> {} smaller than {}",
                debtor, creditor, amount
            ))
        })?;
        self.debts.insert((debtor, creditor), debt);
        Ok(())
    }

    /// Mint `amount` into an account's balance
    pub fn credit(&mut self, address: Address, amount: Amount) -> Result<()> {
        let balance = self
            .account(&address)
            .balance
            .checked_add(amount)
            .ok_or(Error::Overflow("balance"))?;

        self.update_account(address, |account| account.balance = balance);
        Ok(())
    }

    /// Remove `amount` from an account's balance
    pub fn debit(&mut self, address: Address, amount: Amount) -> Result<()> {
        let balance = self.account(&address).balance.checked_sub(amount).ok_or_else(|| {
            Error::InvariantViolation(format!("balance of {} smaller than {}", address, amount))
        })?;

        self.update_account(address, |account| account.balance = balance);
        Ok(())
    }

    /// Set an account's cycle reward
    pub fn set_cycle_reward(&mut self, owner: Address, amount: Amount) {
        self.update_account(owner, |account| account.cycle_reward = amount);
        self.events.push(LedgerEvent::CycleRewardSet { owner, amount });
    }

    /// Replace an allowance
    pub fn set_allowance(&mut self, owner: Address, spender: Address, value: Amount) {
        self.allowances.insert((owner, spender), value);
        self.events.push(LedgerEvent::Approval {
            owner,
            spender,
            value,
        });
    }

    /// Consume `amount` of the allowance `owner` granted `spender`
    pub fn spend_allowance(&mut self, owner: Address, spender: Address, amount: Amount) -> Result<()> {
        let available = self.allowance(&owner, &spender);
        let remaining = available
            .checked_sub(amount)
            .ok_or(Error::InsufficientAllowance {
                owner,
                spender,
                available,
                requested: amount,
            })?;
        self.allowances.insert((owner, spender), remaining);
        Ok(())
    }

    /// Append an event to the transaction's journal
    pub fn emit(&mut self, event: LedgerEvent) {
        self.events.push(event);
    }

    /// Finish the transaction, handing its writes to the caller to commit
    pub fn into_delta(self) -> StateDelta {
        StateDelta {
            accounts: self.accounts,
            debts: self.debts,
            allowances: self.allowances,
            spent: self.spent,
            events: self.events,
        }
    }
}

impl NonceSpace for Transaction<'_> {
    fn current_nonce(&self, account: &Address) -> Nonce {
        self.account(account).nonce
    }

    fn set_nonce(&mut self, account: Address, nonce: Nonce) {
        self.update_account(account, |record| record.nonce = nonce);
    }

    fn is_spent(&self, account: &Address, fingerprint: &Hash) -> bool {
        let key = (*account, *fingerprint);
        self.spent.contains(&key) || self.base.spent.contains(&key)
    }

    fn mark_spent(&mut self, account: Address, fingerprint: Hash) {
        self.spent.insert((account, fingerprint));
    }
}
