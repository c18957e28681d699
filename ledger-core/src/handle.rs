//! Shared access to one ledger
//!
//! A [`LedgerHandle`] is a cloneable reference to a single ledger instance.
//! Every clone serializes through the same lock, so operations submitted from
//! several components (the ledger's own callers, a spender relay) are applied
//! one at a time in a total order.
//!
//! Callers that must check their own state and then call the ledger without
//! interleaving take the guard with [`LedgerHandle::lock`] and hold it across
//! both steps.

use crate::{
    ledger::{Ledger, Operation},
    types::{Address, Amount, Nonce},
    Result,
};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// Cloneable handle to a ledger
#[derive(Debug, Clone)]
pub struct LedgerHandle {
    inner: Arc<Mutex<Ledger>>,
}

impl LedgerHandle {
    /// Take ownership of a ledger
    pub fn new(ledger: Ledger) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ledger)),
        }
    }

    /// Exclusive access until the guard is dropped
    pub fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.inner.lock()
    }

    /// Run a closure with exclusive access
    pub fn with<T>(&self, f: impl FnOnce(&mut Ledger) -> T) -> T {
        let mut ledger = self.inner.lock();
        f(&mut ledger)
    }

    /// Apply an operation atomically
    pub fn execute(&self, operation: Operation) -> Result<()> {
        self.inner.lock().execute(operation)
    }

    /// Address of the ledger instance
    pub fn address(&self) -> Address {
        self.inner.lock().address()
    }

    /// Outstanding balance
    pub fn balance_of(&self, account: &Address) -> Amount {
        self.inner.lock().balance_of(account)
    }

    /// Debt `debtor` owes `creditor`
    pub fn debt_of(&self, debtor: &Address, creditor: &Address) -> Amount {
        self.inner.lock().debt_of(debtor, creditor)
    }

    /// Remaining allowance
    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.inner.lock().allowance(owner, spender)
    }

    /// Ledger nonce of the account
    pub fn nonces(&self, account: &Address) -> Nonce {
        self.inner.lock().nonces(account)
    }

    /// Whether both handles refer to the same ledger
    pub fn same_ledger(&self, other: &LedgerHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;
    use std::thread;

    fn addr(byte: u8) -> Address {
        Address::new([byte; 20])
    }

    #[test]
    fn test_clones_share_one_ledger() {
        let handle = LedgerHandle::new(Ledger::new(Config::default()).unwrap());
        let other = handle.clone();

        other
            .execute(Operation::Transfer {
                caller: addr(1),
                to: addr(2),
                amount: 7,
            })
            .unwrap();

        assert!(handle.same_ledger(&other));
        assert_eq!(handle.balance_of(&addr(1)), 7);
    }

    #[test]
    fn test_concurrent_transfers_serialize() {
        let handle = LedgerHandle::new(Ledger::new(Config::default()).unwrap());

        let workers: Vec<_> = (0..8u8)
            .map(|i| {
                let handle = handle.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        handle.with(|ledger| ledger.transfer(addr(1), addr(10 + i), 1)).unwrap();
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(handle.balance_of(&addr(1)), 200);
        assert_eq!(handle.lock().total_supply(), 200);
        handle.lock().check_invariants().unwrap();
    }
}
