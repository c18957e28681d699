//! Property-based tests for ledger invariants
//!
//! These tests use proptest to verify critical invariants:
//! - Supply conservation: total supply == Σ(balances)
//! - Netting: every edge drops by the smallest edge, balances rise by the cycle reward
//! - Atomicity: a rejected operation leaves the state byte-identical
//! - Replay protection: nonces advance by one and accepted signatures never re-apply

use karma_ledger::{
    domain, Address, Amount, Config, Error, KeyPair, Ledger, ManualClock, SignedTransfer,
};
use proptest::prelude::*;
use std::sync::Arc;

const NOW: u64 = 1_700_000_000;

fn addr(index: u8) -> Address {
    Address::new([index + 1; 20])
}

/// Create test ledger on a fixed clock
fn create_test_ledger() -> Ledger {
    Ledger::with_clock(Config::default(), Arc::new(ManualClock::new(NOW))).unwrap()
}

/// Strategy for generating direct transfers between a handful of accounts
fn transfer_strategy() -> impl Strategy<Value = (u8, u8, Amount)> {
    (0u8..6, 0u8..6, 0u128..1_000_000)
}

fn sign(ledger: &Ledger, signer: &KeyPair, to: Address, amount: Amount) -> SignedTransfer {
    let message = domain::Transfer {
        from: signer.address(),
        to,
        amount,
        fee: 0,
        nonce: ledger.nonces(&signer.address()),
        deadline: NOW + 60,
    };
    SignedTransfer {
        from: signer.address(),
        to,
        amount,
        fee: 0,
        deadline: NOW + 60,
        signature: signer.sign_typed(ledger.domain(), &message).unwrap(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: Balances are the sum of issued debt and the supply tracks them
    #[test]
    fn prop_transfers_conserve_supply(transfers in prop::collection::vec(transfer_strategy(), 1..40)) {
        let mut ledger = create_test_ledger();
        let mut issued = [0u128; 6];

        for (from, to, amount) in &transfers {
            ledger.transfer(addr(*from), addr(*to), *amount).unwrap();
            issued[*from as usize] += amount;
        }

        for (index, expected) in issued.iter().enumerate() {
            prop_assert_eq!(ledger.balance_of(&addr(index as u8)), *expected);
        }
        prop_assert_eq!(ledger.total_supply(), issued.iter().sum::<u128>());
        prop_assert!(ledger.check_invariants().is_ok());
    }

    /// Property: Netting removes the smallest edge from every edge and pays each reward
    #[test]
    fn prop_netting_removes_min_edge(
        edges in prop::collection::vec(1u128..10_000, 2..8),
        reward in 0u128..5,
    ) {
        let mut ledger = create_test_ledger();
        let accounts: Vec<Address> = (0..edges.len() as u8).map(addr).collect();

        for (i, amount) in edges.iter().enumerate() {
            let creditor = accounts[(i + 1) % accounts.len()];
            ledger.transfer(accounts[i], creditor, *amount).unwrap();
            ledger.set_cycle_reward(accounts[i], reward).unwrap();
        }

        let min = *edges.iter().min().unwrap();
        ledger.mine_cycle(addr(100), accounts.clone()).unwrap();

        for (i, amount) in edges.iter().enumerate() {
            let creditor = accounts[(i + 1) % accounts.len()];
            prop_assert_eq!(ledger.debt_of(&accounts[i], &creditor), amount - min);
            prop_assert_eq!(ledger.balance_of(&accounts[i]), amount + reward);
        }
        prop_assert!(ledger.check_invariants().is_ok());

        // at least one edge is now empty, so the same loop cannot be mined again
        let again = ledger.mine_cycle(addr(100), accounts);
        let is_broken = matches!(again, Err(Error::BrokenCycle { .. }));
        prop_assert!(is_broken);
    }

    /// Property: A rejected allowance spend changes nothing
    #[test]
    fn prop_rejected_operation_is_noop(
        allowance in 0u128..1_000,
        excess in 1u128..1_000,
        prior in prop::collection::vec(transfer_strategy(), 0..10),
    ) {
        let mut ledger = create_test_ledger();
        for (from, to, amount) in &prior {
            ledger.transfer(addr(*from), addr(*to), *amount).unwrap();
        }
        ledger.approve(addr(0), addr(50), allowance).unwrap();

        let before = ledger.snapshot().to_bytes().unwrap();
        let events = ledger.events().len();

        let result = ledger.transfer_from(addr(50), addr(0), addr(1), allowance + excess);
        let is_insufficient = matches!(result, Err(Error::InsufficientAllowance { .. }));
        prop_assert!(is_insufficient);
        prop_assert_eq!(ledger.snapshot().to_bytes().unwrap(), before);
        prop_assert_eq!(ledger.events().len(), events);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    /// Property: Nonces advance by one and every accepted signature is single-use
    #[test]
    fn prop_signed_transfers_are_single_use(amounts in prop::collection::vec(1u128..1_000, 1..8)) {
        let mut ledger = create_test_ledger();
        let signer = KeyPair::generate();
        let mut accepted = Vec::new();

        for (i, amount) in amounts.iter().enumerate() {
            let signed = sign(&ledger, &signer, addr(1), *amount);
            ledger.meta_transfer(signed.clone(), addr(2)).unwrap();
            prop_assert_eq!(ledger.nonces(&signer.address()), i as u64 + 1);
            accepted.push(signed);
        }

        let balance = ledger.balance_of(&signer.address());
        for signed in accepted {
            let replay = ledger.meta_transfer(signed, addr(2));
            let is_mismatch = matches!(replay, Err(Error::NonceMismatch { .. }));
            prop_assert!(is_mismatch);
        }
        prop_assert_eq!(ledger.balance_of(&signer.address()), balance);
        prop_assert_eq!(balance, amounts.iter().sum::<u128>());
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn test_restore_then_continue() {
        let mut ledger = create_test_ledger();
        ledger.transfer(addr(0), addr(1), 10).unwrap();
        ledger.transfer(addr(1), addr(0), 4).unwrap();

        let snapshot = ledger.snapshot();
        let mut restored =
            Ledger::restore(Config::default(), Arc::new(ManualClock::new(NOW)), snapshot).unwrap();

        restored.mine_cycle(addr(9), vec![addr(0), addr(1)]).unwrap();
        assert_eq!(restored.debt_of(&addr(0), &addr(1)), 6);
        assert_eq!(restored.debt_of(&addr(1), &addr(0)), 0);
        assert_eq!(restored.balance_of(&addr(0)), 10);
        assert_eq!(restored.total_supply(), 14);
        restored.check_invariants().unwrap();
    }
}
