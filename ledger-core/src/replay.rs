//! Replay protection for signed instructions
//!
//! Each verifying instance (the ledger, the spender relay) owns one nonce space:
//! a per-account counter plus a registry of spent signatures. A signed
//! instruction is accepted only for the signer's current nonce and before its
//! deadline; accepting it advances the counter and records the signature.
//!
//! Checks never mutate. [`consume`] is the only writer and runs after every
//! check of the enclosing operation has passed.

use crate::{
    crypto,
    domain::{DomainSeparator, TypedMessage},
    types::{Address, Hash, Nonce, Signature, Timestamp},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Storage for one nonce space
pub trait NonceSpace {
    /// Nonce `account` must sign with next
    fn current_nonce(&self, account: &Address) -> Nonce;

    /// Store the next nonce for `account`
    fn set_nonce(&mut self, account: Address, nonce: Nonce);

    /// Whether `fingerprint` was already accepted for `account`
    fn is_spent(&self, account: &Address, fingerprint: &Hash) -> bool;

    /// Record an accepted signature
    fn mark_spent(&mut self, account: Address, fingerprint: Hash);
}

/// Fail `Expired` iff the deadline lies before ledger time
pub fn check_deadline(deadline: Timestamp, now: Timestamp) -> Result<()> {
    if deadline < now {
        return Err(Error::Expired { deadline, now });
    }
    Ok(())
}

/// Fail `NonceMismatch` unless `presented` is the account's current nonce
pub fn check_nonce<S: NonceSpace + ?Sized>(
    space: &S,
    account: &Address,
    presented: Nonce,
) -> Result<()> {
    let current = space.current_nonce(account);
    if presented != current {
        return Err(Error::NonceMismatch {
            account: *account,
            current,
        });
    }
    Ok(())
}

/// Check and advance the account's nonce, recording the signature as spent
pub fn consume<S: NonceSpace + ?Sized>(
    space: &mut S,
    account: Address,
    presented: Nonce,
    signature: &Signature,
) -> Result<()> {
    check_nonce(space, &account, presented)?;
    let next = presented
        .checked_add(1)
        .ok_or(Error::Overflow("nonce counter"))?;

    space.set_nonce(account, next);
    space.mark_spent(account, crypto::fingerprint(signature));
    Ok(())
}

/// Run every check for a signed instruction: deadline, signature, nonce
///
/// `message` must carry `nonce`. A signature that fails to verify but was
/// already accepted for `signer` is reported as `NonceMismatch`: it is a replay,
/// not a forgery.
#[allow(clippy::too_many_arguments)]
pub fn authorize<S, M>(
    space: &S,
    domain: &DomainSeparator,
    signer: &Address,
    message: &M,
    nonce: Nonce,
    deadline: Timestamp,
    now: Timestamp,
    signature: &Signature,
) -> Result<()>
where
    S: NonceSpace + ?Sized,
    M: TypedMessage,
{
    check_deadline(deadline, now)?;

    let replayed = space.is_spent(signer, &crypto::fingerprint(signature));
    let replay_error = || Error::NonceMismatch {
        account: *signer,
        current: space.current_nonce(signer),
    };

    match crypto::verify(signer, message, domain, signature) {
        Err(Error::BadSignature { .. }) if replayed => return Err(replay_error()),
        Err(e) => return Err(e),
        Ok(()) if replayed => return Err(replay_error()),
        Ok(()) => {}
    }

    check_nonce(space, signer, nonce)
}

/// Stand-alone nonce space, for verifiers that keep their own
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NonceTable {
    counters: HashMap<Address, Nonce>,
    spent: HashSet<(Address, Hash)>,
}

impl NonceTable {
    /// Create empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of accepted signatures
    pub fn spent_count(&self) -> usize {
        self.spent.len()
    }
}

impl NonceSpace for NonceTable {
    fn current_nonce(&self, account: &Address) -> Nonce {
        self.counters.get(account).copied().unwrap_or(0)
    }

    fn set_nonce(&mut self, account: Address, nonce: Nonce) {
        self.counters.insert(account, nonce);
    }

    fn is_spent(&self, account: &Address, fingerprint: &Hash) -> bool {
        self.spent.contains(&(*account, *fingerprint))
    }

    fn mark_spent(&mut self, account: Address, fingerprint: Hash) {
        self.spent.insert((account, fingerprint));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::domain::SetCycleReward;

    fn domain() -> DomainSeparator {
        DomainSeparator::new("KarmaUSD", "1", 31337, Address::new([0x11; 20]))
    }

    fn signed(keypair: &KeyPair, nonce: Nonce, deadline: Timestamp) -> (SetCycleReward, Signature) {
        let message = SetCycleReward {
            owner: keypair.address(),
            amount: 1,
            nonce,
            deadline,
        };
        let signature = keypair.sign_typed(&domain(), &message).unwrap();
        (message, signature)
    }

    #[test]
    fn test_deadline_boundary() {
        assert!(check_deadline(100, 100).is_ok());
        assert!(check_deadline(101, 100).is_ok());
        assert!(matches!(
            check_deadline(99, 100),
            Err(Error::Expired { deadline: 99, now: 100 })
        ));
    }

    #[test]
    fn test_consume_advances_only_on_match() {
        let mut table = NonceTable::new();
        let account = Address::new([7; 20]);
        let sig = Signature::from_vrs(27, [1; 32], [2; 32]);

        assert!(matches!(
            consume(&mut table, account, 1, &sig),
            Err(Error::NonceMismatch { current: 0, .. })
        ));
        assert_eq!(table.current_nonce(&account), 0);
        assert_eq!(table.spent_count(), 0);

        consume(&mut table, account, 0, &sig).unwrap();
        assert_eq!(table.current_nonce(&account), 1);
        assert!(table.is_spent(&account, &crypto::fingerprint(&sig)));
    }

    #[test]
    fn test_authorize_accepts_fresh_signature() {
        let keypair = KeyPair::generate();
        let table = NonceTable::new();
        let (message, signature) = signed(&keypair, 0, 1_000);

        authorize(&table, &domain(), &keypair.address(), &message, 0, 1_000, 500, &signature)
            .unwrap();
    }

    #[test]
    fn test_authorize_reports_replay_as_nonce_mismatch() {
        let keypair = KeyPair::generate();
        let mut table = NonceTable::new();
        let (message, signature) = signed(&keypair, 0, 1_000);
        consume(&mut table, keypair.address(), 0, &signature).unwrap();

        // the replayed instruction is rebuilt with the advanced nonce
        let replay = SetCycleReward { nonce: 1, ..message };
        let result = authorize(
            &table,
            &domain(),
            &keypair.address(),
            &replay,
            1,
            1_000,
            500,
            &signature,
        );
        assert!(matches!(result, Err(Error::NonceMismatch { current: 1, .. })));
    }

    #[test]
    fn test_authorize_checks_deadline_before_signature() {
        let keypair = KeyPair::generate();
        let table = NonceTable::new();
        let (message, _) = signed(&keypair, 0, 10);
        let garbage = Signature::from_vrs(27, [0; 32], [0; 32]);

        let result = authorize(&table, &domain(), &keypair.address(), &message, 0, 10, 11, &garbage);
        assert!(matches!(result, Err(Error::Expired { .. })));
    }

    #[test]
    fn test_authorize_rejects_foreign_signer() {
        let alice = KeyPair::generate();
        let eve = KeyPair::generate();
        let table = NonceTable::new();
        let (message, signature) = signed(&eve, 0, 1_000);
        let claimed = SetCycleReward {
            owner: alice.address(),
            ..message
        };

        let result =
            authorize(&table, &domain(), &alice.address(), &claimed, 0, 1_000, 0, &signature);
        assert!(matches!(result, Err(Error::BadSignature { .. })));
    }
}
