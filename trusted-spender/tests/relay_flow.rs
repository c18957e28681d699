//! Permit-then-relay flows against a live ledger

use karma_ledger::{
    domain, Address, Amount, KeyPair, Ledger, LedgerHandle, ManualClock, Signature, Timestamp,
};
use std::sync::Arc;
use trusted_spender::{Config, Error, TrustedSpender};

const NOW: Timestamp = 1_700_000_000;
const ONE_DAY: Timestamp = 24 * 60 * 60;

struct Fixture {
    ledger: LedgerHandle,
    spender: TrustedSpender,
    clock: Arc<ManualClock>,
    admin: Address,
    alice: KeyPair,
    bob: Address,
}

fn fixture() -> Fixture {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("karma_ledger=debug,trusted_spender=debug")
        .with_test_writer()
        .try_init();

    let clock = Arc::new(ManualClock::new(NOW));
    let ledger = LedgerHandle::new(
        Ledger::with_clock(karma_ledger::Config::default(), clock.clone()).unwrap(),
    );

    let admin = Address::new([0xad; 20]);
    let mut spender = TrustedSpender::new(Config {
        admin,
        ..Config::default()
    })
    .unwrap();
    spender.set_ledger_reference(admin, ledger.clone()).unwrap();

    Fixture {
        ledger,
        spender,
        clock,
        admin,
        alice: KeyPair::from_secret(&[0x11; 32]).unwrap(),
        bob: Address::new([0xb0; 20]),
    }
}

/// Owner grants the relay an allowance, signed under the ledger's domain
fn permit(f: &Fixture, value: Amount) {
    let mut ledger = f.ledger.lock();
    let deadline = NOW + ONE_DAY;
    let message = domain::Permit {
        owner: f.alice.address(),
        spender: f.spender.address(),
        value,
        nonce: ledger.nonces(&f.alice.address()),
        deadline,
    };
    let signature = f.alice.sign_typed(ledger.domain(), &message).unwrap();
    ledger
        .permit(f.alice.address(), f.spender.address(), value, deadline, signature)
        .unwrap();
}

/// Transfer instruction signed under the relay's domain
fn sign_relay_transfer(f: &Fixture, amount: Amount, fee: Amount, deadline: Timestamp) -> Signature {
    let message = domain::Transfer {
        from: f.alice.address(),
        to: f.bob,
        amount,
        fee,
        nonce: f.spender.nonces(&f.alice.address()),
        deadline,
    };
    f.alice.sign_typed(f.spender.domain(), &message).unwrap()
}

#[test]
fn test_permit_then_relay_transfer() {
    let mut f = fixture();
    permit(&f, 50);
    assert_eq!(f.ledger.allowance(&f.alice.address(), &f.spender.address()), 50);

    let deadline = NOW + ONE_DAY;
    let signature = sign_relay_transfer(&f, 40, 0, deadline);
    f.spender
        .transfer(f.alice.address(), f.bob, 40, 0, deadline, signature)
        .unwrap();

    assert_eq!(f.ledger.balance_of(&f.alice.address()), 40);
    assert_eq!(f.ledger.debt_of(&f.alice.address(), &f.bob), 40);
    assert_eq!(f.ledger.allowance(&f.alice.address(), &f.spender.address()), 10);
    assert_eq!(f.spender.nonces(&f.alice.address()), 1);
    assert_eq!(f.ledger.balance_of(&f.spender.address()), 0);
}

#[test]
fn test_relay_fee_goes_to_beneficiary() {
    let mut f = fixture();
    let miner = Address::new([0x99; 20]);
    f.spender.set_beneficiary(f.admin, miner).unwrap();
    permit(&f, 50);

    let deadline = NOW + ONE_DAY;
    let signature = sign_relay_transfer(&f, 40, 5, deadline);
    f.spender
        .transfer(f.alice.address(), f.bob, 40, 5, deadline, signature)
        .unwrap();

    assert_eq!(f.ledger.balance_of(&f.alice.address()), 45);
    assert_eq!(f.ledger.debt_of(&f.alice.address(), &miner), 5);
    assert_eq!(f.ledger.allowance(&f.alice.address(), &f.spender.address()), 5);
}

#[test]
fn test_ledger_rejection_keeps_relay_nonce() {
    let mut f = fixture();
    permit(&f, 30);

    let deadline = NOW + ONE_DAY;
    let signature = sign_relay_transfer(&f, 40, 0, deadline);
    let err = f
        .spender
        .transfer(f.alice.address(), f.bob, 40, 0, deadline, signature)
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Ledger(karma_ledger::Error::InsufficientAllowance { .. })
    ));
    assert_eq!(f.spender.nonces(&f.alice.address()), 0);
    assert_eq!(f.ledger.balance_of(&f.alice.address()), 0);

    // the same instruction goes through once the allowance is raised
    permit(&f, 40);
    f.spender
        .transfer(f.alice.address(), f.bob, 40, 0, deadline, signature)
        .unwrap();
    assert_eq!(f.spender.nonces(&f.alice.address()), 1);
}

#[test]
fn test_permit_replaces_rather_than_adds() {
    let mut f = fixture();
    permit(&f, 50);
    permit(&f, 10);

    let deadline = NOW + ONE_DAY;
    let signature = sign_relay_transfer(&f, 40, 0, deadline);
    let err = f
        .spender
        .transfer(f.alice.address(), f.bob, 40, 0, deadline, signature)
        .unwrap_err();
    assert_eq!(err.kind(), "insufficient_allowance");
}

#[test]
fn test_relay_replay_is_nonce_mismatch() {
    let mut f = fixture();
    permit(&f, 100);

    let deadline = NOW + ONE_DAY;
    let signature = sign_relay_transfer(&f, 10, 0, deadline);
    f.spender
        .transfer(f.alice.address(), f.bob, 10, 0, deadline, signature)
        .unwrap();

    let err = f
        .spender
        .transfer(f.alice.address(), f.bob, 10, 0, deadline, signature)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Ledger(karma_ledger::Error::NonceMismatch { current: 1, .. })
    ));
    assert_eq!(f.ledger.balance_of(&f.alice.address()), 10);
}

#[test]
fn test_ledger_domain_signature_is_rejected_by_relay() {
    let mut f = fixture();
    permit(&f, 100);

    let deadline = NOW + ONE_DAY;
    let message = domain::Transfer {
        from: f.alice.address(),
        to: f.bob,
        amount: 10,
        fee: 0,
        nonce: 0,
        deadline,
    };
    let signature = {
        let ledger = f.ledger.lock();
        f.alice.sign_typed(ledger.domain(), &message).unwrap()
    };

    let err = f
        .spender
        .transfer(f.alice.address(), f.bob, 10, 0, deadline, signature)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Ledger(karma_ledger::Error::BadSignature { .. })
    ));
}

#[test]
fn test_expired_relay_instruction() {
    let mut f = fixture();
    permit(&f, 100);

    let deadline = NOW + 30;
    let signature = sign_relay_transfer(&f, 10, 0, deadline);
    f.clock.advance(31);

    let err = f
        .spender
        .transfer(f.alice.address(), f.bob, 10, 0, deadline, signature)
        .unwrap_err();
    assert_eq!(err.kind(), "expired");
    assert_eq!(f.spender.nonces(&f.alice.address()), 0);
    assert_eq!(f.ledger.allowance(&f.alice.address(), &f.spender.address()), 100);
}
