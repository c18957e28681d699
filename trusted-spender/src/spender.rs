//! Delegated spender relay
//!
//! Users grant the relay an allowance on the ledger with a `Permit`, then sign
//! `Transfer` instructions under the relay's own domain. The relay checks those
//! against its own nonce space and spends the allowance on the user's behalf.
//!
//! # Flow
//!
//! ```text
//! user ── Permit(owner, relay, value) ──────────────▶ ledger.permit
//! user ── Transfer(from, to, amount, fee) ─▶ relay.transfer
//!                                              │ deadline, signature, relay nonce
//!                                              ▼
//!                                  ledger.delegated_transfer(spender = relay)
//!                                              │ ok
//!                                              ▼
//!                                  relay nonce consumed
//! ```

use crate::{Config, Error, Result};
use karma_ledger::{
    domain,
    replay::{self, NonceSpace, NonceTable},
    Address, Amount, DomainSeparator, Hash, LedgerHandle, Nonce, Signature, Timestamp,
};

/// Relay spending ledger allowances on signed instructions
#[derive(Debug)]
pub struct TrustedSpender {
    /// Configuration
    config: Config,

    /// Relay signing domain
    domain: DomainSeparator,

    /// Relay nonce space, independent of the ledger's
    nonce_table: NonceTable,

    /// Ledger the allowances live on
    ledger: Option<LedgerHandle>,

    /// Recipient of relay fees
    beneficiary: Option<Address>,
}

impl TrustedSpender {
    /// Create a relay with no ledger or beneficiary set
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let domain =
            DomainSeparator::new(&config.name, &config.version, config.chain_id, config.address);

        tracing::info!(
            name = %config.name,
            chain_id = config.chain_id,
            address = %config.address,
            admin = %config.admin,
            "Spender relay created"
        );

        Ok(Self {
            config,
            domain,
            nonce_table: NonceTable::new(),
            ledger: None,
            beneficiary: None,
        })
    }

    fn ensure_admin(&self, caller: &Address) -> Result<()> {
        if *caller != self.config.admin {
            tracing::warn!(caller = %caller, "Rejected administrative call");
            return Err(Error::Unauthorized { caller: *caller });
        }
        Ok(())
    }

    /// Point the relay at a ledger
    pub fn set_ledger_reference(&mut self, caller: Address, ledger: LedgerHandle) -> Result<()> {
        self.ensure_admin(&caller)?;
        tracing::info!(ledger = %ledger.address(), "Ledger reference set");
        self.ledger = Some(ledger);
        Ok(())
    }

    /// Set the recipient of relay fees
    pub fn set_beneficiary(&mut self, caller: Address, beneficiary: Address) -> Result<()> {
        self.ensure_admin(&caller)?;
        tracing::info!(beneficiary = %beneficiary, "Beneficiary set");
        self.beneficiary = Some(beneficiary);
        Ok(())
    }

    /// Spend `amount + fee` of the allowance `from` granted this relay
    ///
    /// The ledger stays locked from the deadline check until the relay nonce
    /// is consumed. The relay nonce only advances if the ledger accepted the
    /// spend.
    pub fn transfer(
        &mut self,
        from: Address,
        to: Address,
        amount: Amount,
        fee: Amount,
        deadline: Timestamp,
        signature: Signature,
    ) -> Result<()> {
        let handle = self.ledger.clone().ok_or(Error::LedgerNotConfigured)?;
        let beneficiary = match self.beneficiary {
            Some(beneficiary) => beneficiary,
            None if fee == 0 => Address::ZERO,
            None => return Err(Error::BeneficiaryNotConfigured),
        };

        let mut ledger = handle.lock();
        let nonce = self.nonce_table.current_nonce(&from);
        let message = domain::Transfer {
            from,
            to,
            amount,
            fee,
            nonce,
            deadline,
        };

        replay::authorize(
            &self.nonce_table,
            &self.domain,
            &from,
            &message,
            nonce,
            deadline,
            ledger.now(),
            &signature,
        )
        .map_err(|e| {
            tracing::warn!(from = %from, error = %e, "Relay transfer rejected");
            e
        })?;

        // consume must not fail once the ledger has committed the spend
        nonce
            .checked_add(1)
            .ok_or(karma_ledger::Error::Overflow("relay nonce counter"))?;

        ledger.delegated_transfer(self.config.address, from, to, amount, fee, beneficiary)?;
        replay::consume(&mut self.nonce_table, from, nonce, &signature)?;

        tracing::debug!(
            from = %from,
            to = %to,
            amount = %amount,
            fee = %fee,
            nonce,
            "Relay transfer committed"
        );
        Ok(())
    }

    /// Relay nonce `account` must sign its next transfer with
    pub fn nonces(&self, account: &Address) -> Nonce {
        self.nonce_table.current_nonce(account)
    }

    /// `hashStruct` of the relay's signing domain
    pub fn domain_separator(&self) -> Hash {
        self.domain.hash()
    }

    /// Relay signing domain
    pub fn domain(&self) -> &DomainSeparator {
        &self.domain
    }

    /// Address of this relay
    pub fn address(&self) -> Address {
        self.config.address
    }

    /// Configured ledger
    pub fn ledger(&self) -> Option<&LedgerHandle> {
        self.ledger.as_ref()
    }

    /// Configured fee recipient
    pub fn beneficiary(&self) -> Option<Address> {
        self.beneficiary
    }
}
