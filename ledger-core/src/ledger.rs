//! Main ledger orchestration layer
//!
//! Every mutation is an [`Operation`]. [`Ledger::execute`] runs it inside a
//! [`Transaction`]: all checks and writes go to the transactional view, and the
//! view is committed in one step only if the whole operation succeeded.
//!
//! Transfers reach the shared issuance primitive through one of three
//! authorities: the debtor calling directly, the debtor's off-line signature
//! relayed by anyone, or an allowance the debtor granted a spender.
//!
//! # Example
//!
//! ```
//! use karma_ledger::{Address, Config, Ledger};
//!
//! # fn main() -> karma_ledger::Result<()> {
//! let mut ledger = Ledger::new(Config::default())?;
//! let alice = Address::new([0xa1; 20]);
//! let bob = Address::new([0xb0; 20]);
//!
//! ledger.transfer(alice, bob, 50)?;
//! assert_eq!(ledger.balance_of(&alice), 50);
//! assert_eq!(ledger.debt_of(&alice, &bob), 50);
//! # Ok(())
//! # }
//! ```

use crate::{
    batch::{SignedTransfer, TransferBatch},
    clock::{Clock, SystemClock},
    domain::{self, DomainSeparator},
    metrics::Metrics,
    netting::{Cycle, CycleNetting, CycleSettlement},
    replay::{self, NonceSpace},
    snapshot::LedgerSnapshot,
    state::{State, Transaction},
    types::{Address, Amount, LedgerEvent, Nonce, Signature, Timestamp},
    Config, Error, Result,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A state transition request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Caller issues debt to `to`
    Transfer {
        /// Submitting account, the issuer
        caller: Address,
        /// Creditor
        to: Address,
        /// Amount
        amount: Amount,
    },

    /// Caller sets its own cycle reward
    SetCycleReward {
        /// Submitting account
        caller: Address,
        /// New reward
        amount: Amount,
    },

    /// Caller replaces the allowance of `spender`
    Approve {
        /// Submitting account, the owner
        caller: Address,
        /// Spender
        spender: Address,
        /// New ceiling
        value: Amount,
    },

    /// Caller spends an allowance granted by `from`
    TransferFrom {
        /// Submitting account, the spender
        caller: Address,
        /// Issuer
        from: Address,
        /// Creditor
        to: Address,
        /// Amount
        amount: Amount,
    },

    /// Relayed signed transfer
    MetaTransfer {
        /// Signed instruction
        transfer: SignedTransfer,
        /// Relayer credited with the fee
        miner: Address,
    },

    /// Relayed signed cycle-reward update
    MetaSetCycleReward {
        /// Signer
        owner: Address,
        /// New reward
        amount: Amount,
        /// Last valid ledger time
        deadline: Timestamp,
        /// Signature over `SetCycleReward`
        signature: Signature,
    },

    /// Relayed batch of signed transfers, all or nothing
    MetaTransferBatch {
        /// Column-oriented instructions
        batch: TransferBatch,
        /// Relayer credited with every fee
        miner: Address,
    },

    /// Relayed signed allowance grant
    Permit {
        /// Signer
        owner: Address,
        /// Spender
        spender: Address,
        /// New ceiling
        value: Amount,
        /// Last valid ledger time
        deadline: Timestamp,
        /// Signature over `Permit`
        signature: Signature,
    },

    /// Net a cycle of debt
    MineCycle {
        /// Submitting beneficiary
        miner: Address,
        /// Cycle participants in order
        accounts: Vec<Address>,
    },

    /// Spend an allowance on the issuer's behalf, paying a fee to `beneficiary`
    DelegatedTransfer {
        /// Account holding the allowance
        spender: Address,
        /// Issuer
        from: Address,
        /// Creditor
        to: Address,
        /// Amount
        amount: Amount,
        /// Fee
        fee: Amount,
        /// Fee recipient
        beneficiary: Address,
    },
}

impl Operation {
    /// Stable label for metrics and logs
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Transfer { .. } => "transfer",
            Operation::SetCycleReward { .. } => "set_cycle_reward",
            Operation::Approve { .. } => "approve",
            Operation::TransferFrom { .. } => "transfer_from",
            Operation::MetaTransfer { .. } => "meta_transfer",
            Operation::MetaSetCycleReward { .. } => "meta_set_cycle_reward",
            Operation::MetaTransferBatch { .. } => "meta_transfer_batch",
            Operation::Permit { .. } => "permit",
            Operation::MineCycle { .. } => "mine_cycle",
            Operation::DelegatedTransfer { .. } => "delegated_transfer",
        }
    }
}

/// Who vouches for a debit of the issuer
#[derive(Debug, Clone, Copy)]
pub enum Authority<'a> {
    /// The issuer submitted the operation itself
    Caller,

    /// The issuer signed an off-line `Transfer` instruction
    Signed {
        /// Last valid ledger time
        deadline: Timestamp,
        /// Issuer's signature
        signature: &'a Signature,
    },

    /// A spender uses an allowance the issuer granted
    Allowance {
        /// Account holding the allowance
        spender: Address,
    },
}

/// Amounts a single transfer issues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOrder {
    /// Issuer
    pub from: Address,
    /// Creditor
    pub to: Address,
    /// Amount issued to `to`
    pub amount: Amount,
    /// Amount issued to `fee_recipient`
    pub fee: Amount,
    /// Relayer or beneficiary
    pub fee_recipient: Address,
}

impl TransferOrder {
    /// Transfer without a fee
    pub fn direct(from: Address, to: Address, amount: Amount) -> Self {
        Self {
            from,
            to,
            amount,
            fee: 0,
            fee_recipient: Address::ZERO,
        }
    }
}

/// Immutable inputs of one execution
struct Context<'a> {
    domain: &'a DomainSeparator,
    netting: &'a CycleNetting,
    now: Timestamp,
}

/// Authorize and issue one transfer
fn issue_transfer(
    ctx: &Context<'_>,
    tx: &mut Transaction<'_>,
    authority: Authority<'_>,
    order: &TransferOrder,
) -> Result<()> {
    match authority {
        Authority::Caller => {}
        Authority::Signed {
            deadline,
            signature,
        } => {
            let nonce = tx.current_nonce(&order.from);
            let message = domain::Transfer {
                from: order.from,
                to: order.to,
                amount: order.amount,
                fee: order.fee,
                nonce,
                deadline,
            };
            replay::authorize(
                &*tx, ctx.domain, &order.from, &message, nonce, deadline, ctx.now, signature,
            )?;
            replay::consume(&mut *tx, order.from, nonce, signature)?;
        }
        Authority::Allowance { spender } => {
            let total = order
                .amount
                .checked_add(order.fee)
                .ok_or(Error::Overflow("amount plus fee"))?;
            tx.spend_allowance(order.from, spender, total)?;
        }
    }

    tx.issue(order.from, order.to, order.amount)?;
    if order.fee > 0 {
        tx.issue(order.from, order.fee_recipient, order.fee)?;
    }
    Ok(())
}

/// Run one operation against the transaction
fn apply(
    ctx: &Context<'_>,
    tx: &mut Transaction<'_>,
    operation: &Operation,
) -> Result<Option<CycleSettlement>> {
    match operation {
        Operation::Transfer { caller, to, amount } => {
            let order = TransferOrder::direct(*caller, *to, *amount);
            issue_transfer(ctx, tx, Authority::Caller, &order)?;
        }

        Operation::SetCycleReward { caller, amount } => {
            tx.set_cycle_reward(*caller, *amount);
        }

        Operation::Approve {
            caller,
            spender,
            value,
        } => {
            tx.set_allowance(*caller, *spender, *value);
        }

        Operation::TransferFrom {
            caller,
            from,
            to,
            amount,
        } => {
            let order = TransferOrder::direct(*from, *to, *amount);
            issue_transfer(ctx, tx, Authority::Allowance { spender: *caller }, &order)?;
        }

        Operation::MetaTransfer { transfer, miner } => {
            apply_signed_transfer(ctx, tx, transfer, *miner)?;
        }

        Operation::MetaSetCycleReward {
            owner,
            amount,
            deadline,
            signature,
        } => {
            let nonce = tx.current_nonce(owner);
            let message = domain::SetCycleReward {
                owner: *owner,
                amount: *amount,
                nonce,
                deadline: *deadline,
            };
            replay::authorize(&*tx, ctx.domain, owner, &message, nonce, *deadline, ctx.now, signature)?;
            replay::consume(&mut *tx, *owner, nonce, signature)?;
            tx.set_cycle_reward(*owner, *amount);
        }

        Operation::MetaTransferBatch { batch, miner } => {
            let transfers = batch.transfers()?;
            for (index, transfer) in transfers.iter().enumerate() {
                apply_signed_transfer(ctx, tx, transfer, *miner).map_err(|e| {
                    tracing::debug!(index, from = %transfer.from, error = %e, "Batch element rejected");
                    e
                })?;
            }
        }

        Operation::Permit {
            owner,
            spender,
            value,
            deadline,
            signature,
        } => {
            let nonce = tx.current_nonce(owner);
            let message = domain::Permit {
                owner: *owner,
                spender: *spender,
                value: *value,
                nonce,
                deadline: *deadline,
            };
            replay::authorize(&*tx, ctx.domain, owner, &message, nonce, *deadline, ctx.now, signature)?;
            replay::consume(&mut *tx, *owner, nonce, signature)?;
            tx.set_allowance(*owner, *spender, *value);
        }

        Operation::MineCycle { miner, accounts } => {
            let settlement = ctx.netting.settle(tx, *miner, accounts)?;
            tracing::info!(
                miner = %miner,
                participants = accounts.len(),
                net_amount = %settlement.net_amount,
                rewards = %settlement.rewards_issued,
                "Cycle mined"
            );
            return Ok(Some(settlement));
        }

        Operation::DelegatedTransfer {
            spender,
            from,
            to,
            amount,
            fee,
            beneficiary,
        } => {
            let order = TransferOrder {
                from: *from,
                to: *to,
                amount: *amount,
                fee: *fee,
                fee_recipient: *beneficiary,
            };
            issue_transfer(ctx, tx, Authority::Allowance { spender: *spender }, &order)?;
        }
    }

    Ok(None)
}

fn apply_signed_transfer(
    ctx: &Context<'_>,
    tx: &mut Transaction<'_>,
    transfer: &SignedTransfer,
    miner: Address,
) -> Result<()> {
    let order = TransferOrder {
        from: transfer.from,
        to: transfer.to,
        amount: transfer.amount,
        fee: transfer.fee,
        fee_recipient: miner,
    };
    let authority = Authority::Signed {
        deadline: transfer.deadline,
        signature: &transfer.signature,
    };
    issue_transfer(ctx, tx, authority, &order)
}

/// Mutual-credit ledger
#[derive(Debug)]
pub struct Ledger {
    /// Committed state
    state: State,

    /// Signing domain bound to this instance
    domain: DomainSeparator,

    /// Netting engine
    netting: CycleNetting,

    /// Source of ledger time
    clock: Arc<dyn Clock>,

    /// Metrics
    metrics: Metrics,

    /// Events of committed operations
    journal: Vec<LedgerEvent>,

    /// Configuration
    config: Config,
}

impl Ledger {
    /// Open an empty ledger on the wall clock
    pub fn new(config: Config) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Open an empty ledger on the given clock
    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::from_state(config, clock, State::default())
    }

    /// Reopen a ledger from a snapshot
    pub fn restore(config: Config, clock: Arc<dyn Clock>, snapshot: LedgerSnapshot) -> Result<Self> {
        let state = snapshot.into_state()?;
        Self::from_state(config, clock, state)
    }

    fn from_state(config: Config, clock: Arc<dyn Clock>, state: State) -> Result<Self> {
        config.validate()?;

        let domain =
            DomainSeparator::new(&config.name, &config.version, config.chain_id, config.address);
        let netting = CycleNetting::new(config.netting.max_cycle_length)
            .with_balance_reduction(config.netting.reduce_balances);
        let metrics = Metrics::new(&config.metrics.namespace)?;

        tracing::info!(
            name = %config.name,
            chain_id = config.chain_id,
            address = %config.address,
            accounts = state.account_count(),
            "Ledger opened"
        );

        Ok(Self {
            state,
            domain,
            netting,
            clock,
            metrics,
            journal: Vec::new(),
            config,
        })
    }

    /// Apply an operation atomically
    ///
    /// Either every effect of the operation is committed, or the operation
    /// fails and the ledger is exactly as it was.
    pub fn execute(&mut self, operation: Operation) -> Result<()> {
        let name = operation.name();
        let ctx = Context {
            domain: &self.domain,
            netting: &self.netting,
            now: self.clock.now(),
        };

        let outcome = {
            let mut tx = Transaction::new(&self.state);
            apply(&ctx, &mut tx, &operation).map(|settlement| (settlement, tx.into_delta()))
        };

        match outcome {
            Ok((settlement, mut delta)) => {
                let events = delta.take_events();
                self.state.apply(delta);

                if let Some(settlement) = settlement {
                    self.metrics.cycles_mined.inc();
                    self.metrics.netted_amount.inc_by(settlement.net_amount as f64);
                }
                self.metrics.record_commit(name);

                tracing::debug!(operation = name, events = events.len(), "Operation committed");
                self.journal.extend(events);
                Ok(())
            }
            Err(e) => {
                self.metrics.record_rejection(name, e.kind());
                tracing::warn!(operation = name, error = %e, "Operation rejected");
                Err(e)
            }
        }
    }

    // Direct operations

    /// Issue `amount` of debt from `caller` to `to`
    pub fn transfer(&mut self, caller: Address, to: Address, amount: Amount) -> Result<()> {
        self.execute(Operation::Transfer { caller, to, amount })
    }

    /// Set the caller's cycle reward
    pub fn set_cycle_reward(&mut self, caller: Address, amount: Amount) -> Result<()> {
        self.execute(Operation::SetCycleReward { caller, amount })
    }

    /// Replace the allowance the caller grants `spender`
    pub fn approve(&mut self, caller: Address, spender: Address, value: Amount) -> Result<()> {
        self.execute(Operation::Approve {
            caller,
            spender,
            value,
        })
    }

    /// Spend an allowance `from` granted the caller
    pub fn transfer_from(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<()> {
        self.execute(Operation::TransferFrom {
            caller,
            from,
            to,
            amount,
        })
    }

    // Signature-authorized operations

    /// Relay a signed transfer; the fee is issued to `miner`
    pub fn meta_transfer(&mut self, transfer: SignedTransfer, miner: Address) -> Result<()> {
        self.execute(Operation::MetaTransfer { transfer, miner })
    }

    /// Relay a signed cycle-reward update
    pub fn meta_set_cycle_reward(
        &mut self,
        owner: Address,
        amount: Amount,
        deadline: Timestamp,
        signature: Signature,
    ) -> Result<()> {
        self.execute(Operation::MetaSetCycleReward {
            owner,
            amount,
            deadline,
            signature,
        })
    }

    /// Relay a batch of signed transfers, all or nothing
    pub fn meta_transfer_batch(&mut self, batch: TransferBatch, miner: Address) -> Result<()> {
        self.execute(Operation::MetaTransferBatch { batch, miner })
    }

    /// Relay a signed allowance grant
    pub fn permit(
        &mut self,
        owner: Address,
        spender: Address,
        value: Amount,
        deadline: Timestamp,
        signature: Signature,
    ) -> Result<()> {
        self.execute(Operation::Permit {
            owner,
            spender,
            value,
            deadline,
            signature,
        })
    }

    /// Net the debt cycle `accounts[0] -> accounts[1] -> ... -> accounts[0]`
    pub fn mine_cycle(&mut self, miner: Address, accounts: Vec<Address>) -> Result<()> {
        self.execute(Operation::MineCycle { miner, accounts })
    }

    /// Spend `amount + fee` of the allowance `from` granted `spender`
    pub fn delegated_transfer(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: Amount,
        fee: Amount,
        beneficiary: Address,
    ) -> Result<()> {
        self.execute(Operation::DelegatedTransfer {
            spender,
            from,
            to,
            amount,
            fee,
            beneficiary,
        })
    }

    // Reads

    /// Outstanding issued debt plus netting rewards
    pub fn balance_of(&self, account: &Address) -> Amount {
        self.state.account(account).balance
    }

    /// Debt `debtor` owes `creditor`
    pub fn debt_of(&self, debtor: &Address, creditor: &Address) -> Amount {
        self.state.debt(debtor, creditor)
    }

    /// Configured cycle reward
    pub fn cycle_reward_of(&self, account: &Address) -> Amount {
        self.state.account(account).cycle_reward
    }

    /// Nonce the account must sign its next instruction with
    pub fn nonces(&self, account: &Address) -> Nonce {
        self.state.account(account).nonce
    }

    /// Remaining allowance
    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.state.allowance(owner, spender)
    }

    /// Sum of all balances, saturating at `Amount::MAX`
    pub fn total_supply(&self) -> Amount {
        self.state.total_supply()
    }

    /// Validate a cycle without netting it
    pub fn preview_cycle(&self, accounts: &[Address]) -> Result<Cycle> {
        let tx = Transaction::new(&self.state);
        self.netting.find_cycle(&tx, accounts)
    }

    /// Token name
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Token symbol
    pub fn symbol(&self) -> &str {
        &self.config.symbol
    }

    /// Display decimals
    pub fn decimals(&self) -> u8 {
        self.config.decimals
    }

    /// Address of this ledger instance
    pub fn address(&self) -> Address {
        self.config.address
    }

    /// Signing domain
    pub fn domain(&self) -> &DomainSeparator {
        &self.domain
    }

    /// `hashStruct` of the signing domain
    pub fn domain_separator(&self) -> [u8; 32] {
        self.domain.hash()
    }

    /// Current ledger time
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Events of committed operations, oldest first
    pub fn events(&self) -> &[LedgerEvent] {
        &self.journal
    }

    /// Drain the event journal
    pub fn take_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.journal)
    }

    /// Metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Serializable copy of the committed state
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot::from_state(&self.state)
    }

    /// Check that no account owes more than its balance
    pub fn check_invariants(&self) -> Result<()> {
        self.state.check_invariants()
    }
}
