//! Signed transfers and relayed batches
//!
//! A relayer collects signed transfer instructions and submits them together.
//! The batch is column-oriented, matching the calldata layout relayers already
//! build; columns of different lengths are rejected before anything is checked.

use crate::{
    types::{Address, Amount, Signature, Timestamp},
    Error, Result,
};
use serde::{Deserialize, Serialize};

/// One off-line-signed transfer, as submitted by a relayer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransfer {
    /// Issuer and signer
    pub from: Address,
    /// Creditor
    pub to: Address,
    /// Amount issued to `to`
    pub amount: Amount,
    /// Amount issued to the relayer
    pub fee: Amount,
    /// Last valid ledger time
    pub deadline: Timestamp,
    /// Signature over the `Transfer` message
    pub signature: Signature,
}

/// Column-oriented batch of signed transfers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferBatch {
    /// Issuers
    pub from: Vec<Address>,
    /// Creditors
    pub to: Vec<Address>,
    /// Amounts
    pub amount: Vec<Amount>,
    /// Relayer fees
    pub fee: Vec<Amount>,
    /// Deadlines
    pub deadline: Vec<Timestamp>,
    /// Signatures
    pub signatures: Vec<Signature>,
}

impl TransferBatch {
    /// Build a batch from row-oriented transfers
    pub fn from_transfers(transfers: impl IntoIterator<Item = SignedTransfer>) -> Self {
        let mut batch = Self::default();
        for t in transfers {
            batch.from.push(t.from);
            batch.to.push(t.to);
            batch.amount.push(t.amount);
            batch.fee.push(t.fee);
            batch.deadline.push(t.deadline);
            batch.signatures.push(t.signature);
        }
        batch
    }

    /// Number of rows, if every column agrees
    pub fn len(&self) -> Result<usize> {
        let len = self.from.len();
        let columns = [
            ("to", self.to.len()),
            ("amount", self.amount.len()),
            ("fee", self.fee.len()),
            ("deadline", self.deadline.len()),
            ("signatures", self.signatures.len()),
        ];

        for (name, column_len) in columns {
            if column_len != len {
                return Err(Error::MalformedBatch(format!(
                    "column {} has {} entries, expected {}",
                    name, column_len, len
                )));
            }
        }
        Ok(len)
    }

    /// Whether the batch has no rows
    pub fn is_empty(&self) -> bool {
        self.from.is_empty()
    }

    /// Row-oriented view, rejecting mismatched columns
    pub fn transfers(&self) -> Result<Vec<SignedTransfer>> {
        let len = self.len()?;
        Ok((0..len)
            .map(|i| SignedTransfer {
                from: self.from[i],
                to: self.to[i],
                amount: self.amount[i],
                fee: self.fee[i],
                deadline: self.deadline[i],
                signature: self.signatures[i],
            })
            .collect())
    }
}
