//! Observed source-ledger transfer events

use crate::TypesError;
use giro_primitives::{Address, H256, U256};

/// A burn event observed on a source ledger.
///
/// Immutable once observed: validators vote on the exact byte encoding of
/// this record, and disagreement opens a separate tally bucket rather than
/// mutating stored fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferEvent {
    /// Globally unique source transaction hash
    pub tx_hash: H256,
    /// Chain the funds were burned on
    pub source_chain: String,
    /// Chain the funds will be minted on
    pub dest_chain: String,
    /// Sender account in the source chain's own format
    pub sender: String,
    /// Recipient on the destination chain
    pub recipient: Address,
    /// Transfer amount in base units
    pub amount: U256,
    /// Per-source-chain monotonic nonce
    pub nonce: u64,
    /// Source block the event appeared in
    pub block_height: u64,
    /// Source block timestamp
    pub timestamp: u64,
}

impl TransferEvent {
    /// Validate the fields a vote must never carry malformed.
    ///
    /// Zero amounts are rejected here: a zero-amount transfer can never
    /// issue credit and would only occupy a vote status until expiry.
    pub fn validate(&self) -> Result<(), TypesError> {
        if self.tx_hash.is_zero() {
            return Err(TypesError::InvalidField {
                field: "tx_hash",
                reason: "zero hash".into(),
            });
        }
        if self.source_chain.is_empty() {
            return Err(TypesError::InvalidField {
                field: "source_chain",
                reason: "empty".into(),
            });
        }
        if self.dest_chain.is_empty() {
            return Err(TypesError::InvalidField {
                field: "dest_chain",
                reason: "empty".into(),
            });
        }
        if self.source_chain == self.dest_chain {
            return Err(TypesError::InvalidField {
                field: "dest_chain",
                reason: "source and destination chain are identical".into(),
            });
        }
        if self.sender.is_empty() {
            return Err(TypesError::InvalidField {
                field: "sender",
                reason: "empty".into(),
            });
        }
        if self.recipient.is_zero() {
            return Err(TypesError::InvalidField {
                field: "recipient",
                reason: "zero address".into(),
            });
        }
        if self.amount.is_zero() {
            return Err(TypesError::InvalidField {
                field: "amount",
                reason: "zero amount".into(),
            });
        }
        Ok(())
    }
}
