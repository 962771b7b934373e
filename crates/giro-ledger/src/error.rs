//! Ledger and netting errors

use giro_primitives::U256;
use thiserror::Error;

/// Credit ledger and netting errors
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Zero or otherwise unusable amount
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Issuance to the issuer itself, or a malformed denomination
    #[error("invalid credit token: {0}")]
    InvalidCreditToken(String),

    /// Credit tokens move only through issue, burn, and netting
    #[error("credit tokens are not transferable: {0}")]
    NotTransferable(String),

    /// Burn exceeding the holder's balance
    #[error("insufficient balance: {holder} holds {have} {denom}, needs {need}")]
    InsufficientBalance {
        /// Holder bank
        holder: String,
        /// Denomination
        denom: String,
        /// Current balance
        have: U256,
        /// Requested burn
        need: U256,
    },

    /// A netting cycle is already running
    #[error("netting cycle already in progress")]
    NettingInProgress,

    /// Bookkeeping does not add up (outstanding below burn amount)
    #[error("ledger invariant violated: {0}")]
    InvariantViolated(String),

    /// Storage failure
    #[error(transparent)]
    Storage(#[from] giro_store::StorageError),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
