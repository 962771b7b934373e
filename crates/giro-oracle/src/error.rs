//! Oracle errors

use giro_primitives::{Address, H256};
use thiserror::Error;

/// Vote admission and tally errors
#[derive(Debug, Error)]
pub enum OracleError {
    /// The voter is not an active validator
    #[error("unauthorized: {0} is not an active validator")]
    NotValidator(Address),

    /// The `(tx_hash, validator)` pair has already voted
    #[error("duplicate vote on {tx_hash} by {validator}")]
    DuplicateVote {
        /// Transfer voted on
        tx_hash: H256,
        /// Repeating validator
        validator: Address,
    },

    /// The transfer is already confirmed; late votes are rejected
    #[error("transfer {0} is already confirmed")]
    AlreadyConfirmed(H256),

    /// The vote signature does not recover to the voting validator
    #[error("invalid vote signature: {0}")]
    InvalidSignature(String),

    /// The event body failed validation
    #[error("invalid event: {0}")]
    InvalidEvent(#[from] giro_types::TypesError),

    /// No validator set has been installed
    #[error("no validator set installed")]
    NoValidatorSet,

    /// Storage failure
    #[error(transparent)]
    Storage(#[from] giro_store::StorageError),
}

/// Result type for oracle operations
pub type OracleResult<T> = Result<T, OracleError>;
