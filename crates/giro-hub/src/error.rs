//! Unified hub errors with stable observability codes

use giro_ledger::LedgerError;
use giro_multisig::MultisigError;
use giro_oracle::OracleError;
use giro_primitives::Address;
use giro_store::StorageError;
use thiserror::Error;

/// Any failure a hub submission can surface
#[derive(Debug, Error)]
pub enum HubError {
    /// The sender is not authorized for an admin transaction
    #[error("unauthorized: {0} is not the hub admin")]
    Unauthorized(Address),

    /// An operation requiring an open block ran outside one
    #[error("no block in progress")]
    NotInBlock,

    /// Oracle failure
    #[error(transparent)]
    Oracle(#[from] OracleError),

    /// Ledger failure
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Multisig failure
    #[error(transparent)]
    Multisig(#[from] MultisigError),

    /// Storage failure
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl HubError {
    /// Stable error code for observability and relay classification.
    ///
    /// These strings are part of the external contract; new variants may
    /// be added but existing codes never change.
    pub fn code(&self) -> &'static str {
        match self {
            HubError::Unauthorized(_) => "unauthorized",
            HubError::NotInBlock => "internal",
            HubError::Oracle(e) => match e {
                OracleError::NotValidator(_) => "unauthorized",
                OracleError::DuplicateVote { .. } => "duplicate_vote",
                OracleError::AlreadyConfirmed(_) => "duplicate_vote",
                OracleError::InvalidSignature(_) => "invalid_signature",
                OracleError::InvalidEvent(_) => "invalid_input",
                OracleError::NoValidatorSet => "invalid_input",
                OracleError::Storage(_) => "internal",
            },
            HubError::Ledger(e) => match e {
                LedgerError::InvalidAmount(_) => "invalid_input",
                LedgerError::InvalidCreditToken(_) => "invalid_credit_token",
                LedgerError::NotTransferable(_) => "invalid_credit_token",
                LedgerError::InsufficientBalance { .. } => "insufficient_balance",
                LedgerError::NettingInProgress => "netting_in_progress",
                LedgerError::InvariantViolated(_) => "netting_rollback",
                LedgerError::Storage(_) => "internal",
            },
            HubError::Multisig(e) => match e {
                MultisigError::UnknownCommand(_) => "invalid_input",
                MultisigError::CommandNotPending { .. } => "invalid_input",
                MultisigError::InvalidSignature(_) => "invalid_signature",
                MultisigError::DuplicateSignature(_) => "invalid_signature",
                MultisigError::SignerNotInValidatorSet { .. } => "signer_not_in_validator_set",
                MultisigError::ValidatorSetVersionMismatch(_) => "validator_set_version_mismatch",
                MultisigError::ValidatorExists(_) => "invalid_input",
                MultisigError::UnknownValidator(_) => "invalid_input",
                MultisigError::TooFewValidators { .. } => "invalid_input",
                MultisigError::InvalidPublicKey(_) => "invalid_input",
                MultisigError::NoValidatorSet => "invalid_input",
                MultisigError::Storage(_) => "internal",
            },
            HubError::Storage(_) => "internal",
        }
    }
}

/// Result type for hub operations
pub type HubResult<T> = Result<T, HubError>;
