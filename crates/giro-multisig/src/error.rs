//! Multisig errors

use giro_primitives::{Address, H256};
use thiserror::Error;

/// Command assembly and validator-set errors
#[derive(Debug, Error)]
pub enum MultisigError {
    /// No command stored under the id
    #[error("unknown command: {0}")]
    UnknownCommand(H256),

    /// The command is no longer collecting signatures
    #[error("command {command_id} is not pending (status {status})")]
    CommandNotPending {
        /// Command id
        command_id: H256,
        /// Current status string
        status: &'static str,
    },

    /// The signature does not recover to the claimed signer
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// The recovered signer is not active in the pinned validator set
    #[error("signer {signer} not in validator set version {version}")]
    SignerNotInValidatorSet {
        /// Recovered signer
        signer: Address,
        /// Pinned set version
        version: u64,
    },

    /// The pinned validator-set version is not retained in state
    #[error("validator set version {0} not found")]
    ValidatorSetVersionMismatch(u64),

    /// The signer already contributed a signature
    #[error("duplicate signature from {0}")]
    DuplicateSignature(Address),

    /// A validator with this address is already registered
    #[error("validator {0} already registered")]
    ValidatorExists(Address),

    /// No validator registered under the address
    #[error("unknown validator: {0}")]
    UnknownValidator(Address),

    /// The change would shrink the active set below the minimum
    #[error("active validator count would drop below {min}")]
    TooFewValidators {
        /// Configured minimum
        min: usize,
    },

    /// Bad key material in a registration
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// No validator set has been installed
    #[error("no validator set installed")]
    NoValidatorSet,

    /// Storage failure
    #[error(transparent)]
    Storage(#[from] giro_store::StorageError),
}

/// Result type for multisig operations
pub type MultisigResult<T> = Result<T, MultisigError>;
