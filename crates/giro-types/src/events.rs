//! Hub ingress transactions and egress events

use crate::{CreditDenom, NettingPair, Vote};
use giro_crypto::Signature;
use giro_primitives::{Address, H256, U256};

/// A transaction submitted to the hub.
///
/// `Vote` and `SubmitSignature` authenticate themselves through their
/// embedded signatures; the admin variants are authorized against the
/// configured admin address by the dispatcher.
#[derive(Clone, Debug)]
pub enum HubTx {
    /// A validator's attestation of a source-ledger transfer
    Vote(Vote),
    /// A validator's signature over a pending mint command's pre-image
    SubmitSignature {
        /// Command being signed
        command_id: H256,
        /// Claimed signer (checked against recovery)
        signer: Address,
        /// Signature over the §4.1 pre-image digest
        signature: Signature,
    },
    /// Admin: issue credit outside the confirmation path
    IssueCredit {
        /// Issuer bank (denom becomes `cred-{issuer}`)
        issuer: String,
        /// Holder bank
        holder: String,
        /// Amount in base units
        amount: U256,
        /// Reference transaction recorded in the audit log
        origin_tx: H256,
    },
    /// Admin: burn credit from a holder
    BurnCredit {
        /// Holder bank
        holder: String,
        /// Denomination to burn
        denom: CreditDenom,
        /// Amount in base units
        amount: U256,
        /// Reason recorded in the audit log
        reason: String,
    },
    /// Admin: run a netting cycle immediately
    TriggerNetting,
    /// Admin: register a validator
    AddValidator {
        /// Compressed SEC1 public key
        pubkey: [u8; 33],
        /// Voting power
        power: u64,
    },
    /// Admin: remove a validator from the set
    RemoveValidator {
        /// Validator address
        address: Address,
    },
    /// Admin: flip a validator's active flag
    SetValidatorActive {
        /// Validator address
        address: Address,
        /// New activity state
        active: bool,
    },
}

/// An event emitted by the hub, subscribable by relays
#[derive(Clone, Debug)]
pub enum HubEvent {
    /// A transfer reached its vote threshold
    TransferConfirmed {
        /// Confirmed transfer
        tx_hash: H256,
        /// Votes in the winning bucket
        vote_count: u32,
        /// Frozen threshold the bucket met
        threshold: u32,
    },
    /// Credit was issued to a holder
    CreditIssued {
        /// Issued denomination
        denom: CreditDenom,
        /// Issuer bank
        issuer: String,
        /// Holder bank
        holder: String,
        /// Amount in base units
        amount: U256,
        /// Originating transfer (or admin reference)
        origin_tx: H256,
    },
    /// Credit was burned from a holder
    CreditBurned {
        /// Burned denomination
        denom: CreditDenom,
        /// Holder bank
        holder: String,
        /// Amount in base units
        amount: U256,
        /// Why the burn happened (netting, admin, ...)
        reason: String,
    },
    /// A netting cycle completed
    NettingCompleted {
        /// Cycle id
        cycle_id: u64,
        /// Block the cycle ran at
        block_height: u64,
        /// Number of offset pairs
        pair_count: u32,
        /// The offset pairs
        pairs: Vec<NettingPair>,
    },
    /// A mint command collected threshold signatures
    MintCommandReady {
        /// Command id
        command_id: H256,
        /// Destination chain
        target_chain: String,
        /// Mint recipient
        recipient: Address,
        /// Mint amount
        amount: U256,
        /// Pinned validator-set version
        validator_set_version: u64,
        /// Collected 65-byte signatures
        signatures: Vec<[u8; 65]>,
    },
    /// The validator set changed
    ValidatorSetUpdated {
        /// New set version
        version: u64,
        /// New threshold
        threshold: u32,
        /// Active validator addresses
        validators: Vec<Address>,
    },
    /// An open vote status expired without reaching threshold
    ConsensusTimeout {
        /// The transfer whose status expired
        tx_hash: H256,
    },
}

impl HubEvent {
    /// Short stable name, used in logs
    pub fn name(&self) -> &'static str {
        match self {
            HubEvent::TransferConfirmed { .. } => "transfer_confirmed",
            HubEvent::CreditIssued { .. } => "credit_issued",
            HubEvent::CreditBurned { .. } => "credit_burned",
            HubEvent::NettingCompleted { .. } => "netting_completed",
            HubEvent::MintCommandReady { .. } => "mint_command_ready",
            HubEvent::ValidatorSetUpdated { .. } => "validator_set_updated",
            HubEvent::ConsensusTimeout { .. } => "consensus_timeout",
        }
    }
}
