//! Mint commands and their signature sets

use giro_crypto::Signature;
use giro_primitives::{Address, H256, U256};

/// Lifecycle of a mint command
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandStatus {
    /// Created, collecting signatures
    Pending,
    /// Threshold signatures collected, ready for relay
    Signed,
    /// Executed on the destination ledger
    Executed,
    /// Permanently failed (execution error or signing timeout)
    Failed,
}

impl CommandStatus {
    /// Stable string form used in audit entries and storage
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandStatus::Pending => "pending",
            CommandStatus::Signed => "signed",
            CommandStatus::Executed => "executed",
            CommandStatus::Failed => "failed",
        }
    }
}

/// A threshold-signed mint authorization for a destination ledger.
///
/// `command_id` is deterministic over the confirmed transfer, so replaying
/// the confirmation reproduces the same id and the destination's
/// processed-commands set makes execution idempotent end to end.
#[derive(Clone, Debug)]
pub struct MintCommand {
    /// Deterministic id: `keccak256(tx_hash ‖ target_chain ‖ recipient ‖ amount ‖ nonce)`
    pub command_id: H256,
    /// Confirmed source transfer this command settles
    pub source_tx: H256,
    /// Destination chain identifier
    pub target_chain: String,
    /// Mint recipient on the destination chain
    pub recipient: Address,
    /// Mint amount in base units
    pub amount: U256,
    /// Source transfer nonce, folded into the id for replay defense
    pub nonce: u64,
    /// Validator-set version signatures are validated against
    pub validator_set_version: u64,
    /// Collected signatures, deduplicated by signer
    pub signatures: Vec<(Address, Signature)>,
    /// Hub block height the command was created at
    pub created_at: u64,
    /// Current lifecycle state
    pub status: CommandStatus,
}

impl MintCommand {
    /// Whether the given signer has already contributed a signature
    pub fn has_signed(&self, signer: &Address) -> bool {
        self.signatures.iter().any(|(addr, _)| addr == signer)
    }

    /// Number of collected signatures
    pub fn signature_count(&self) -> u32 {
        self.signatures.len() as u32
    }

    /// Signatures in submission order, without signer addresses
    pub fn signature_bytes(&self) -> Vec<[u8; 65]> {
        self.signatures.iter().map(|(_, sig)| sig.to_bytes()).collect()
    }
}
