//! External-chain and hub interfaces the relay pumps between

use crate::error::RelayResult;
use async_trait::async_trait;
use giro_crypto::Signature;
use giro_primitives::{Address, H256, U256};
use giro_types::{MintCommand, Vote};
use parking_lot::RwLock;
use std::collections::HashMap;

/// The event a source ledger emits after burning the sender's balance.
///
/// The relay composes the full `TransferEvent` by attaching the observed
/// network id as `source_chain`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferInitiated {
    /// Source transaction hash
    pub tx_hash: H256,
    /// Sender account in the source chain's format
    pub sender: String,
    /// Recipient on the destination chain
    pub recipient: Address,
    /// Amount in base units
    pub amount: U256,
    /// Destination chain identifier
    pub dest_chain: String,
    /// Per-source-chain monotonic nonce
    pub nonce: u64,
    /// Source block the event appeared in
    pub block_height: u64,
    /// Source block timestamp
    pub timestamp: u64,
}

/// Receipt returned by a destination executor
#[derive(Clone, Debug)]
pub struct ExecutionReceipt {
    /// Destination transaction hash
    pub tx_hash: H256,
    /// Destination block the mint landed in
    pub block_height: u64,
}

/// Acknowledgement of a submitted vote
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoteAck {
    /// Tallied (possibly confirming the transfer)
    Accepted,
    /// The hub had already counted this `(tx_hash, validator)` pair;
    /// harmless under at-least-once delivery
    Duplicate,
}

/// A monitored source ledger
#[async_trait]
pub trait SourceChain: Send + Sync {
    /// Network id, used as `source_chain` and as the checkpoint key
    fn chain_id(&self) -> &str;

    /// Latest finalized block height
    async fn latest_block(&self) -> RelayResult<u64>;

    /// Transfer events in the inclusive block range
    async fn fetch_events(&self, from: u64, to: u64) -> RelayResult<Vec<TransferInitiated>>;
}

/// A destination ledger executing mint commands
#[async_trait]
pub trait DestinationChain: Send + Sync {
    /// Network id, matched against `MintCommand::target_chain`
    fn chain_id(&self) -> &str;

    /// Execute a threshold-signed mint.
    ///
    /// Must refuse a replayed `command_id` with a permanent error and
    /// require threshold-many valid signatures over the canonical
    /// pre-image.
    async fn execute_mint(
        &self,
        command_id: H256,
        recipient: Address,
        amount: U256,
        signatures: Vec<[u8; 65]>,
    ) -> RelayResult<ExecutionReceipt>;
}

/// The hub's external transaction interface as the relay sees it.
///
/// Relays never touch hub storage directly; everything goes through
/// submitted transactions and read endpoints.
#[async_trait]
pub trait HubClient: Send + Sync {
    /// Submit a validator vote
    async fn submit_vote(&self, vote: Vote) -> RelayResult<VoteAck>;

    /// Commands still collecting signatures
    async fn pending_commands(&self) -> RelayResult<Vec<MintCommand>>;

    /// Commands with threshold signatures, awaiting execution
    async fn signed_commands(&self) -> RelayResult<Vec<MintCommand>>;

    /// Contribute one validator signature to a pending command
    async fn submit_signature(
        &self,
        command_id: H256,
        signer: Address,
        signature: Signature,
    ) -> RelayResult<()>;

    /// Report a successful destination execution
    async fn mark_executed(&self, command_id: H256) -> RelayResult<()>;

    /// Report a permanent destination failure
    async fn mark_failed(&self, command_id: H256, reason: String) -> RelayResult<()>;
}

/// Durable `last_processed_block` storage, one slot per source chain
pub trait CheckpointStore: Send + Sync {
    /// Last processed block for the chain, if any
    fn load(&self, chain_id: &str) -> RelayResult<Option<u64>>;

    /// Persist the last processed block
    fn store(&self, chain_id: &str, block: u64) -> RelayResult<()>;
}

/// In-memory checkpoints for tests and ephemeral relays
#[derive(Default)]
pub struct MemoryCheckpoints {
    inner: RwLock<HashMap<String, u64>>,
}

impl MemoryCheckpoints {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for MemoryCheckpoints {
    fn load(&self, chain_id: &str) -> RelayResult<Option<u64>> {
        Ok(self.inner.read().get(chain_id).copied())
    }

    fn store(&self, chain_id: &str, block: u64) -> RelayResult<()> {
        self.inner.write().insert(chain_id.to_string(), block);
        Ok(())
    }
}
