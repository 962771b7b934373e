//! # giro-relay
//!
//! Bidirectional event pump between external ledgers and the Giro hub.
//!
//! - **Source → hub**: one monitor task per source chain polls for
//!   `TransferInitiated` events from a durable checkpoint and feeds a
//!   bounded channel; a submitter task signs and submits votes.
//! - **Hub → destination**: an executor task picks up fully signed mint
//!   commands and drives `executeMint` on the destination ledger.
//! - A signer task contributes this validator's signature to pending
//!   commands.
//!
//! Delivery is at-least-once; idempotency lives in the hub (vote dedupe)
//! and the destination (processed-commands set). Every external call sits
//! behind retry with exponential backoff and a per-downstream circuit
//! breaker, and every task honors one shutdown signal: finish the
//! in-flight call, persist the checkpoint, exit.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod breaker;
mod chains;
mod error;
mod executor;
mod monitor;
mod retry;
mod rpc;
mod service;
mod signer;

pub use breaker::{BreakerConfig, BreakerState, CircuitBreaker};
pub use chains::{
    CheckpointStore, DestinationChain, ExecutionReceipt, HubClient, MemoryCheckpoints,
    SourceChain, TransferInitiated, VoteAck,
};
pub use error::{RelayError, RelayResult};
pub use executor::MintExecutor;
pub use monitor::{SourceMonitor, VoteSubmitter};
pub use retry::{with_retry, RetryPolicy};
pub use rpc::{HttpDestinationChain, HttpSourceChain, JsonRpcClient};
pub use service::{RelayConfig, RelayHandle, RelayService};
pub use signer::CommandSigner;
