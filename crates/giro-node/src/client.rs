//! In-process hub access for the relay

use async_trait::async_trait;
use giro_crypto::Signature;
use giro_hub::Hub;
use giro_primitives::{Address, H256};
use giro_relay::{CheckpointStore, HubClient, RelayError, RelayResult, VoteAck};
use giro_types::{HubTx, MintCommand, Vote};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};

/// A transaction queued for the next block, with a response slot
pub enum HubRequest {
    /// Submitted transaction
    Tx {
        /// Sender used for admin gating
        sender: Address,
        /// The transaction
        tx: HubTx,
        /// Stable error code on rejection
        respond: oneshot::Sender<Result<(), String>>,
    },
    /// Relay report: destination executed a command
    MarkExecuted {
        /// Command id
        command_id: H256,
        /// Stable error code on rejection
        respond: oneshot::Sender<Result<(), String>>,
    },
    /// Relay report: destination permanently failed a command
    MarkFailed {
        /// Command id
        command_id: H256,
        /// Failure reason
        reason: String,
        /// Stable error code on rejection
        respond: oneshot::Sender<Result<(), String>>,
    },
}

/// The relay's view of an in-process hub.
///
/// Writes queue into the block driver's channel and resolve when the
/// containing block is processed, mirroring how an external hub would
/// accept transactions. Reads take the hub lock directly.
pub struct LocalHubClient {
    hub: Arc<Mutex<Hub>>,
    requests: mpsc::Sender<HubRequest>,
}

impl LocalHubClient {
    /// Create a client over the shared hub and request queue
    pub fn new(hub: Arc<Mutex<Hub>>, requests: mpsc::Sender<HubRequest>) -> Self {
        Self { hub, requests }
    }

    async fn send(&self, request: HubRequest, rx: oneshot::Receiver<Result<(), String>>) -> RelayResult<Result<(), String>> {
        self.requests
            .send(request)
            .await
            .map_err(|_| RelayError::Shutdown)?;
        rx.await.map_err(|_| RelayError::Shutdown)
    }
}

#[async_trait]
impl HubClient for LocalHubClient {
    async fn submit_vote(&self, vote: Vote) -> RelayResult<VoteAck> {
        let (respond, rx) = oneshot::channel();
        let sender = vote.validator;
        let result = self
            .send(
                HubRequest::Tx {
                    sender,
                    tx: HubTx::Vote(vote),
                    respond,
                },
                rx,
            )
            .await?;
        match result {
            Ok(()) => Ok(VoteAck::Accepted),
            Err(code) if code == "duplicate_vote" => Ok(VoteAck::Duplicate),
            Err(code) => Err(RelayError::Permanent(code)),
        }
    }

    async fn pending_commands(&self) -> RelayResult<Vec<MintCommand>> {
        let hub = self.hub.lock().await;
        hub.state()
            .commands_in_status(giro_types::CommandStatus::Pending)
            .map_err(|e| RelayError::Transient(e.to_string()))
    }

    async fn signed_commands(&self) -> RelayResult<Vec<MintCommand>> {
        let hub = self.hub.lock().await;
        hub.signed_commands()
            .map_err(|e| RelayError::Transient(e.to_string()))
    }

    async fn submit_signature(
        &self,
        command_id: H256,
        signer: Address,
        signature: Signature,
    ) -> RelayResult<()> {
        let (respond, rx) = oneshot::channel();
        let result = self
            .send(
                HubRequest::Tx {
                    sender: signer,
                    tx: HubTx::SubmitSignature {
                        command_id,
                        signer,
                        signature,
                    },
                    respond,
                },
                rx,
            )
            .await?;
        result.map_err(RelayError::Permanent)
    }

    async fn mark_executed(&self, command_id: H256) -> RelayResult<()> {
        let (respond, rx) = oneshot::channel();
        let result = self
            .send(HubRequest::MarkExecuted { command_id, respond }, rx)
            .await?;
        result.map_err(RelayError::Permanent)
    }

    async fn mark_failed(&self, command_id: H256, reason: String) -> RelayResult<()> {
        let (respond, rx) = oneshot::channel();
        let result = self
            .send(
                HubRequest::MarkFailed {
                    command_id,
                    reason,
                    respond,
                },
                rx,
            )
            .await?;
        result.map_err(RelayError::Permanent)
    }
}

/// Relay checkpoints persisted as one JSON file in the data directory
pub struct FileCheckpoints {
    path: PathBuf,
    cache: RwLock<HashMap<String, u64>>,
}

impl FileCheckpoints {
    /// Open (or initialize) the checkpoint file
    pub fn open(path: PathBuf) -> std::io::Result<Self> {
        let cache = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => return Err(err),
        };
        Ok(Self {
            path,
            cache: RwLock::new(cache),
        })
    }
}

impl CheckpointStore for FileCheckpoints {
    fn load(&self, chain_id: &str) -> RelayResult<Option<u64>> {
        Ok(self.cache.read().get(chain_id).copied())
    }

    fn store(&self, chain_id: &str, block: u64) -> RelayResult<()> {
        let snapshot = {
            let mut cache = self.cache.write();
            cache.insert(chain_id.to_string(), block);
            cache.clone()
        };
        let raw = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| RelayError::Permanent(format!("checkpoint encode: {e}")))?;
        std::fs::write(&self.path, raw)
            .map_err(|e| RelayError::Transient(format!("checkpoint write: {e}")))
    }
}
