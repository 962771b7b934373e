//! Source-chain monitoring and vote submission

use crate::breaker::CircuitBreaker;
use crate::chains::{CheckpointStore, HubClient, SourceChain, TransferInitiated, VoteAck};
use crate::error::{RelayError, RelayResult};
use crate::retry::{with_retry, RetryPolicy};
use dashmap::DashSet;
use giro_crypto::{sign, PrivateKey};
use giro_primitives::{Address, H256};
use giro_types::codec::event_hash;
use giro_types::{TransferEvent, Vote};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Polls one source chain for `TransferInitiated` events.
///
/// Tracks a durable `last_processed_block` checkpoint, deduplicates by
/// `tx_hash` in a short-lived in-process set (true dedupe is the hub's),
/// and pushes composed events into a bounded channel. A full channel
/// pauses polling; the events stay durable on the source chain.
pub struct SourceMonitor<S: SourceChain> {
    source: Arc<S>,
    checkpoints: Arc<dyn CheckpointStore>,
    breaker: CircuitBreaker,
    events_tx: mpsc::Sender<TransferEvent>,
    shutdown: watch::Receiver<bool>,
    poll_interval: Duration,
    batch_span: u64,
    dedup: Arc<DashSet<H256>>,
}

impl<S: SourceChain> SourceMonitor<S> {
    /// Build a monitor for one source chain
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Arc<S>,
        checkpoints: Arc<dyn CheckpointStore>,
        breaker: CircuitBreaker,
        events_tx: mpsc::Sender<TransferEvent>,
        shutdown: watch::Receiver<bool>,
        poll_interval: Duration,
        batch_span: u64,
        dedup: Arc<DashSet<H256>>,
    ) -> Self {
        Self {
            source,
            checkpoints,
            breaker,
            events_tx,
            shutdown,
            poll_interval,
            batch_span,
            dedup,
        }
    }

    /// Run until shutdown
    pub async fn run(mut self) {
        let chain = self.source.chain_id().to_string();
        info!(chain = %chain, "source monitor started");
        loop {
            tokio::select! {
                _ = self.shutdown.changed() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
            if *self.shutdown.borrow() {
                break;
            }
            if !self.breaker.allow() {
                continue;
            }
            match self.poll_once().await {
                Ok(processed) => {
                    self.breaker.record_success();
                    if processed > 0 {
                        debug!(chain = %chain, processed, "events forwarded");
                    }
                }
                Err(RelayError::Shutdown) => break,
                Err(err) => {
                    warn!(chain = %chain, error = %err, "source poll failed");
                    self.breaker.record_failure();
                }
            }
        }
        info!(chain = %chain, "source monitor stopped");
    }

    /// Process the next block range; returns the number of forwarded events
    async fn poll_once(&mut self) -> RelayResult<usize> {
        let latest = self.source.latest_block().await?;
        let from = match self.checkpoints.load(self.source.chain_id())? {
            Some(done) => done + 1,
            None => 0,
        };
        if from > latest {
            return Ok(0);
        }
        let to = latest.min(from + self.batch_span.max(1) - 1);

        let events = self.source.fetch_events(from, to).await?;
        let mut forwarded = 0;
        for initiated in events {
            if !self.dedup.insert(initiated.tx_hash) {
                continue;
            }
            let event = self.compose(initiated);
            tokio::select! {
                sent = self.events_tx.send(event) => {
                    if sent.is_err() {
                        return Err(RelayError::Shutdown);
                    }
                    forwarded += 1;
                }
                _ = self.shutdown.changed() => return Err(RelayError::Shutdown),
            }
        }

        // Only checkpoint a fully forwarded range; a crash replays the
        // range and the dedup layers absorb it.
        self.checkpoints.store(self.source.chain_id(), to)?;
        Ok(forwarded)
    }

    fn compose(&self, initiated: TransferInitiated) -> TransferEvent {
        TransferEvent {
            tx_hash: initiated.tx_hash,
            source_chain: self.source.chain_id().to_string(),
            dest_chain: initiated.dest_chain,
            sender: initiated.sender,
            recipient: initiated.recipient,
            amount: initiated.amount,
            nonce: initiated.nonce,
            block_height: initiated.block_height,
            timestamp: initiated.timestamp,
        }
    }
}

/// Signs observed events with this validator's key and submits votes.
///
/// One submitter serves every monitor through the shared channel; hub
/// rejections other than duplicates are logged and dropped (the hub has
/// already audited them).
pub struct VoteSubmitter<H: HubClient> {
    hub: Arc<H>,
    key: PrivateKey,
    address: Address,
    events_rx: mpsc::Receiver<TransferEvent>,
    shutdown: watch::Receiver<bool>,
    retry: RetryPolicy,
}

impl<H: HubClient> VoteSubmitter<H> {
    /// Build a submitter for this validator
    pub fn new(
        hub: Arc<H>,
        key: PrivateKey,
        address: Address,
        events_rx: mpsc::Receiver<TransferEvent>,
        shutdown: watch::Receiver<bool>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            hub,
            key,
            address,
            events_rx,
            shutdown,
            retry,
        }
    }

    /// Run until shutdown
    pub async fn run(mut self) {
        info!(validator = %self.address, "vote submitter started");
        loop {
            let event = tokio::select! {
                _ = self.shutdown.changed() => break,
                event = self.events_rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            self.submit(event).await;
        }
        info!(validator = %self.address, "vote submitter stopped");
    }

    async fn submit(&mut self, event: TransferEvent) {
        let tx_hash = event.tx_hash;
        let digest = event_hash(&event);
        let signature = match sign(&digest, &self.key) {
            Ok(sig) => sig,
            Err(err) => {
                error!(%tx_hash, error = %err, "failed to sign vote");
                return;
            }
        };
        let vote = Vote {
            validator: self.address,
            event,
            signature,
            vote_time: now_secs(),
        };

        let hub = self.hub.clone();
        let result = with_retry(&self.retry, &mut self.shutdown, "submit_vote", || {
            let vote = vote.clone();
            let hub = hub.clone();
            async move { hub.submit_vote(vote).await }
        })
        .await;

        match result {
            Ok(VoteAck::Accepted) => debug!(%tx_hash, "vote accepted"),
            Ok(VoteAck::Duplicate) => debug!(%tx_hash, "vote already counted"),
            Err(RelayError::Shutdown) => {}
            Err(err) => warn!(%tx_hash, error = %err, "vote submission failed"),
        }
    }
}
