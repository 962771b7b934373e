//! Relay service orchestration

use crate::breaker::{BreakerConfig, CircuitBreaker};
use crate::chains::{CheckpointStore, DestinationChain, HubClient, SourceChain};
use crate::executor::MintExecutor;
use crate::monitor::{SourceMonitor, VoteSubmitter};
use crate::retry::RetryPolicy;
use crate::signer::CommandSigner;
use dashmap::DashSet;
use giro_crypto::{public_key_to_address, PrivateKey};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Relay tuning
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Poll cadence for monitors, the signer, and the executor
    pub poll_interval_ms: u64,
    /// Blocks per source fetch
    pub batch_span: u64,
    /// Capacity of the monitor → submitter channel
    pub channel_capacity: usize,
    /// Hard bound on waiting for tasks at shutdown
    pub shutdown_grace_ms: u64,
    /// Retry policy for hub and destination calls
    pub retry: RetryPolicy,
    /// Breaker policy per downstream
    pub breaker: BreakerConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            batch_span: 100,
            channel_capacity: 1024,
            shutdown_grace_ms: 5000,
            retry: RetryPolicy::default(),
            breaker: BreakerConfig::default(),
        }
    }
}

/// Handle to a running relay: owns the shutdown signal and task handles
pub struct RelayHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    grace: Duration,
}

impl RelayHandle {
    /// Signal shutdown and wait for every task, bounded by the grace
    /// period per task
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if tokio::time::timeout(self.grace, task).await.is_err() {
                warn!("relay task did not stop within the grace period");
            }
        }
        info!("relay stopped");
    }
}

/// Builder that wires monitors, the submitter, the signer, and the
/// executor onto one shutdown signal.
///
/// All per-task mutable state (checkpoints, dedup cache, breaker counters)
/// is constructed here at startup; nothing is process-global.
pub struct RelayService;

impl RelayService {
    /// Spawn the relay tasks and return the handle
    pub fn start<S, H>(
        config: RelayConfig,
        sources: Vec<Arc<S>>,
        destinations: Vec<Arc<dyn DestinationChain>>,
        hub: Arc<H>,
        checkpoints: Arc<dyn CheckpointStore>,
        key: PrivateKey,
    ) -> RelayHandle
    where
        S: SourceChain + 'static,
        H: HubClient + 'static,
    {
        let address = public_key_to_address(key.verifying_key());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (events_tx, events_rx) = mpsc::channel(config.channel_capacity);
        let poll_interval = Duration::from_millis(config.poll_interval_ms);
        let dedup = Arc::new(DashSet::new());

        let mut tasks = Vec::new();
        for source in sources {
            let monitor = SourceMonitor::new(
                source.clone(),
                checkpoints.clone(),
                CircuitBreaker::new(
                    format!("source:{}", source.chain_id()),
                    config.breaker.clone(),
                ),
                events_tx.clone(),
                shutdown_rx.clone(),
                poll_interval,
                config.batch_span,
                dedup.clone(),
            );
            tasks.push(tokio::spawn(monitor.run()));
        }
        // Monitors hold the only senders; dropping ours lets the submitter
        // drain and exit once every monitor is gone.
        drop(events_tx);

        let submitter = VoteSubmitter::new(
            hub.clone(),
            key.clone(),
            address,
            events_rx,
            shutdown_rx.clone(),
            config.retry.clone(),
        );
        tasks.push(tokio::spawn(submitter.run()));

        let signer = CommandSigner::new(
            hub.clone(),
            key,
            address,
            shutdown_rx.clone(),
            poll_interval,
        );
        tasks.push(tokio::spawn(signer.run()));

        let executor = MintExecutor::new(
            hub,
            destinations,
            config.breaker.clone(),
            config.retry.clone(),
            shutdown_rx,
            poll_interval,
        );
        tasks.push(tokio::spawn(executor.run()));

        info!(validator = %address, tasks = tasks.len(), "relay started");
        RelayHandle {
            shutdown: shutdown_tx,
            tasks,
            grace: Duration::from_millis(config.shutdown_grace_ms),
        }
    }
}
