//! Destination mint execution

use crate::breaker::{BreakerConfig, CircuitBreaker};
use crate::chains::{DestinationChain, HubClient};
use crate::error::RelayError;
use crate::retry::{with_retry, RetryPolicy};
use dashmap::DashSet;
use giro_primitives::H256;
use giro_types::MintCommand;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Drives fully signed mint commands to their destination ledgers.
///
/// One executor serves every destination; a per-destination circuit
/// breaker isolates a failing ledger so commands for healthy ones keep
/// flowing. Execution is at-least-once: only the destination's
/// processed-commands set makes it exactly-once.
pub struct MintExecutor<H: HubClient> {
    hub: Arc<H>,
    destinations: HashMap<String, Arc<dyn DestinationChain>>,
    breakers: HashMap<String, CircuitBreaker>,
    retry: RetryPolicy,
    shutdown: watch::Receiver<bool>,
    poll_interval: Duration,
    in_flight_done: DashSet<H256>,
}

impl<H: HubClient> MintExecutor<H> {
    /// Build an executor over the configured destinations
    pub fn new(
        hub: Arc<H>,
        destinations: Vec<Arc<dyn DestinationChain>>,
        breaker_config: BreakerConfig,
        retry: RetryPolicy,
        shutdown: watch::Receiver<bool>,
        poll_interval: Duration,
    ) -> Self {
        let mut by_chain = HashMap::new();
        let mut breakers = HashMap::new();
        for dest in destinations {
            let chain = dest.chain_id().to_string();
            breakers.insert(
                chain.clone(),
                CircuitBreaker::new(format!("dest:{chain}"), breaker_config.clone()),
            );
            by_chain.insert(chain, dest);
        }
        Self {
            hub,
            destinations: by_chain,
            breakers,
            retry,
            shutdown,
            poll_interval,
            in_flight_done: DashSet::new(),
        }
    }

    /// Run until shutdown
    pub async fn run(mut self) {
        info!(destinations = self.destinations.len(), "mint executor started");
        loop {
            tokio::select! {
                _ = self.shutdown.changed() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
            if *self.shutdown.borrow() {
                break;
            }
            let commands = match self.hub.signed_commands().await {
                Ok(commands) => commands,
                Err(err) => {
                    warn!(error = %err, "failed to fetch signed commands");
                    continue;
                }
            };
            for command in commands {
                if self.in_flight_done.contains(&command.command_id) {
                    continue;
                }
                if *self.shutdown.borrow() {
                    break;
                }
                self.execute(command).await;
            }
        }
        info!("mint executor stopped");
    }

    async fn execute(&mut self, command: MintCommand) {
        let command_id = command.command_id;
        let Some(dest) = self.destinations.get(&command.target_chain).cloned() else {
            warn!(%command_id, chain = %command.target_chain, "no destination configured");
            let _ = self
                .hub
                .mark_failed(command_id, format!("unknown target chain {}", command.target_chain))
                .await;
            self.in_flight_done.insert(command_id);
            return;
        };

        let Some(breaker) = self.breakers.get_mut(&command.target_chain) else {
            return;
        };
        if !breaker.allow() {
            debug!(%command_id, chain = %command.target_chain, "destination circuit open, deferred");
            return;
        }

        let signatures = command.signature_bytes();
        let recipient = command.recipient;
        let amount = command.amount;
        let result = with_retry(&self.retry, &mut self.shutdown, "execute_mint", move || {
            let dest = dest.clone();
            let signatures = signatures.clone();
            async move { dest.execute_mint(command_id, recipient, amount, signatures).await }
        })
        .await;

        let Some(breaker) = self.breakers.get_mut(&command.target_chain) else {
            return;
        };
        match result {
            Ok(receipt) => {
                breaker.record_success();
                info!(%command_id, dest_tx = %receipt.tx_hash, "mint executed");
                if let Err(err) = self.hub.mark_executed(command_id).await {
                    warn!(%command_id, error = %err, "failed to report execution");
                } else {
                    self.in_flight_done.insert(command_id);
                }
            }
            Err(RelayError::Permanent(reason)) => {
                // A replayed command id is success from the hub's point of
                // view: the destination already minted it.
                let lower = reason.to_ascii_lowercase();
                if lower.contains("already processed") {
                    breaker.record_success();
                    info!(%command_id, "destination had already processed the command");
                    let _ = self.hub.mark_executed(command_id).await;
                    self.in_flight_done.insert(command_id);
                    return;
                }
                breaker.record_success();
                warn!(%command_id, reason = %reason, "mint permanently failed");
                let _ = self.hub.mark_failed(command_id, reason).await;
                self.in_flight_done.insert(command_id);
            }
            Err(RelayError::Shutdown) => {}
            Err(err) => {
                // Transient even after retries: the command stays Signed
                // and the next poll picks it up again.
                breaker.record_failure();
                warn!(%command_id, error = %err, "mint deferred after transient failures");
            }
        }
    }
}
