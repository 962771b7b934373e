//! Validator-side command signing

use crate::chains::HubClient;
use crate::error::RelayError;
use giro_crypto::{sign, PrivateKey};
use giro_primitives::Address;
use giro_types::codec::mint_digest;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Contributes this validator's signature to pending mint commands.
///
/// Each validator process runs one signer; the hub deduplicates by signer
/// and validates against the command's pinned set, so redelivery is
/// harmless.
pub struct CommandSigner<H: HubClient> {
    hub: Arc<H>,
    key: PrivateKey,
    address: Address,
    shutdown: watch::Receiver<bool>,
    poll_interval: Duration,
}

impl<H: HubClient> CommandSigner<H> {
    /// Build a signer for this validator
    pub fn new(
        hub: Arc<H>,
        key: PrivateKey,
        address: Address,
        shutdown: watch::Receiver<bool>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            hub,
            key,
            address,
            shutdown,
            poll_interval,
        }
    }

    /// Run until shutdown
    pub async fn run(mut self) {
        info!(validator = %self.address, "command signer started");
        loop {
            tokio::select! {
                _ = self.shutdown.changed() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
            if *self.shutdown.borrow() {
                break;
            }
            let commands = match self.hub.pending_commands().await {
                Ok(commands) => commands,
                Err(err) => {
                    warn!(error = %err, "failed to fetch pending commands");
                    continue;
                }
            };
            for command in commands {
                if command.has_signed(&self.address) {
                    continue;
                }
                let digest = mint_digest(
                    &command.command_id,
                    &command.recipient,
                    &command.amount,
                    &command.target_chain,
                );
                let signature = match sign(&digest, &self.key) {
                    Ok(sig) => sig,
                    Err(err) => {
                        error!(command_id = %command.command_id, error = %err, "signing failed");
                        continue;
                    }
                };
                match self
                    .hub
                    .submit_signature(command.command_id, self.address, signature)
                    .await
                {
                    Ok(()) => debug!(command_id = %command.command_id, "signature submitted"),
                    Err(RelayError::Shutdown) => return,
                    Err(err) => {
                        warn!(command_id = %command.command_id, error = %err, "signature rejected")
                    }
                }
            }
        }
        info!(validator = %self.address, "command signer stopped");
    }
}
