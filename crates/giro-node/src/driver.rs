//! Block driver: serializes all hub mutations into timed blocks

use crate::client::HubRequest;
use giro_hub::Hub;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, error, info};

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Drives the hub's block lifecycle on a fixed interval.
///
/// Each tick opens a block, drains every queued request into it, runs the
/// end-block hook (netting trigger and expirations), and commits. Request
/// responses resolve when their block is processed, so callers observe the
/// hub's serialized, transactional semantics.
pub struct BlockDriver {
    hub: Arc<Mutex<Hub>>,
    requests: mpsc::Receiver<HubRequest>,
    block_interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl BlockDriver {
    /// Build a driver over the shared hub
    pub fn new(
        hub: Arc<Mutex<Hub>>,
        requests: mpsc::Receiver<HubRequest>,
        block_interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            hub,
            requests,
            block_interval,
            shutdown,
        }
    }

    /// Run until shutdown; the final partial block is still committed
    pub async fn run(mut self) {
        let mut height = {
            let hub = self.hub.lock().await;
            hub.height()
        };
        info!(resume_height = height, "block driver started");

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => break,
                _ = tokio::time::sleep(self.block_interval) => {}
            }
            if *self.shutdown.borrow() {
                break;
            }
            height += 1;
            if let Err(err) = self.process_block(height).await {
                // A failed block is unrecoverable for a single-node hub;
                // surface loudly and stop producing.
                error!(height, error = %err, "block processing failed");
                break;
            }
        }
        info!("block driver stopped");
    }

    async fn process_block(&mut self, height: u64) -> giro_hub::HubResult<()> {
        let mut hub = self.hub.lock().await;
        hub.begin_block(height, now_secs());

        let mut delivered = 0usize;
        while let Ok(request) = self.requests.try_recv() {
            match request {
                HubRequest::Tx { sender, tx, respond } => {
                    let result = hub.deliver(sender, tx).map_err(|e| e.code().to_string());
                    let _ = respond.send(result);
                }
                HubRequest::MarkExecuted { command_id, respond } => {
                    let result = hub
                        .mark_command_executed(&command_id)
                        .map_err(|e| e.code().to_string());
                    let _ = respond.send(result);
                }
                HubRequest::MarkFailed {
                    command_id,
                    reason,
                    respond,
                } => {
                    let result = hub
                        .mark_command_failed(&command_id, &reason)
                        .map_err(|e| e.code().to_string());
                    let _ = respond.send(result);
                }
            }
            delivered += 1;
        }

        hub.end_block()?;
        hub.commit()?;

        for event in hub.take_events() {
            debug!(height, event = event.name(), "hub event");
        }
        if delivered > 0 {
            debug!(height, delivered, "block committed");
        }
        Ok(())
    }
}
