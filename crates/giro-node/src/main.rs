//! Giro clearing hub node binary
//!
//! Wires the hub (RocksDB-backed, block-driven) to the relay (source
//! monitors, vote submitter, command signer, mint executor) and runs both
//! until ctrl-c.

mod cli;
mod client;
mod config;
mod driver;

use anyhow::{Context, Result};
use cli::Cli;
use client::{FileCheckpoints, HubRequest, LocalHubClient};
use config::{ChainsFile, GenesisFile};
use driver::BlockDriver;
use giro_hub::Hub;
use giro_relay::{
    DestinationChain, HttpDestinationChain, HttpSourceChain, RelayConfig, RelayService,
};
use giro_store::{Database, HubState, StateDb};
use k256::ecdsa::SigningKey;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("giro node starting");

    std::fs::create_dir_all(&cli.datadir).context("creating data directory")?;
    let db = Database::open(cli.datadir.join("db")).context("opening hub database")?;
    let state = HubState::with_db(StateDb::new(db));

    let genesis = GenesisFile::load(&cli.genesis)?.into_genesis()?;
    let hub = Hub::from_genesis(genesis, state).context("applying genesis")?;
    let hub = Arc::new(Mutex::new(hub));

    let (requests_tx, requests_rx) = mpsc::channel::<HubRequest>(1024);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let driver = BlockDriver::new(
        hub.clone(),
        requests_rx,
        Duration::from_millis(cli.block_time_ms),
        shutdown_rx,
    );
    let driver_task = tokio::spawn(driver.run());

    // The relay needs external chains and this validator's key; without
    // either the node runs the hub alone.
    let relay = match (&cli.chains, &cli.validator_key) {
        (Some(chains_path), Some(key_hex)) => {
            let chains = ChainsFile::load(chains_path)?;
            let key_bytes =
                hex::decode(key_hex.trim_start_matches("0x")).context("validator key hex")?;
            let key = SigningKey::from_slice(&key_bytes).context("validator key")?;

            let mut sources = Vec::new();
            for endpoint in &chains.sources {
                sources.push(Arc::new(
                    HttpSourceChain::new(endpoint.chain_id.clone(), endpoint.url.clone())
                        .context("source client")?,
                ));
            }
            let mut destinations: Vec<Arc<dyn DestinationChain>> = Vec::new();
            for endpoint in &chains.destinations {
                destinations.push(Arc::new(
                    HttpDestinationChain::new(endpoint.chain_id.clone(), endpoint.url.clone())
                        .context("destination client")?,
                ));
            }

            let checkpoints = Arc::new(
                FileCheckpoints::open(cli.datadir.join("checkpoints.json"))
                    .context("opening checkpoints")?,
            );
            let hub_client = Arc::new(LocalHubClient::new(hub.clone(), requests_tx.clone()));

            Some(RelayService::start(
                RelayConfig::default(),
                sources,
                destinations,
                hub_client,
                checkpoints,
                key,
            ))
        }
        _ => {
            tracing::info!("relay disabled (chains file or validator key not provided)");
            None
        }
    };

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    tracing::info!("shutdown signal received");

    // Stop the relay first so no new requests land, then the driver
    // commits its final block.
    if let Some(relay) = relay {
        relay.shutdown().await;
    }
    shutdown_tx.send(true).ok();
    drop(requests_tx);
    driver_task.await.ok();

    tracing::info!("giro node stopped");
    Ok(())
}
