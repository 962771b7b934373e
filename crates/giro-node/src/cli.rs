//! CLI argument parsing for giro-node

use clap::Parser;
use std::path::PathBuf;

/// Giro interbank clearing hub node
#[derive(Parser, Debug, Clone)]
#[command(name = "giro")]
#[command(about = "Giro interbank clearing hub node")]
#[command(version)]
pub struct Cli {
    /// Data directory for hub storage and relay checkpoints
    #[arg(long, default_value = "./data")]
    pub datadir: PathBuf,

    /// Genesis file (validators, params, initial credits)
    #[arg(long)]
    pub genesis: PathBuf,

    /// Chains file (source and destination RPC endpoints); relay is
    /// disabled without it
    #[arg(long)]
    pub chains: Option<PathBuf>,

    /// This validator's secp256k1 private key, hex; relay is disabled
    /// without it
    #[arg(long)]
    pub validator_key: Option<String>,

    /// Block interval in milliseconds
    #[arg(long, default_value = "1000")]
    pub block_time_ms: u64,

    /// Log level filter (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Parse from the process arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
