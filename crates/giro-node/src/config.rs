//! Genesis and chain configuration files

use anyhow::{bail, Context, Result};
use giro_hub::{GenesisCredit, GenesisState, GenesisValidator};
use giro_primitives::{Address, U256};
use giro_types::HubParams;
use serde::Deserialize;
use std::path::Path;

/// On-disk genesis file
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisFile {
    /// Admin address (hex)
    pub admin: Address,
    /// Hub parameters
    #[serde(default)]
    pub params: HubParams,
    /// Initial validators
    pub validators: Vec<GenesisValidatorEntry>,
    /// Pre-seeded credit positions
    #[serde(default)]
    pub credits: Vec<GenesisCreditEntry>,
}

/// A validator entry in the genesis file
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisValidatorEntry {
    /// Compressed SEC1 public key, hex (33 bytes)
    pub pubkey: String,
    /// Voting power
    #[serde(default = "default_power")]
    pub power: u64,
}

fn default_power() -> u64 {
    1
}

/// A credit entry in the genesis file
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisCreditEntry {
    /// Issuer bank
    pub issuer: String,
    /// Holder bank
    pub holder: String,
    /// Amount in base units, decimal string
    pub amount: String,
}

impl GenesisFile {
    /// Load and validate a genesis file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading genesis file {}", path.display()))?;
        let file: GenesisFile = serde_json::from_str(&raw).context("parsing genesis file")?;
        if file.validators.is_empty() {
            bail!("genesis must declare at least one validator");
        }
        Ok(file)
    }

    /// Convert into the hub's genesis state
    pub fn into_genesis(self) -> Result<GenesisState> {
        let mut validators = Vec::with_capacity(self.validators.len());
        for entry in &self.validators {
            let bytes = hex::decode(entry.pubkey.trim_start_matches("0x"))
                .context("validator pubkey hex")?;
            let pubkey: [u8; 33] = bytes
                .as_slice()
                .try_into()
                .map_err(|_| anyhow::anyhow!("validator pubkey must be 33 bytes"))?;
            validators.push(GenesisValidator {
                pubkey,
                power: entry.power,
            });
        }

        let mut credits = Vec::with_capacity(self.credits.len());
        for entry in &self.credits {
            credits.push(GenesisCredit {
                issuer: entry.issuer.clone(),
                holder: entry.holder.clone(),
                amount: U256::from_dec_str(&entry.amount).context("credit amount")?,
            });
        }

        Ok(GenesisState {
            validators,
            credits,
            params: self.params,
            admin: self.admin,
        })
    }
}

/// On-disk chains file: the relay's endpoints
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ChainsFile {
    /// Monitored source chains
    #[serde(default)]
    pub sources: Vec<ChainEndpoint>,
    /// Mint destinations
    #[serde(default)]
    pub destinations: Vec<ChainEndpoint>,
}

/// One external chain endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ChainEndpoint {
    /// Network id, e.g. "chain-a"
    pub chain_id: String,
    /// JSON-RPC URL of the adapter
    pub url: String,
}

impl ChainsFile {
    /// Load a chains file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading chains file {}", path.display()))?;
        serde_json::from_str(&raw).context("parsing chains file")
    }
}
