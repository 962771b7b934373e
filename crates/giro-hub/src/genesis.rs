//! Genesis state applied at first start

use giro_primitives::{Address, U256};
use giro_types::HubParams;

/// A validator registered at genesis
#[derive(Clone, Debug)]
pub struct GenesisValidator {
    /// Compressed SEC1 public key
    pub pubkey: [u8; 33],
    /// Voting power
    pub power: u64,
}

/// A credit position seeded at genesis
#[derive(Clone, Debug)]
pub struct GenesisCredit {
    /// Issuer bank
    pub issuer: String,
    /// Holder bank
    pub holder: String,
    /// Amount in base units
    pub amount: U256,
}

/// Everything the hub needs before block 1
#[derive(Clone, Debug)]
pub struct GenesisState {
    /// Initial validators (the set becomes version 1)
    pub validators: Vec<GenesisValidator>,
    /// Pre-seeded credit positions
    pub credits: Vec<GenesisCredit>,
    /// Hub parameters
    pub params: HubParams,
    /// Admin address for gated transactions
    pub admin: Address,
}

impl GenesisState {
    /// Minimal genesis with validators only
    pub fn with_validators(validators: Vec<GenesisValidator>, admin: Address) -> Self {
        Self {
            validators,
            credits: Vec::new(),
            params: HubParams::default(),
            admin,
        }
    }
}
