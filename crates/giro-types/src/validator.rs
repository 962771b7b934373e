//! Validator set and threshold bookkeeping

use giro_primitives::Address;

/// A registered hub validator
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validator {
    /// Address derived from the secp256k1 public key
    pub address: Address,
    /// Compressed SEC1 public key (33 bytes)
    pub pubkey: [u8; 33],
    /// Voting power (reserved; confirmation counts heads, not power)
    pub power: u64,
    /// Whether the validator participates in voting and signing
    pub active: bool,
    /// Hub block height the validator joined at
    pub joined_at: u64,
}

impl Validator {
    /// Create an active validator
    pub fn new(address: Address, pubkey: [u8; 33], power: u64, joined_at: u64) -> Self {
        Validator {
            address,
            pubkey,
            power,
            active: true,
            joined_at,
        }
    }
}

/// The versioned validator set.
///
/// `version` increments on every membership or activation change; mint
/// commands pin the version they were created under so in-flight commands
/// survive rotation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidatorSet {
    /// All registered validators, active or not
    pub validators: Vec<Validator>,
    /// `ceil(2·active/3)`, recomputed on every change
    pub threshold: u32,
    /// Hub block height of the last change
    pub update_height: u64,
    /// Monotonic set version
    pub version: u64,
}

impl ValidatorSet {
    /// Build a set from validators, computing the threshold
    pub fn from_validators(validators: Vec<Validator>, update_height: u64, version: u64) -> Self {
        let mut set = ValidatorSet {
            validators,
            threshold: 0,
            update_height,
            version,
        };
        set.recompute_threshold();
        set
    }

    /// Integer ceiling of `2n/3` over the active validator count
    pub fn compute_threshold(active: usize) -> u32 {
        ((2 * active + 2) / 3) as u32
    }

    /// Recompute the threshold from the current active count
    pub fn recompute_threshold(&mut self) {
        self.threshold = Self::compute_threshold(self.active_count());
    }

    /// Number of active validators
    pub fn active_count(&self) -> usize {
        self.validators.iter().filter(|v| v.active).count()
    }

    /// Total number of registered validators
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Look up a validator by address
    pub fn get(&self, address: &Address) -> Option<&Validator> {
        self.validators.iter().find(|v| &v.address == address)
    }

    /// Mutable lookup by address
    pub fn get_mut(&mut self, address: &Address) -> Option<&mut Validator> {
        self.validators.iter_mut().find(|v| &v.address == address)
    }

    /// Whether the address belongs to an active validator
    pub fn is_active(&self, address: &Address) -> bool {
        self.get(address).map(|v| v.active).unwrap_or(false)
    }

    /// Addresses of active validators
    pub fn active_addresses(&self) -> Vec<Address> {
        self.validators
            .iter()
            .filter(|v| v.active)
            .map(|v| v.address)
            .collect()
    }
}
