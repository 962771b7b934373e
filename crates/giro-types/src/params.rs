//! Hub configuration parameters

/// Tunable hub parameters with spec defaults.
///
/// Timeouts are measured in hub blocks; amounts in base units.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HubParams {
    /// Run a netting cycle every this many blocks
    pub netting_interval: u64,
    /// Pairs with `min(owe)` below this are skipped
    pub min_netting_amount: u64,
    /// Pairs per cycle; the rest roll over FIFO
    pub max_netting_pairs: usize,
    /// Open vote statuses expire after this many blocks
    pub voting_timeout: u64,
    /// Pending commands fail after this many blocks without threshold
    pub signing_timeout: u64,
    /// Minimum number of active validators the set may shrink to
    pub min_validator_count: usize,
}

impl Default for HubParams {
    fn default() -> Self {
        Self {
            netting_interval: 10,
            min_netting_amount: 1,
            max_netting_pairs: 100,
            voting_timeout: 100,
            signing_timeout: 50,
            min_validator_count: 1,
        }
    }
}
