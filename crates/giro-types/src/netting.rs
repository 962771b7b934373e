//! Bilateral netting cycle records

use giro_primitives::U256;

/// Lifecycle of a netting cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleStatus {
    /// Scheduled but not yet started
    Pending,
    /// Burns in progress; blocks a new cycle from starting
    InProgress,
    /// All pair offsets committed
    Completed,
    /// Rolled back; no burns from this cycle persist
    Failed,
}

impl CycleStatus {
    /// Stable string form for audit entries
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleStatus::Pending => "pending",
            CycleStatus::InProgress => "in_progress",
            CycleStatus::Completed => "completed",
            CycleStatus::Failed => "failed",
        }
    }
}

/// One offset pair inside a netting cycle.
///
/// `amount_a` is the credit balance bank A held against B before the offset
/// (`balance[A, cred-B]`), and symmetrically for `amount_b`. After the
/// offset the smaller side is zero and `net_debtor` still owes
/// `net_amount`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NettingPair {
    /// Lexicographically smaller bank of the pair
    pub bank_a: String,
    /// Lexicographically larger bank of the pair
    pub bank_b: String,
    /// `balance[A, cred-B]` before the offset
    pub amount_a: U256,
    /// `balance[B, cred-A]` before the offset
    pub amount_b: U256,
    /// Residual obligation after the offset: `|amount_a − amount_b|`
    pub net_amount: U256,
    /// The bank that still owes the residual
    pub net_debtor: String,
}

impl NettingPair {
    /// The amount burned from both sides: `min(amount_a, amount_b)`
    pub fn offset_amount(&self) -> U256 {
        self.amount_a.min(self.amount_b)
    }
}

/// A completed (or failed) run of the bilateral netting engine.
///
/// Written exactly once per cycle and immutable after `Completed`.
#[derive(Clone, Debug)]
pub struct NettingCycle {
    /// Globally ordered cycle id
    pub cycle_id: u64,
    /// Hub block the cycle ran at
    pub block_height: u64,
    /// Offset pairs in deterministic (lexicographic) order
    pub pairs: Vec<NettingPair>,
    /// Wall-clock start
    pub start_time: u64,
    /// Wall-clock end
    pub end_time: u64,
    /// Final state
    pub status: CycleStatus,
}
