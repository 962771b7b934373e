//! # giro-oracle
//!
//! Cross-ledger event confirmation for the Giro clearing hub.
//!
//! Validators observe burn events on source ledgers and submit signed
//! votes. The engine deduplicates by `(tx_hash, validator)`, tallies
//! conflicting event bodies into separate buckets, freezes the threshold
//! per transfer at open time, and confirms a transfer the moment one
//! bucket reaches `ceil(2n/3)` votes. Open statuses expire after a
//! configured number of blocks; confirmed statuses are terminal.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod engine;
mod error;

pub use engine::{BlockContext, VoteOutcome, VotingEngine};
pub use error::{OracleError, OracleResult};
