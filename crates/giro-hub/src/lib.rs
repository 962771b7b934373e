//! # giro-hub
//!
//! Composition root for the Giro clearing hub.
//!
//! The [`Hub`] owns the per-block transactional state and threads it
//! through the voting engine, the credit ledger, and the command builder.
//! Block processing is strictly serialized: `begin_block`, any number of
//! `deliver` calls (each atomic on its own), `end_block` (netting trigger
//! and expirations), then `commit` (one durable write batch).
//!
//! Every failed submission rolls back completely, surfaces a stable error
//! code, and leaves an audit entry; no rejection is silent.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod genesis;
mod hub;

pub use error::{HubError, HubResult};
pub use genesis::{GenesisCredit, GenesisState, GenesisValidator};
pub use hub::{Hub, HubConfig};
