//! # giro-store
//!
//! Per-block transactional state store for the Giro clearing hub.
//!
//! Three layers, mirroring how block processing works:
//! - [`Database`]: RocksDB with one column family per record kind
//! - [`StateCache`]: in-memory overlay of uncommitted changes
//! - [`HubState`]: cache plus optional read-through database plus a
//!   snapshot stack, giving per-submission and per-netting-cycle
//!   atomicity without internal locks
//!
//! All hub state mutations for a block accumulate in the cache and commit
//! in a single RocksDB write batch, so block *h* is fully durable before
//! block *h+1* begins.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod db;
mod error;
mod state;

pub use db::{cf, Database, DbConfig, WriteBatchExt, ALL_CFS};
pub use error::{StorageError, StorageResult};
pub use state::{HubState, StateCache, StateDb};
