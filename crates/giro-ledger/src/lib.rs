//! # giro-ledger
//!
//! Issuer-tagged credit ledger and bilateral netting engine.
//!
//! A balance of `cred-X` held by bank Y is a claim of Y against issuer X.
//! Credit is issued when a transfer is confirmed, only ever burned after
//! that, and periodically compressed: for every pair of banks with claims
//! against each other, the netting engine burns the overlap from both
//! sides, leaving at most one side owing the residual.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ledger;
mod netting;

pub use error::{LedgerError, LedgerResult};
pub use ledger::{CreditLedger, DebtPosition};
pub use netting::NettingEngine;
