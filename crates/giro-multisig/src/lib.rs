//! # giro-multisig
//!
//! Threshold-signed mint command assembly.
//!
//! On confirmation the builder derives a deterministic command id, pins the
//! current validator-set version, and collects ECDSA signatures over the
//! canonical mint pre-image. Signatures are verified by public-key
//! recovery against the *pinned* set, so an in-flight command survives a
//! concurrent validator rotation. At the pinned threshold the command is
//! marked `Signed` and handed to the relay.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod builder;
mod error;

pub use builder::{CommandBuilder, SignatureOutcome};
pub use error::{MultisigError, MultisigResult};
