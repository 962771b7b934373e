//! # giro-e2e
//!
//! End-to-end test harness for the Giro clearing hub.
//!
//! Provides validator fixtures with real secp256k1 keys, a block-stepping
//! hub wrapper, and mock source/destination chains — including a
//! destination that verifies the canonical mint pre-image and enforces the
//! processed-commands replay guard exactly as a real destination contract
//! would.

#![warn(clippy::all)]

pub mod harness;

mod scenarios;

pub use harness::{
    HubHarness, MockSource, SoloBlockHub, TestValidator, VerifyingDestination, TEST_ADMIN,
};
