//! # giro-crypto
//!
//! Cryptographic primitives for the Giro clearing hub.
//!
//! - Keccak-256 hashing
//! - ECDSA signing/verification (secp256k1)
//! - Public key recovery (the destination-contract verification primitive)
//! - Address derivation and compressed-key encoding for the validator
//!   registry

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod hash;
mod signature;

pub use error::CryptoError;
pub use hash::keccak256;
pub use signature::{
    decode_pubkey, encode_pubkey, public_key_to_address, recover_public_key, recover_signer,
    sign, verify, PrivateKey, PublicKey, Signature, COMPRESSED_PUBKEY_LEN,
};
