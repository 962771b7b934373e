//! # giro-primitives
//!
//! Primitive types for the Giro interbank clearing hub.
//!
//! Everything above this crate speaks in terms of these types: 20-byte
//! addresses for validators and mint recipients, 32-byte hashes for
//! transfer ids and command ids, and `U256` amounts.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod address;
mod error;
mod hash;

pub use address::Address;
pub use error::PrimitiveError;
pub use hash::{Hash, H256};

// Re-export primitive-types for U256 amounts
pub use primitive_types::U256;

/// Block height on the hub chain
pub type BlockHeight = u64;

/// Per-source-chain monotonic transfer nonce
pub type Nonce = u64;

/// Unix timestamp in seconds
pub type Timestamp = u64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u256_arithmetic() {
        let a = U256::from(70u64);
        let b = U256::from(30u64);
        assert_eq!(a + b, U256::from(100u64));
        assert_eq!(a.min(b), b);
    }
}
