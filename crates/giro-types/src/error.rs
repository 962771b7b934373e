//! Type-level errors

use thiserror::Error;

/// Errors produced while validating or decoding domain types
#[derive(Debug, Error)]
pub enum TypesError {
    /// A credit denomination string did not carry the `cred-` prefix
    #[error("invalid credit denom: {0}")]
    InvalidDenom(String),

    /// A required field was empty or out of range
    #[error("invalid field {field}: {reason}")]
    InvalidField {
        /// Field name
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// Persisted bytes could not be decoded
    #[error("decode error: {0}")]
    Decode(String),
}
