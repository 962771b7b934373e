//! Relay error taxonomy

use thiserror::Error;

/// Relay-side failure, classified for retry policy.
///
/// Transient errors are retried with backoff; permanent errors mark the
/// affected command or vote failed and are never retried.
#[derive(Debug, Clone, Error)]
pub enum RelayError {
    /// Retryable: timeouts, resets, rate limits, nonce races
    #[error("transient network error: {0}")]
    Transient(String),

    /// Not retryable: bad signatures, replays, reverts
    #[error("permanent execution error: {0}")]
    Permanent(String),

    /// The downstream's circuit breaker is open
    #[error("circuit open for {0}")]
    CircuitOpen(String),

    /// Shutdown was requested while waiting
    #[error("shutdown requested")]
    Shutdown,
}

impl RelayError {
    /// Whether the retry loop should try again
    pub fn is_transient(&self) -> bool {
        matches!(self, RelayError::Transient(_) | RelayError::CircuitOpen(_))
    }

    /// Classify a downstream error message.
    ///
    /// The markers mirror what source nodes, the hub, and destination
    /// executors actually report. Unknown messages default to transient so
    /// at-least-once delivery keeps the command alive; the breaker bounds
    /// how hard an unknown failure is hammered.
    pub fn classify(message: &str) -> RelayError {
        let lower = message.to_ascii_lowercase();
        const PERMANENT: &[&str] = &[
            "invalid signature",
            "insufficient funds",
            "insufficient balance",
            "already processed",
            "already known command",
            "duplicate command",
            "revert",
            "not in validator set",
            "unauthorized",
        ];
        const TRANSIENT: &[&str] = &[
            "timeout",
            "timed out",
            "connection reset",
            "connection refused",
            "rate limit",
            "too many requests",
            "nonce too high",
            "known transaction",
            "temporarily unavailable",
        ];
        if PERMANENT.iter().any(|m| lower.contains(m)) {
            return RelayError::Permanent(message.to_string());
        }
        if TRANSIENT.iter().any(|m| lower.contains(m)) {
            return RelayError::Transient(message.to_string());
        }
        RelayError::Transient(message.to_string())
    }
}

/// Result type for relay operations
pub type RelayResult<T> = Result<T, RelayError>;
