//! Per-downstream circuit breaker

use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Breaker tuning
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures before the breaker opens
    pub threshold: u32,
    /// How long the breaker stays open before probing
    pub cooldown_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            threshold: 5,
            cooldown_ms: 60_000,
        }
    }
}

/// Breaker state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Calls flow normally
    Closed,
    /// Calls are refused until the cooldown elapses
    Open,
    /// One probe call is in flight
    HalfOpen,
}

/// Circuit breaker guarding one downstream (a source chain, the hub, or a
/// destination).
///
/// Opens after `threshold` consecutive failures, stays open for the
/// cooldown, then permits exactly one probe: success closes the breaker,
/// failure reopens it.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

impl CircuitBreaker {
    /// Create a closed breaker for the named downstream
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: BreakerState::Closed,
            consecutive_failures: 0,
            opened_at: None,
        }
    }

    /// The downstream this breaker guards
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state, without advancing the cooldown
    pub fn state(&self) -> BreakerState {
        self.state
    }

    /// Whether a call may proceed now.
    ///
    /// Transitions Open → HalfOpen when the cooldown has elapsed and
    /// reserves the single probe slot for the caller.
    pub fn allow(&mut self) -> bool {
        match self.state {
            BreakerState::Closed => true,
            BreakerState::HalfOpen => false, // probe already in flight
            BreakerState::Open => {
                let elapsed = self
                    .opened_at
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= Duration::from_millis(self.config.cooldown_ms) {
                    info!(breaker = %self.name, "cooldown elapsed, probing");
                    self.state = BreakerState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful call
    pub fn record_success(&mut self) {
        if self.state != BreakerState::Closed {
            info!(breaker = %self.name, "closed after successful probe");
        }
        self.state = BreakerState::Closed;
        self.consecutive_failures = 0;
        self.opened_at = None;
    }

    /// Record a failed call
    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        match self.state {
            BreakerState::HalfOpen => {
                warn!(breaker = %self.name, "probe failed, reopening");
                self.trip();
            }
            BreakerState::Closed if self.consecutive_failures >= self.config.threshold => {
                warn!(
                    breaker = %self.name,
                    failures = self.consecutive_failures,
                    "failure threshold reached, opening"
                );
                self.trip();
            }
            _ => {}
        }
    }

    fn trip(&mut self) {
        self.state = BreakerState::Open;
        self.opened_at = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_breaker(threshold: u32) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            BreakerConfig {
                threshold,
                cooldown_ms: 50,
            },
        )
    }

    #[test]
    fn test_opens_after_threshold() {
        let mut breaker = fast_breaker(3);
        assert!(breaker.allow());

        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);

        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(!breaker.allow());
    }

    #[test]
    fn test_success_resets_failure_count() {
        let mut breaker = fast_breaker(3);
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn test_probe_after_cooldown_then_close() {
        let mut breaker = fast_breaker(1);
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(!breaker.allow());

        std::thread::sleep(Duration::from_millis(60));

        // Exactly one probe is allowed
        assert!(breaker.allow());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        assert!(!breaker.allow());

        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert!(breaker.allow());
    }

    #[test]
    fn test_failed_probe_reopens() {
        let mut breaker = fast_breaker(1);
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(60));
        assert!(breaker.allow());

        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(!breaker.allow());

        // And it probes again after another cooldown
        std::thread::sleep(Duration::from_millis(60));
        assert!(breaker.allow());
    }
}
