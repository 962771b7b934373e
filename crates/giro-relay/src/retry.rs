//! Retry with exponential backoff

use crate::error::{RelayError, RelayResult};
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// Retry policy: the delay doubles from `backoff_ms` up to
/// `max_backoff_ms`, for at most `max_attempts` tries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Initial delay in milliseconds
    pub backoff_ms: u64,
    /// Delay ceiling in milliseconds
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 1000,
            max_backoff_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based)
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 2u64.saturating_pow(retry.min(16));
        Duration::from_millis(self.backoff_ms.saturating_mul(factor).min(self.max_backoff_ms))
    }
}

/// Run `op` under the retry policy.
///
/// Transient failures sleep and retry; permanent failures and shutdown
/// return immediately. The backoff sleep is cancellable through the
/// shutdown signal so a stopping relay never waits out a long delay.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    shutdown: &mut watch::Receiver<bool>,
    op_name: &str,
    mut op: F,
) -> RelayResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = RelayResult<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => {
                attempt += 1;
                if attempt >= policy.max_attempts {
                    return Err(err);
                }
                let delay = policy.delay(attempt - 1);
                debug!(op = op_name, attempt, ?delay, error = %err, "retrying after backoff");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown.changed() => return Err(RelayError::Shutdown),
                }
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            backoff_ms: 1000,
            max_backoff_ms: 30_000,
        };
        assert_eq!(policy.delay(0), Duration::from_millis(1000));
        assert_eq!(policy.delay(1), Duration::from_millis(2000));
        assert_eq!(policy.delay(2), Duration::from_millis(4000));
        assert_eq!(policy.delay(4), Duration::from_millis(16_000));
        // Capped
        assert_eq!(policy.delay(5), Duration::from_millis(30_000));
        assert_eq!(policy.delay(60), Duration::from_millis(30_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_then_succeeds() {
        let (_tx, mut rx) = watch::channel(false);
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = calls.clone();

        let result = with_retry(&RetryPolicy::default(), &mut rx, "test", move || {
            let calls = calls_in.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(RelayError::Transient("flaky".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let (_tx, mut rx) = watch::channel(false);
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = calls.clone();

        let result: RelayResult<()> =
            with_retry(&RetryPolicy::default(), &mut rx, "test", move || {
                let calls = calls_in.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(RelayError::Transient("down".into()))
                }
            })
            .await;

        assert!(matches!(result, Err(RelayError::Transient(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_fails_fast() {
        let (_tx, mut rx) = watch::channel(false);
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = calls.clone();

        let result: RelayResult<()> =
            with_retry(&RetryPolicy::default(), &mut rx, "test", move || {
                let calls = calls_in.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(RelayError::Permanent("revert".into()))
                }
            })
            .await;

        assert!(matches!(result, Err(RelayError::Permanent(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_backoff() {
        let (tx, mut rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            with_retry(&RetryPolicy::default(), &mut rx, "test", || async {
                Err::<(), _>(RelayError::Transient("down".into()))
            })
            .await
        });

        // Let the first failure land, then signal shutdown mid-backoff
        tokio::time::sleep(Duration::from_millis(10)).await;
        tx.send(true).unwrap();

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(RelayError::Shutdown)));
    }
}
