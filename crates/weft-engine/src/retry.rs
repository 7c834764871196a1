//! One retry policy type, parameterized per call site.
//!
//! The backend call, each chunk of a large input, each chunk of a batch and
//! the top-level orchestration all retry through [`RetryPolicy::run`]; they
//! differ only in attempt count, backoff and which errors are retryable.

use std::future::Future;
use std::time::Duration;

use tracing::warn;
use weft_core::config::{BackendConfig, RetryConfig};

use crate::error::EngineError;

/// Pause before retry number `n` (0-based): `initial * multiplier^n`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub multiplier: u32,
}

impl Backoff {
    pub fn none() -> Self {
        Self::fixed(Duration::ZERO)
    }

    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial: delay,
            multiplier: 1,
        }
    }

    pub fn exponential(initial: Duration, multiplier: u32) -> Self {
        Self {
            initial,
            multiplier,
        }
    }

    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(retry);
        self.initial.saturating_mul(factor)
    }
}

/// `{max_attempts, backoff, retryable}`.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,
    pub backoff: Backoff,
    pub retryable: fn(&EngineError) -> bool,
}

impl RetryPolicy {
    /// Backend call: any backend failure is retried, context-length never.
    pub fn call(config: &BackendConfig) -> Self {
        Self {
            max_attempts: config.retries + 1,
            backoff: Backoff::fixed(Duration::from_secs(1)),
            retryable: |e| matches!(e, EngineError::Backend(_)),
        }
    }

    /// One slice of a hard-split input.
    pub fn chunk(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.chunk_retries + 1,
            backoff: Backoff::fixed(Duration::from_secs(1)),
            retryable: is_recoverable,
        }
    }

    /// One chunk of a per-chunk batch run; the pause doubles as rate limiting.
    pub fn batch(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.chunk_retries + 1,
            backoff: Backoff::fixed(Duration::from_millis(config.batch_delay_ms)),
            retryable: is_recoverable,
        }
    }

    /// Whole-operation retry, transient failures only.
    pub fn orchestration(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.orchestration_retries + 1,
            backoff: Backoff::exponential(Duration::from_millis(config.initial_backoff_ms), 2),
            retryable: EngineError::is_transient,
        }
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts run out. `op` receives the 0-based attempt number.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, EngineError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, EngineError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt + 1 < attempts && (self.retryable)(&e) => {
                    let delay = self.backoff.delay_for(attempt);
                    warn!(
                        op = label,
                        attempt = attempt + 1,
                        of = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying after failure"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Errors a repeat of the same request cannot fix are excluded.
fn is_recoverable(err: &EngineError) -> bool {
    !matches!(
        err,
        EngineError::ContentTooLarge(_) | EngineError::PatternNotFound(_) | EngineError::NoContent
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, FailureReason};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn transient() -> EngineError {
        EngineError::Backend(BackendError::new(FailureReason::ConnectionReset, "reset"))
    }

    fn fatal() -> EngineError {
        EngineError::Backend(BackendError::new(FailureReason::Other, "bad request"))
    }

    #[test]
    fn test_backoff_schedule() {
        let b = Backoff::exponential(Duration::from_secs(2), 2);
        assert_eq!(b.delay_for(0), Duration::from_secs(2));
        assert_eq!(b.delay_for(1), Duration::from_secs(4));
        assert_eq!(b.delay_for(2), Duration::from_secs(8));
        assert_eq!(Backoff::fixed(Duration::from_millis(500)).delay_for(3), Duration::from_millis(500));
        assert_eq!(Backoff::none().delay_for(1), Duration::ZERO);
    }

    #[test]
    fn test_policies_from_config() {
        let retry = RetryConfig::default();
        let orchestration = RetryPolicy::orchestration(&retry);
        assert_eq!(orchestration.max_attempts, 3);
        assert_eq!(orchestration.backoff.initial, Duration::from_secs(2));
        assert!((orchestration.retryable)(&transient()));
        assert!(!(orchestration.retryable)(&fatal()));

        let chunk = RetryPolicy::chunk(&retry);
        assert_eq!(chunk.max_attempts, 2);
        assert!((chunk.retryable)(&fatal()));
        assert!(!(chunk.retryable)(&EngineError::ContentTooLarge("x".into())));

        let call = RetryPolicy::call(&BackendConfig::default());
        assert_eq!(call.max_attempts, 3);
        assert!(!(call.retryable)(&EngineError::ContentTooLarge("x".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_retries_then_succeeds() {
        let policy = RetryPolicy::orchestration(&RetryConfig::default());
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result = policy
            .run("test", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        Err(transient())
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 2s then 4s of backoff
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(6) && elapsed < Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_non_retryable() {
        let policy = RetryPolicy::orchestration(&RetryConfig::default());
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = policy
            .run("test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(fatal()) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_exhausts_attempts() {
        let policy = RetryPolicy {
            max_attempts: 2,
            backoff: Backoff::none(),
            retryable: |_| true,
        };
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = policy
            .run("test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(transient()) }
            })
            .await;
        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
