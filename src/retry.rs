//! Retry Executor
//!
//! Re-invokes a failing unit of work with exponential backoff. Between
//! failed attempt `i` and attempt `i + 1` the executor waits
//! `2^i * base_delay`; no wait follows the final attempt.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::classify::classify;
use crate::error::{RequestError, Result};

/// Backoff base used when none is configured.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Retries used when a request does not specify its own.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

// == Retry Gate ==
/// Which failures the executor is allowed to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetryGate {
    /// Only failures classified as retryable
    #[default]
    RetryableOnly,
    /// Every failure, up to the retry cap
    Always,
}

// == Retry Policy ==
/// Attempt cap and backoff shape for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub gate: RetryGate,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            gate: RetryGate::default(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_gate(mut self, gate: RetryGate) -> Self {
        self.gate = gate;
        self
    }

    /// Wait inserted after failed attempt `attempt` (0-indexed).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Whether `error` may be retried under this policy's gate.
    pub fn permits(&self, error: &RequestError) -> bool {
        match self.gate {
            RetryGate::Always => true,
            RetryGate::RetryableOnly => classify(error).retryable,
        }
    }
}

// == Retry Context ==
/// Cancellation and deadline bounds for one request.
///
/// Both are checked before every attempt and raced against the attempt
/// itself and against every backoff wait.
#[derive(Debug, Clone, Default)]
pub struct RetryContext {
    cancel: Option<CancellationToken>,
    deadline: Option<(Instant, Duration)>,
}

impl RetryContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Bounds the whole request, retries and waits included, to `budget` from now.
    ///
    /// A budget reaching past the clock's range leaves the request unbounded.
    pub fn with_deadline(mut self, budget: Duration) -> Self {
        self.deadline = Instant::now().checked_add(budget).map(|at| (at, budget));
        self
    }

    fn check(&self) -> Result<()> {
        if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
            return Err(RequestError::Cancelled);
        }
        if let Some((at, budget)) = self.deadline {
            if Instant::now() >= at {
                return Err(RequestError::DeadlineExceeded(budget));
            }
        }
        Ok(())
    }

    /// Runs `fut` unless cancellation or the deadline wins the race first.
    async fn guard<F: Future>(&self, fut: F) -> Result<F::Output> {
        let cancelled = async {
            match &self.cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some((at, _)) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Err(RequestError::Cancelled),
            _ = expired => Err(RequestError::DeadlineExceeded(
                self.deadline.map(|(_, budget)| budget).unwrap_or_default(),
            )),
            out = fut => Ok(out),
        }
    }
}

// == Run With Retry ==
/// Runs `operation` up to `policy.max_retries + 1` times.
///
/// The last observed failure is returned unchanged once attempts are
/// exhausted or the gate refuses a retry. Cancellation and deadline
/// expiry end the loop immediately and are never retried.
pub async fn run_with_retry<F, Fut, T>(
    mut operation: F,
    policy: &RetryPolicy,
    ctx: &RetryContext,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;

    loop {
        ctx.check()?;

        let error = match ctx.guard(operation()).await? {
            Ok(value) => {
                if attempt > 0 {
                    debug!("Operation succeeded after {} attempts", attempt + 1);
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        if attempt >= policy.max_retries {
            if policy.max_retries > 0 {
                warn!(
                    "Max retries ({}) exceeded. Last error: {}",
                    policy.max_retries, error
                );
            }
            return Err(error);
        }

        if !policy.permits(&error) {
            debug!("Non-retryable error: {}", error);
            return Err(error);
        }

        let delay = policy.backoff(attempt);
        warn!(
            attempt = attempt + 1,
            ?delay,
            "Attempt failed: {}. Retrying...",
            error
        );
        ctx.guard(tokio::time::sleep(delay)).await?;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Operation failing with `error` for the first `failures` calls.
    fn flaky(
        failures: u32,
        error: RequestError,
        calls: Arc<AtomicU32>,
    ) -> impl FnMut() -> futures::future::Ready<Result<&'static str>> {
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < failures {
                futures::future::ready(Err(error.clone()))
            } else {
                futures::future::ready(Ok("done"))
            }
        }
    }

    #[test]
    fn test_backoff_doubles_from_base() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(3), Duration::from_secs(8));
    }

    #[test]
    fn test_backoff_saturates() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(64), Duration::from_secs(1).saturating_mul(u32::MAX));
    }

    #[test]
    fn test_gate() {
        let classified = RetryPolicy::default();
        assert!(classified.permits(&RequestError::status(503, "busy")));
        assert!(!classified.permits(&RequestError::status(404, "gone")));

        let blind = RetryPolicy::default().with_gate(RetryGate::Always);
        assert!(blind.permits(&RequestError::status(404, "gone")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_shape_before_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let op = flaky(3, RequestError::status(503, "busy"), calls.clone());

        let start = Instant::now();
        let result = run_with_retry(op, &RetryPolicy::new(3), &RetryContext::new()).await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // 1s + 2s + 4s
        assert_eq!(start.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let op = move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(Err::<(), _>(RequestError::status(500, format!("attempt {}", n))))
        };

        let start = Instant::now();
        let result = run_with_retry(op, &RetryPolicy::new(2), &RetryContext::new()).await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result, Err(RequestError::status(500, "attempt 2")));
        // no wait after the final attempt
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_is_single_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let op = flaky(5, RequestError::status(503, "busy"), calls.clone());

        let start = Instant::now();
        let result = run_with_retry(op, &RetryPolicy::new(0), &RetryContext::new()).await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_fails_fast() {
        let calls = Arc::new(AtomicU32::new(0));
        let op = flaky(5, RequestError::status(401, "expired"), calls.clone());

        let result = run_with_retry(op, &RetryPolicy::new(3), &RetryContext::new()).await;

        assert_eq!(result, Err(RequestError::status(401, "expired")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blind_gate_retries_everything() {
        let calls = Arc::new(AtomicU32::new(0));
        let op = flaky(2, RequestError::status(404, "gone"), calls.clone());
        let policy = RetryPolicy::new(3).with_gate(RetryGate::Always);

        let result = run_with_retry(op, &policy, &RetryContext::new()).await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let calls = Arc::new(AtomicU32::new(0));
        let op = flaky(10, RequestError::status(503, "busy"), calls.clone());
        let token = CancellationToken::new();
        let ctx = RetryContext::new().with_cancel(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            token.cancel();
        });

        let result = run_with_retry(op, &RetryPolicy::new(5), &ctx).await;
        canceller.await.unwrap();

        assert_eq!(result, Err(RequestError::Cancelled));
        // attempt 0 at t=0, attempt 1 at t=1s, cancelled during the 2s wait
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_cancelled_never_runs() {
        let calls = Arc::new(AtomicU32::new(0));
        let op = flaky(0, RequestError::Cancelled, calls.clone());
        let token = CancellationToken::new();
        token.cancel();

        let result = run_with_retry(op, &RetryPolicy::new(3), &RetryContext::new().with_cancel(token)).await;

        assert_eq!(result, Err(RequestError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_bounds_slow_attempt() {
        let ctx = RetryContext::new().with_deadline(Duration::from_secs(2));
        let op = || async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, RequestError>(())
        };

        let start = Instant::now();
        let result = run_with_retry(op, &RetryPolicy::new(3), &ctx).await;

        assert_eq!(result, Err(RequestError::DeadlineExceeded(Duration::from_secs(2))));
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_beyond_clock_range_is_unbounded() {
        let calls = Arc::new(AtomicU32::new(0));
        let op = flaky(1, RequestError::status(503, "busy"), calls.clone());
        let ctx = RetryContext::new().with_deadline(Duration::MAX);

        let policy = RetryPolicy::new(3).with_base_delay(Duration::from_millis(10));
        let result = run_with_retry(op, &policy, &ctx).await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
