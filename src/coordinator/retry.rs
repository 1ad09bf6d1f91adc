use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::context::RequestContext;
use crate::observability;

use super::BookingError;

/// Bounded retry budget shared by conflict and transient-storage retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Zero is treated as one.
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    pub fn no_backoff(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    pub(super) fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay after the `attempt`-th failure (1-based): doubles each time, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Retry `op` on transient storage errors only, within the policy budget.
pub(super) async fn retry_transient<T, F, Fut>(
    ctx: &RequestContext,
    policy: &RetryPolicy,
    operation: &'static str,
    mut op: F,
) -> Result<T, BookingError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BookingError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Err(e) if e.is_transient() && attempt < policy.attempts() => {
                warn!("{operation}: {e}, retrying (attempt {attempt})");
                metrics::counter!(
                    observability::RETRIES_TOTAL,
                    "operation" => operation,
                    "reason" => "transient"
                )
                .increment(1);
                ctx.sleep(policy.backoff(attempt)).await?;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_doubles_and_caps() {
        let p = RetryPolicy {
            max_attempts: 5,
            base_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(35),
        };
        assert_eq!(p.backoff(1), Duration::from_millis(10));
        assert_eq!(p.backoff(2), Duration::from_millis(20));
        assert_eq!(p.backoff(3), Duration::from_millis(35));
        assert_eq!(p.backoff(40), Duration::from_millis(35));
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        assert_eq!(RetryPolicy::no_backoff(0).attempts(), 1);
    }

    #[tokio::test]
    async fn transient_errors_are_retried_up_to_budget() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let out: Result<(), _> = retry_transient(
            &RequestContext::background(),
            &RetryPolicy::no_backoff(3),
            "test",
            move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(BookingError::TransientStorage("busy".into()))
            },
        )
        .await;
        assert_eq!(out, Err(BookingError::TransientStorage("busy".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let out: Result<(), _> = retry_transient(
            &RequestContext::background(),
            &RetryPolicy::no_backoff(3),
            "test",
            move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(BookingError::Internal("boom".into()))
            },
        )
        .await;
        assert!(matches!(out, Err(BookingError::Internal(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recovers_after_transient_failure() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let out = retry_transient(
            &RequestContext::background(),
            &RetryPolicy::no_backoff(3),
            "test",
            move || async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(BookingError::TransientStorage("busy".into()))
                } else {
                    Ok(42)
                }
            },
        )
        .await;
        assert_eq!(out, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
