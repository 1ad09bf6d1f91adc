//! Per-request deadline and cancellation.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::coordinator::BookingError;

/// Carried through every coordinator operation. Each repository call and each
/// retry backoff is bounded by it.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl RequestContext {
    /// No deadline, never cancelled unless the token is triggered.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().deadline_at(Instant::now() + timeout)
    }

    pub fn deadline_at(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run `fut` unless the deadline passes or the token fires first.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, BookingError> {
        if self.cancel.is_cancelled() {
            return Err(BookingError::Cancelled);
        }
        // timeout_at polls the future once before looking at the clock
        if self.deadline.is_some_and(|d| d <= Instant::now()) {
            return Err(BookingError::Timeout);
        }
        let bounded = async {
            match self.deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, fut)
                    .await
                    .map_err(|_| BookingError::Timeout),
                None => Ok(fut.await),
            }
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(BookingError::Cancelled),
            out = bounded => out,
        }
    }

    pub async fn sleep(&self, duration: Duration) -> Result<(), BookingError> {
        if duration.is_zero() {
            return if self.cancel.is_cancelled() {
                Err(BookingError::Cancelled)
            } else {
                Ok(())
            };
        }
        self.run(tokio::time::sleep(duration)).await
    }
}
