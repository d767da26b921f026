//! Request deadlines
//!
//! A [`Deadline`] is the single time budget for one snapshot request. Every
//! awaited browser round trip runs through [`Deadline::run`], so expiry or an
//! explicit [`Deadline::cancel`] stops the request at the next suspension
//! point and the caller's cleanup path takes over.

use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Overall time budget shared by every step of a request
#[derive(Debug, Clone)]
pub struct Deadline {
    started: Instant,
    expires_at: Instant,
    token: CancellationToken,
}

impl Deadline {
    /// Deadline expiring `budget` from now
    pub fn after(budget: Duration) -> Self {
        let started = Instant::now();
        Self {
            started,
            expires_at: started + budget,
            token: CancellationToken::new(),
        }
    }

    /// Deadline expiring `ms` milliseconds from now
    pub fn after_ms(ms: u64) -> Self {
        Self::after(Duration::from_millis(ms))
    }

    /// Time left before expiry (zero once expired)
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    /// Total budget in milliseconds
    pub fn budget_ms(&self) -> u64 {
        self.expires_at.duration_since(self.started).as_millis() as u64
    }

    /// Whether the deadline passed or was cancelled
    pub fn is_expired(&self) -> bool {
        self.token.is_cancelled() || Instant::now() >= self.expires_at
    }

    /// Cancel every step sharing this deadline
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// A deadline that ends no later than this one and shares its token.
    pub fn child(&self, budget: Duration) -> Self {
        let now = Instant::now();
        Self {
            started: now,
            expires_at: (now + budget).min(self.expires_at),
            token: self.token.child_token(),
        }
    }

    /// Run `fut` against this deadline.
    ///
    /// Returns `Error::DeadlineExceeded` if the deadline expires or is
    /// cancelled first; `fut` is dropped at that point.
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.is_expired() {
            return Err(Error::DeadlineExceeded(self.budget_ms()));
        }

        tokio::select! {
            biased;
            _ = self.token.cancelled() => {
                debug!("Deadline cancelled");
                Err(Error::DeadlineExceeded(self.budget_ms()))
            }
            _ = tokio::time::sleep_until(self.expires_at) => {
                debug!("Deadline of {}ms expired", self.budget_ms());
                Err(Error::DeadlineExceeded(self.budget_ms()))
            }
            res = fut => res,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_completes_within_budget() {
        let deadline = Deadline::after_ms(1_000);
        let value = deadline.run(async { Ok(42) }).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_expires() {
        let deadline = Deadline::after_ms(50);
        let result: Result<()> = deadline
            .run(async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(Error::DeadlineExceeded(50))));
        assert!(deadline.is_expired());
    }

    #[tokio::test]
    async fn test_cancel_propagates_to_child() {
        let parent = Deadline::after_ms(60_000);
        let child = parent.child(Duration::from_secs(30));
        parent.cancel();
        assert!(child.is_expired());
        let result: Result<()> = child.run(async { Ok(()) }).await;
        assert!(matches!(result, Err(Error::DeadlineExceeded(_))));
    }

    #[tokio::test]
    async fn test_child_never_outlives_parent() {
        let parent = Deadline::after_ms(100);
        let child = parent.child(Duration::from_secs(60));
        assert!(child.remaining() <= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_inner_error_passes_through() {
        let deadline = Deadline::after_ms(1_000);
        let result: Result<()> = deadline
            .run(async { Err(Error::config("bad")) })
            .await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
