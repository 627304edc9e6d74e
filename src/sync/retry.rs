use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Bounded retry with a fixed pause between attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first try included. Treated as at least 1.
    pub attempts: u32,
    pub delay: Duration,
}

/// The last error of a retried operation that never succeeded.
#[derive(Debug)]
pub struct Exhausted<E> {
    /// Attempts actually made; fewer than the budget if cancelled.
    pub attempts: u32,
    pub last_error: E,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    pub fn max_attempts(&self) -> u32 {
        self.attempts.max(1)
    }

    /// Sleep before attempt `next_attempt`. Returns false, without waiting
    /// out the delay, if the token is cancelled first.
    pub async fn pause(&self, next_attempt: u32, cancel: &CancellationToken) -> bool {
        debug!(next_attempt, delay_ms = self.delay.as_millis() as u64, "Waiting before retry");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.delay) => true,
        }
    }

    /// Run `op` until it succeeds or the budget is spent.
    ///
    /// `op` receives the 1-based attempt number. Cancellation stops further
    /// attempts; the attempt in progress is not interrupted.
    pub async fn run<T, E, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, Exhausted<E>>
    where
        E: Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    debug!(attempt, error = %err, "Attempt failed");
                    if attempt >= self.max_attempts() || !self.pause(attempt + 1, cancel).await {
                        return Err(Exhausted {
                            attempts: attempt,
                            last_error: err,
                        });
                    }
                    attempt += 1;
                }
            }
        }
    }
}
