//! Bounded exponential-backoff retry, applied explicitly at call sites.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Attempt/backoff schedule for one class of external call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
}

impl RetryPolicy {
    /// Registry detail lookups: 3 attempts, 1 s, 2 s.
    pub fn registry() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 2,
        }
    }

    /// Published-document resolution: 5 attempts, 2 s up to 16 s.
    pub fn resolver() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            multiplier: 2,
        }
    }

    /// Backoff before attempt `n` (attempts are zero-indexed; no delay
    /// precedes attempt 0).
    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.base_delay * self.multiplier.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Run `op` until it succeeds, the error is not transient, or the policy is
/// exhausted. Non-transient errors are returned immediately without sleeping;
/// the final transient error is returned once attempts run out, for the call
/// site to map (the registry wrapper turns it into a null record).
pub async fn retry_with_backoff<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    is_transient: P,
    mut op: F,
) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        if attempt > 0 {
            tokio::time::sleep(policy.delay_before(attempt)).await;
        }
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if is_transient(&e) => {
                attempt += 1;
                if attempt >= policy.max_attempts {
                    warn!(attempts = attempt, error = %e, "Retries exhausted");
                    return Err(e);
                }
                warn!(attempt, error = %e, "Transient error, backing off");
            }
            Err(e) => return Err(e),
        }
    }
}
