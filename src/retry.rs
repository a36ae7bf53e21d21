use std::future::Future;
use std::time::Duration;

use crate::error::ClientResult;

/// Fixed-interval retry budget. The decryption network's latency is
/// bounded by its SLA, so there is no backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Reference budget for decryption readiness: 20 attempts, 5 s apart.
    pub const fn reveal_default() -> Self {
        Self::new(20, Duration::from_secs(5))
    }
}

/// Run `attempt` until it yields a value or the budget is exhausted.
/// `Ok(None)` means the budget ran out, which is not an error; errors from
/// the attempt itself propagate immediately.
pub async fn poll_until<T, F, Fut>(policy: RetryPolicy, mut attempt: F) -> ClientResult<Option<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = ClientResult<Option<T>>>,
{
    for round in 0..policy.max_attempts {
        if let Some(value) = attempt(round).await? {
            return Ok(Some(value));
        }
        if round + 1 < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }
    Ok(None)
}
