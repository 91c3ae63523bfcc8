//! Whole-run retry for imports whose document store went away.
//!
//! Only [`ImportError::StoreUnavailable`] is retried. Upserts are idempotent,
//! so re-running a half-finished import converges on the same state.

use std::future::Future;
use std::time::Duration;

use crate::error::ImportError;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_secs(1),
        }
    }

    /// Exponential backoff: base, 2×base, 4×base, … capped at 32×base.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * (1u32 << (attempt.saturating_sub(1)).min(5))
    }
}

pub async fn with_store_retries<T, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, ImportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ImportError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Err(ImportError::StoreUnavailable(err)) if attempt < policy.max_retries => {
                attempt += 1;
                let delay = policy.delay(attempt);
                log::warn!(
                    "document store unavailable ({:#}); retry {}/{} in {:?}",
                    err,
                    attempt,
                    policy.max_retries,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            result => return result,
        }
    }
}
