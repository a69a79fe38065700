//! Retry loop with multiplicative backoff.

use crate::error::FetchError;

use log::warn;
use std::future::Future;
use std::time::Duration;
use tokio::time;

/// Retry policy wrapping a single attempt: at most `tries` invocations,
/// sleeping `delay` between them and scaling the delay by `backoff` after
/// each failure.
#[derive(Debug, Clone, Copy)]
pub struct Retrier {
    tries: u32,
    delay: Duration,
    backoff: f64,
}

impl Default for Retrier {
    fn default() -> Self {
        Self::new(2, Duration::from_secs(1), 2.0)
    }
}

impl Retrier {
    /// A `tries` of zero is treated as one; the wrapped operation always
    /// runs at least once.
    pub fn new(tries: u32, delay: Duration, backoff: f64) -> Self {
        Self {
            tries: tries.max(1),
            delay,
            backoff,
        }
    }

    /// Run `op` until it succeeds or the attempt budget is spent. The error
    /// surfaced to the caller is the one raised by the last attempt;
    /// non-retryable errors propagate immediately without sleeping.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut remaining = self.tries;
        let mut delay = self.delay;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    remaining -= 1;
                    if remaining == 0 || !err.is_retryable() {
                        return Err(err);
                    }
                    warn!("{}, retrying in {:?}", err, delay);
                    time::sleep(delay).await;
                    delay = Duration::from_secs_f64(delay.as_secs_f64() * self.backoff);
                }
            }
        }
    }
}
