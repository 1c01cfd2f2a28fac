//! Bounded retry with exponential backoff and jitter.
//!
//! Shared by the translator and the asset fetcher. The delay before retry
//! number `n` (1-based) is:
//!
//! ```text
//! delay = min(base_delay * 2^(n-1), max_delay) + random_jitter(0..=jitter)
//! ```

use crate::error::{Error, Result};
use rand::{Rng, rng};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
}

impl Backoff {
    pub fn new(base_delay: Duration, max_delay: Duration, jitter: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            jitter,
        }
    }

    /// Same pause before every retry.
    pub fn constant(delay: Duration) -> Self {
        Self::new(delay, delay, Duration::ZERO)
    }

    /// Retry immediately.
    pub fn none() -> Self {
        Self::constant(Duration::ZERO)
    }

    pub fn delay_for(&self, attempt: usize) -> Duration {
        let shift = attempt.saturating_sub(1).min(16) as u32;
        let delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            delay
        } else {
            delay + Duration::from_millis(rng().random_range(0..=jitter_ms))
        }
    }
}

/// Run `op` up to `max_attempts` times, sleeping between failures.
///
/// `op` receives the 1-based attempt number. The last error is returned once
/// attempts are exhausted. With `max_attempts == 0`, `op` is never called.
///
/// # Arguments
///
/// * `what` - Label used in log lines
/// * `max_attempts` - Total calls allowed, first one included
/// * `backoff` - Delay schedule between failed calls
/// * `op` - The fallible operation
///
/// # Returns
///
/// The first `Ok`, or the error of the final attempt.
pub async fn retry_with_backoff<T, F, Fut>(
    what: &str,
    max_attempts: usize,
    backoff: &Backoff,
    mut op: F,
) -> Result<T>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    if max_attempts == 0 {
        warn!(what, "Zero attempts allowed; not calling");
        return Err(Error::Config(format!("{what}: zero attempts allowed")));
    }
    let total_t0 = Instant::now();
    let mut attempt = 0usize;

    loop {
        attempt += 1;
        let attempt_t0 = Instant::now();
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let elapsed_ms_attempt = attempt_t0.elapsed().as_millis();
                let elapsed_ms_total = total_t0.elapsed().as_millis();

                if attempt >= max_attempts {
                    error!(
                        what,
                        attempt,
                        max = max_attempts,
                        elapsed_ms_attempt,
                        elapsed_ms_total,
                        error = %e,
                        "Retries exhausted"
                    );
                    return Err(e);
                }

                let delay = backoff.delay_for(attempt);
                warn!(
                    what,
                    attempt,
                    max = max_attempts,
                    elapsed_ms_attempt,
                    elapsed_ms_total,
                    ?delay,
                    error = %e,
                    "Attempt failed; backing off"
                );
                sleep(delay).await;
            }
        }
    }
}
