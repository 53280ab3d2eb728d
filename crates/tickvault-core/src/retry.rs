//! Bounded retry with fixed or exponential backoff.
//!
//! Every fetch path in the crate funnels external calls through [`retry`].
//! The classifier lives on [`FetchError`]: retryable errors sleep and try
//! again, terminal errors abort at once, and exhaustion is returned as a
//! value rather than thrown past the caller.

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::time::Duration;

use crate::FetchError;

/// Backoff strategy between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Uses a fixed delay between retries.
    Fixed {
        /// Delay between retries.
        delay: Duration,
    },
    /// Uses an exponential delay between retries.
    ///
    /// The delay is calculated as `base * (factor ^ attempt)`.
    Exponential {
        /// The initial backoff duration.
        base: Duration,
        /// The multiplicative factor for each subsequent retry.
        factor: f64,
        /// The maximum duration to wait between retries.
        max: Duration,
        /// Whether to apply random jitter (+/- 50%) to the delay.
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Fixed {
            delay: Duration::from_secs(2),
        }
    }
}

impl Backoff {
    /// Calculate the delay for a given retry attempt (0-based).
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let scale = factor.powi(attempt as i32);
                let seconds = base.as_secs_f64() * scale;
                let capped_seconds = seconds.min(max.as_secs_f64());

                let mut delay = Duration::from_secs_f64(capped_seconds);

                // Apply jitter: +/- 50% of the delay
                if jitter {
                    let jitter_ms = (delay.as_millis() as f64 * 0.5) as u64;
                    let random_offset = fastrand::u64(0..=(jitter_ms * 2));
                    let total_ms =
                        delay.as_millis() as i64 + (random_offset as i64 - jitter_ms as i64);
                    delay = Duration::from_millis(total_ms.max(0) as u64);
                }

                delay
            }
        }
    }
}

/// Attempt budget and backoff for one class of external call.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first. Clamped to at least one.
    pub max_attempts: u32,
    /// The backoff strategy to use between attempts.
    pub backoff: Backoff,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::default(),
        }
    }
}

impl RetryConfig {
    /// Fixed backoff with the given delay and attempt budget.
    pub fn fixed(delay: Duration, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed { delay },
        }
    }

    /// Exponential backoff with jittered delays and the given attempt budget.
    pub fn exponential(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Exponential {
                base: Duration::from_millis(500),
                factor: 2.0,
                max: Duration::from_secs(30),
                jitter: true,
            },
        }
    }

    /// A single attempt, no backoff.
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            backoff: Backoff::default(),
        }
    }
}

/// Why a retried operation ultimately failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryFailure {
    /// The last error observed.
    pub error: FetchError,
    /// How many attempts were made before giving up.
    pub attempts: u32,
    /// True when the attempt budget ran out; false when a terminal error
    /// aborted the loop early.
    pub exhausted: bool,
}

impl Display for RetryFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.exhausted {
            write!(
                f,
                "gave up after {} attempt(s): {}",
                self.attempts, self.error
            )
        } else {
            write!(
                f,
                "aborted on attempt {} (not retryable): {}",
                self.attempts, self.error
            )
        }
    }
}

impl std::error::Error for RetryFailure {}

/// Run `operation` under the config's attempt budget.
///
/// Emits one tracing event per attempt. Failure is a normal return value;
/// nothing escapes this boundary as a panic or untyped error.
pub async fn retry<T, F, Fut>(
    label: &str,
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, RetryFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let budget = config.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => {
                tracing::debug!(label, attempt, "call succeeded");
                return Ok(value);
            }
            Err(error) if !error.retryable() => {
                tracing::warn!(label, attempt, %error, "call failed with terminal error");
                return Err(RetryFailure {
                    error,
                    attempts: attempt,
                    exhausted: false,
                });
            }
            Err(error) if attempt >= budget => {
                tracing::warn!(label, attempt, %error, "retry budget exhausted");
                return Err(RetryFailure {
                    error,
                    attempts: attempt,
                    exhausted: true,
                });
            }
            Err(error) => {
                let delay = config.backoff.delay(attempt - 1);
                tracing::warn!(
                    label,
                    attempt,
                    backoff_ms = delay.as_millis() as u64,
                    %error,
                    "call failed; backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
