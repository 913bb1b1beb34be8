//! Retry-with-backoff combinator for transient engine failures.
//!
//! Licensing hiccups and call timeouts at the engine boundary are transient;
//! the same submission often succeeds a few seconds later. This module
//! factors the retry loop into one place so every call site shares the same
//! policy instead of hand-rolling its own loop.
//!
//! The sleep function is injectable so tests can run the full retry path
//! without wall-clock delays.

use std::time::Duration;
use tracing::warn;

/// Retry policy shared by all engine-boundary call sites.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first (minimum 1).
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(5),
        }
    }
}

/// Run `op` until it succeeds, the error is non-transient, or attempts run out.
///
/// `is_transient` classifies errors: non-transient errors abort the loop
/// immediately and are returned as-is. The last transient error is returned
/// when all attempts are exhausted.
pub fn retry_with_backoff<T, E, F, P>(policy: &RetryPolicy, is_transient: P, op: F) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut(u32) -> Result<T, E>,
    P: Fn(&E) -> bool,
{
    retry_with_backoff_using(policy, is_transient, op, std::thread::sleep)
}

/// As [`retry_with_backoff`], with an explicit sleep function.
pub fn retry_with_backoff_using<T, E, F, P, S>(
    policy: &RetryPolicy,
    is_transient: P,
    mut op: F,
    sleep: S,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut(u32) -> Result<T, E>,
    P: Fn(&E) -> bool,
    S: Fn(Duration),
{
    let attempts = policy.max_attempts.max(1);
    let mut last_err = None;
    for attempt in 1..=attempts {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(err) if is_transient(&err) => {
                if attempt < attempts {
                    warn!(
                        attempt,
                        max_attempts = attempts,
                        delay_s = policy.delay.as_secs_f64(),
                        "transient failure, retrying: {}",
                        err
                    );
                    sleep(policy.delay);
                }
                last_err = Some(err);
            }
            Err(err) => return Err(err),
        }
    }
    // attempts >= 1, so at least one op() ran and stored an error
    Err(last_err.unwrap())
}
