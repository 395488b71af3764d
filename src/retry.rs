//! Retry with exponential backoff
//!
//! Wraps the per-row API call. Transient failures are re-attempted on an
//! exponential schedule with optional jitter; terminal failures abort after
//! the first attempt. Every retry logs the operator-supplied context key so
//! log lines can be correlated back to CSV rows.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Backoff parameters for retried operations
pub struct RetryConfig {
    /// Maximum number of attempts, first call included
    pub max_attempts: u32,

    /// Initial wait time in milliseconds
    pub initial_backoff_ms: u64,

    /// Multiplier for each subsequent retry
    pub backoff_factor: f64,

    /// Maximum backoff time in milliseconds
    pub max_backoff_ms: u64,

    /// Whether to add jitter to backoff times
    pub add_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_backoff_ms: 250,
            backoff_factor: 2.0,
            max_backoff_ms: 60_000,
            add_jitter: true,
        }
    }
}

/// Executes a future with exponential backoff retry logic
///
/// Retries the operation while `is_retriable` approves the error, with
/// exponentially increasing delays between attempts capped at
/// `max_backoff_ms`. Jitter spreads coordinated retries apart.
///
/// # Arguments
/// * `operation` - An async function that returns a Result
/// * `is_retriable` - Determines whether an error should trigger a retry
/// * `config` - RetryConfig with backoff parameters
///
/// # Returns
/// * The successful result, or the last error once attempts are exhausted or
///   a non-retriable error is seen
pub async fn with_exponential_backoff<F, Fut, T, E, R>(
    operation: F,
    is_retriable: R,
    config: &RetryConfig,
) -> std::result::Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    R: Fn(&E) -> bool,
{
    let mut attempt = 0;
    let mut backoff_ms = config.initial_backoff_ms;

    loop {
        let result = operation().await;

        match &result {
            Ok(_) => return result,
            Err(err) => {
                attempt += 1;

                if attempt >= config.max_attempts || !is_retriable(err) {
                    return result;
                }

                let jitter_ms = if config.add_jitter {
                    let jitter_factor = rand::random::<f64>() * 0.2 + 0.9; // 0.9-1.1 range
                    (backoff_ms as f64 * jitter_factor) as u64
                } else {
                    backoff_ms
                };

                let delay = std::cmp::min(jitter_ms, config.max_backoff_ms);

                debug!(
                    "Retry attempt {}/{} after {}ms delay",
                    attempt, config.max_attempts, delay
                );

                sleep(Duration::from_millis(delay)).await;

                backoff_ms = (backoff_ms as f64 * config.backoff_factor) as u64;
                if backoff_ms > config.max_backoff_ms {
                    backoff_ms = config.max_backoff_ms;
                }
            }
        }
    }
}

/// Context-keyed retrier used by batch workers and single-verb handlers
///
/// Classification delegates to [`Error::is_retryable`]; the REST shim decides
/// what counts as transient when it maps HTTP responses to error kinds.
pub struct Retrier<'a> {
    config: &'a RetryConfig,
    context: &'a str,
}

impl<'a> Retrier<'a> {
    pub fn new(config: &'a RetryConfig, context: &'a str) -> Self {
        Self { config, context }
    }

    /// Drives an operation to a terminal outcome
    pub async fn run<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = std::sync::atomic::AtomicU32::new(0);
        let context = self.context;

        let result = with_exponential_backoff(
            || {
                attempts.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                operation()
            },
            |err: &Error| {
                let retryable = err.is_retryable();
                if retryable {
                    warn!("{} retryable failure: {}", context, err);
                }
                retryable
            },
            self.config,
        )
        .await;

        if result.is_err() {
            warn!(
                "{} giving up after {} attempt(s)",
                context,
                attempts.load(std::sync::atomic::Ordering::Relaxed)
            );
        }
        result
    }
}
