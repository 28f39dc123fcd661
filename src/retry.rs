//! Retry logic for transient submission failures
//!
//! The job client retries connection-level failures of the creation call a small, fixed
//! number of times. The delay schedule comes from [`RetryConfig`]: a multiplier of `1.0`
//! gives the fixed spacing used by the presets, larger values give exponential backoff.
//!
//! # Example
//!
//! ```no_run
//! use genjob::config::{HttpConfig, RetryConfig};
//! use genjob::retry::with_retry;
//! use genjob::transport::{HttpRequest, ReqwestTransport, Transport};
//!
//! # async fn example() -> genjob::Result<()> {
//! let transport = ReqwestTransport::new(&HttpConfig::default())?;
//! let response = with_retry(&RetryConfig::default(), || {
//!     transport.send(HttpRequest::get("https://api.replicate.com/v1/predictions/abc"))
//! })
//! .await?;
//! println!("HTTP {}", response.status);
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (connection refused, reset, timed out) should return `true`.
/// Permanent failures (rejected request, bad credentials, malformed input) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Connection(_) => true,
            Error::Network(e) => e.is_timeout() || e.is_connect(),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            // Rate limiting has its own single deferred retry in submit
            Error::RateLimited { .. } => false,
            // The retry budget is already spent
            Error::Transport { .. } => false,
            Error::InvalidRequest(_)
            | Error::Config { .. }
            | Error::RemoteRejected { .. }
            | Error::ArtifactUnavailable { .. }
            | Error::MalformedResponse(_)
            | Error::Serialization(_)
            | Error::Import(_) => false,
        }
    }
}

/// Execute an async operation, retrying transient failures
///
/// `config.max_attempts` counts every call, including the first: with the default of 3 the
/// operation runs at most three times. Non-retryable errors are returned immediately.
///
/// # Returns
///
/// Returns the successful result or the last error once attempts are exhausted.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying"
                );

                let wait = if config.jitter { add_jitter(delay) } else { delay };
                tokio::time::sleep(wait).await;

                attempt += 1;
                let next_delay =
                    Duration::try_from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier)
                        .unwrap_or(config.max_delay);
                delay = next_delay.min(config.max_delay);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::debug!(error = %e, "Operation failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Add random jitter to a delay
///
/// The result is uniformly distributed between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::try_from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor)).unwrap_or(delay)
}
