//! Retry manager for handling transient failures with exponential backoff
//!
//! Every logical operation gets a fixed time budget. Attempts are repeated
//! while the error classifies as retryable and the next wait still fits in the
//! budget. Rate-limit hints from the server are honored before the regular
//! backoff, and every wait is cut short when the cancellation token fires.

use crate::config::RetryConfig;
use crate::error::{ApiError, DownloadError, RetryableError};
use rand::Rng;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Marker returned when a retry loop is interrupted by cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl From<Cancelled> for ApiError {
    fn from(_: Cancelled) -> Self {
        ApiError::Cancelled
    }
}

impl From<Cancelled> for DownloadError {
    fn from(_: Cancelled) -> Self {
        DownloadError::Cancelled
    }
}

/// Retry manager with exponential backoff support
#[derive(Debug, Clone)]
pub struct RetryManager {
    config: RetryConfig,
}

impl RetryManager {
    /// Create a new RetryManager with the given configuration
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Create a RetryManager with default configuration
    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    /// Execute an async operation with retry logic
    ///
    /// The operation is retried while it returns a retryable error and the
    /// elapsed time plus the next wait stays within `max_elapsed_ms`. Once the
    /// budget is spent the last error is returned. A cancelled token aborts
    /// the in-flight attempt or the current wait and yields `E::from(Cancelled)`.
    pub async fn execute<F, Fut, T, E>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError + From<Cancelled> + std::fmt::Display,
    {
        let started = Instant::now();
        let budget = Duration::from_millis(self.config.max_elapsed_ms);
        let mut attempt = 0u32;

        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Cancelled.into()),
                result = operation() => result,
            };

            let err = match result {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_retryable() {
                return Err(err);
            }

            let cooldown = err.cooldown().unwrap_or_default();
            let backoff = self.calculate_backoff(attempt);
            let wait = cooldown.saturating_add(backoff);

            if started.elapsed().saturating_add(wait) > budget {
                warn!(
                    attempts = attempt + 1,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    max_elapsed_ms = self.config.max_elapsed_ms,
                    error = %err,
                    "Retry budget exhausted"
                );
                return Err(err);
            }

            if !cooldown.is_zero() {
                info!(
                    wait_ms = cooldown.as_millis() as u64,
                    "Rate limited, waiting before retrying"
                );
            }
            debug!(
                attempt = attempt + 1,
                backoff_ms = backoff.as_millis() as u64,
                error = %err,
                "Retrying after transient error"
            );

            if !pause(wait, cancel).await {
                return Err(Cancelled.into());
            }
            attempt += 1;
        }
    }

    /// Calculate backoff duration for a given attempt number
    ///
    /// Uses exponential backoff: initial_backoff * multiplier^attempt
    /// Capped at max_backoff_ms with optional jitter
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let base = self.config.initial_backoff_ms as f64
            * self.config.backoff_multiplier.powi(attempt as i32);
        let capped = base.min(self.config.max_backoff_ms as f64);

        let delay_ms = if self.config.jitter {
            // Add jitter: 50-100% of the calculated backoff
            let jitter = rand::thread_rng().gen_range(0.5..1.0);
            capped * jitter
        } else {
            capped
        };

        Duration::from_secs_f64(delay_ms / 1000.0)
    }

    /// Get the retry configuration
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

/// Sleep for `duration` unless cancelled first; returns false on cancellation
pub(crate) async fn pause(duration: Duration, cancel: &CancellationToken) -> bool {
    if duration.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
