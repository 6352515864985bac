//! Retry Logic with Exponential Backoff
//!
//! Input files are read through the sandbox, which never retries on its own.
//! This module wraps such reads so that transient OS failures (interrupted,
//! would-block, timed-out) get a few more attempts while everything else,
//! security rejections first of all, fails on the first try.
//!
//! Delays double from `initial_delay` up to `max_delay`, with ±50% jitter so
//! several input files failing together do not retry in lockstep.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use quarry_cli::retry::{RetryConfig, execute_with_retry};
//!
//! let config = RetryConfig::default();
//! let text = execute_with_retry(&config, "queries.txt", || async {
//!     Ok::<_, anyhow::Error>("queries".to_string())
//! })
//! .await?;
//! ```

use quarry_sandbox::FileSystemError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// How often and how patiently a failed input read is retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each one after.
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub jitter_enabled: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            jitter_enabled: true,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retries without any delay, for tests and scripted runs.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter_enabled: false,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter(mut self, enabled: bool) -> Self {
        self.jitter_enabled = enabled;
        self
    }

    /// Delay before retry number `attempt + 1` (0-indexed), without jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// [`RetryConfig::delay_for_attempt`] moved by up to ±50%.
    pub fn delay_for_attempt_with_jitter(&self, attempt: u32) -> Duration {
        let base_delay = self.delay_for_attempt(attempt);

        let base_ms = base_delay.as_millis() as f64;
        let jitter_range = base_ms * 0.5;
        if !self.jitter_enabled || jitter_range <= 0.0 {
            return base_delay;
        }

        let jitter = rand::rng().random_range(-jitter_range..jitter_range);
        Duration::from_millis((base_ms + jitter).max(0.0) as u64)
    }
}

/// Whether `err` wraps a sandbox failure that may clear up on its own.
///
/// Anything that is not a [`FileSystemError`] is treated as permanent.
pub fn is_retryable_error(err: &anyhow::Error) -> bool {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<FileSystemError>())
        .is_some_and(FileSystemError::is_retryable)
}

/// Run `operation` until it succeeds, fails permanently, or retries run out.
///
/// `input` names the file being loaded and only appears in log events. The
/// last error is returned once retries run out; a non-retryable error is
/// returned immediately.
pub async fn execute_with_retry<F, Fut, T>(
    config: &RetryConfig,
    input: &str,
    operation: F,
) -> Result<T, anyhow::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, anyhow::Error>>,
{
    let mut last_error: Option<anyhow::Error> = None;

    // Total attempts = 1 initial + max_retries
    let total_attempts = 1 + config.max_retries;

    for attempt in 0..total_attempts {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(err) => {
                if !is_retryable_error(&err) {
                    tracing::debug!(input, attempt = attempt + 1, error = %err, "non-retryable error");
                    return Err(err);
                }

                let retries_remaining = total_attempts.saturating_sub(attempt + 1);
                if retries_remaining == 0 {
                    last_error = Some(err);
                    break;
                }

                let delay = config.delay_for_attempt_with_jitter(attempt);

                tracing::debug!(
                    input,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    retries_remaining,
                    error = %err,
                    "retryable error"
                );

                tokio::time::sleep(delay).await;
                last_error = Some(err);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Retry exhausted with no error captured")))
}
