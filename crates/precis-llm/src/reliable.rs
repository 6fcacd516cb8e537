use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use precis_core::{BackendError, InferenceBackend};
use precis_settings::RetrySettings;

use crate::rate_limit::RateLimiter;

/// Backoff policy for transient backend rejections.
#[derive(Clone, Debug)]
pub struct ReliableConfig {
    /// Delay before the first retry; doubles on each further retry.
    pub base_delay: Duration,
    /// Cumulative backoff sleep allowed for one call.
    pub max_backoff: Duration,
    pub jitter_factor: f64,
}

impl Default for ReliableConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_backoff: Duration::from_secs(300),
            jitter_factor: 0.0,
        }
    }
}

impl ReliableConfig {
    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self {
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_backoff: Duration::from_secs(settings.max_backoff_secs),
            jitter_factor: settings.jitter_factor,
        }
    }
}

/// Wraps an [`InferenceBackend`] with the shared rate window and retry logic.
///
/// - Every attempt first takes a slot from the [`RateLimiter`] (waiting if needed)
/// - Transient errors retry with exponential backoff, honoring `retry_after` hints
/// - Each sleep is clamped to what is left of `max_backoff`; once it is spent the
///   call fails with [`BackendError::BackoffExhausted`]
/// - Permanent errors are returned on the first occurrence
pub struct ReliableBackend<B: InferenceBackend> {
    inner: B,
    limiter: Arc<RateLimiter>,
    config: ReliableConfig,
    total_retries: AtomicU64,
}

impl<B: InferenceBackend> ReliableBackend<B> {
    pub fn new(inner: B, limiter: Arc<RateLimiter>, config: ReliableConfig) -> Self {
        Self {
            inner,
            limiter,
            config,
            total_retries: AtomicU64::new(0),
        }
    }

    pub fn total_retries(&self) -> u64 {
        self.total_retries.load(Ordering::Relaxed)
    }

    /// Delay for the retry following zero-based `attempt`: `base * 2^attempt`,
    /// jittered, raised to the server's hint when one is given.
    fn retry_delay(&self, attempt: u32, suggested: Option<Duration>) -> Duration {
        let base_ms = self.config.base_delay.as_millis() as f64;
        let exp_ms = base_ms * 2.0_f64.powi(attempt.min(62) as i32);

        let jitter_ms = if self.config.jitter_factor > 0.0 {
            let spread = exp_ms * self.config.jitter_factor;
            (rand::random::<f64>() * 2.0 - 1.0) * spread
        } else {
            0.0
        };
        let delay = Duration::from_millis((exp_ms + jitter_ms).max(0.0) as u64);

        match suggested {
            Some(hint) => delay.max(hint),
            None => delay,
        }
    }
}

#[async_trait]
impl<B: InferenceBackend> InferenceBackend for ReliableBackend<B> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn invoke(&self, prompt: &str, max_output_tokens: u32) -> Result<String, BackendError> {
        let mut attempt: u32 = 0;
        let mut waited = Duration::ZERO;

        loop {
            let throttled = self.limiter.acquire().await;
            if !throttled.is_zero() {
                debug!(
                    backend = self.inner.name(),
                    throttled_ms = throttled.as_millis() as u64,
                    "call delayed by local rate limit"
                );
            }

            let err = match self.inner.invoke(prompt, max_output_tokens).await {
                Ok(text) => return Ok(text),
                Err(e) => e,
            };

            if !err.is_transient() {
                return Err(err);
            }

            let remaining = self.config.max_backoff.saturating_sub(waited);
            if remaining.is_zero() {
                error!(
                    backend = self.inner.name(),
                    attempts = attempt + 1,
                    waited_secs = waited.as_secs_f64(),
                    error = %err,
                    "giving up after backoff budget exhausted"
                );
                return Err(BackendError::BackoffExhausted {
                    attempts: attempt + 1,
                    waited,
                    last: Box::new(err),
                });
            }

            let delay = self.retry_delay(attempt, err.suggested_delay()).min(remaining);
            attempt += 1;
            self.total_retries.fetch_add(1, Ordering::Relaxed);

            warn!(
                backend = self.inner.name(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                error_kind = err.error_kind(),
                error = %err,
                "backing off {:.1}s after {} tries",
                delay.as_secs_f64(),
                attempt
            );

            tokio::time::sleep(delay).await;
            waited += delay;
        }
    }
}
