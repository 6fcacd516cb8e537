use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use precis_settings::RateLimitSettings;
use tokio::time::Instant;
use tracing::debug;

/// Call ceiling over a rolling period.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub call_ceiling: usize,
    pub period: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            call_ceiling: 20,
            period: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    pub fn from_settings(settings: &RateLimitSettings) -> Self {
        Self {
            call_ceiling: settings.call_ceiling,
            period: Duration::from_secs(settings.period_secs),
        }
    }
}

/// Point-in-time view of the rate window.
#[derive(Clone, Debug)]
pub struct RateBudget {
    pub call_ceiling: usize,
    pub period: Duration,
    /// Timestamp of the oldest call still inside the window.
    pub window_start: Option<Instant>,
    pub calls_in_window: usize,
}

impl RateBudget {
    pub fn remaining(&self) -> usize {
        self.call_ceiling.saturating_sub(self.calls_in_window)
    }
}

/// Process-wide call budget shared by every backend wrapper that holds it.
///
/// Keeps the timestamps of the calls made in the last `period`; a caller that
/// would exceed `call_ceiling` inside any rolling window of that length waits
/// until the oldest call ages out. Callers are never rejected.
///
/// The check-and-record step runs under one mutex so concurrent callers cannot
/// both take the last slot. The lock is never held across an await.
pub struct RateLimiter {
    config: RateLimitConfig,
    calls: Mutex<VecDeque<Instant>>,
    throttled: AtomicU64,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let config = RateLimitConfig {
            call_ceiling: config.call_ceiling.max(1),
            ..config
        };
        Self {
            calls: Mutex::new(VecDeque::with_capacity(config.call_ceiling)),
            config,
            throttled: AtomicU64::new(0),
        }
    }

    pub fn shared(config: RateLimitConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Take a slot if one is free now; otherwise return how long until the
    /// oldest call leaves the window.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        let now = Instant::now();
        let mut calls = self.calls.lock();
        while let Some(&oldest) = calls.front() {
            if now.duration_since(oldest) >= self.config.period {
                calls.pop_front();
            } else {
                break;
            }
        }

        if calls.len() < self.config.call_ceiling {
            calls.push_back(now);
            return Ok(());
        }

        let oldest = calls.front().copied().unwrap_or(now);
        Err(self.config.period.saturating_sub(now.duration_since(oldest)))
    }

    /// Wait until a slot is free, take it, and return how long the caller waited.
    pub async fn acquire(&self) -> Duration {
        let started = Instant::now();
        let mut counted = false;
        loop {
            match self.try_acquire() {
                Ok(()) => return started.elapsed(),
                Err(wait) => {
                    if !counted {
                        self.throttled.fetch_add(1, Ordering::Relaxed);
                        counted = true;
                    }
                    debug!(
                        wait_ms = wait.as_millis() as u64,
                        call_ceiling = self.config.call_ceiling,
                        period_secs = self.config.period.as_secs(),
                        "rate window full, waiting for a slot"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Number of acquisitions that had to wait.
    pub fn throttled_calls(&self) -> u64 {
        self.throttled.load(Ordering::Relaxed)
    }

    pub fn budget(&self) -> RateBudget {
        let now = Instant::now();
        let calls = self.calls.lock();
        let live: Vec<Instant> = calls
            .iter()
            .copied()
            .filter(|t| now.duration_since(*t) < self.config.period)
            .collect();
        RateBudget {
            call_ceiling: self.config.call_ceiling,
            period: self.config.period,
            window_start: live.first().copied(),
            calls_in_window: live.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(ceiling: usize, period_secs: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            call_ceiling: ceiling,
            period: Duration::from_secs(period_secs),
        })
    }

    #[test]
    fn config_defaults() {
        let config = RateLimitConfig::default();
        assert_eq!(config.call_ceiling, 20);
        assert_eq!(config.period, Duration::from_secs(60));
    }

    #[test]
    fn from_settings_converts_period() {
        let config = RateLimitConfig::from_settings(&RateLimitSettings {
            call_ceiling: 5,
            period_secs: 10,
        });
        assert_eq!(config.call_ceiling, 5);
        assert_eq!(config.period, Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn calls_under_ceiling_do_not_wait() {
        let limiter = limiter(3, 60);
        for _ in 0..3 {
            assert_eq!(limiter.acquire().await, Duration::ZERO);
        }
        assert_eq!(limiter.throttled_calls(), 0);
        assert_eq!(limiter.budget().remaining(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn call_over_ceiling_waits_for_window() {
        let limiter = limiter(3, 60);
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert!(limiter.try_acquire().is_err());

        let waited = limiter.acquire().await;
        assert_eq!(waited, Duration::from_secs(60));
        assert_eq!(start.elapsed(), Duration::from_secs(60));
        assert_eq!(limiter.throttled_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn window_rolls_with_oldest_call() {
        let limiter = limiter(3, 60);
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        tokio::time::advance(Duration::from_secs(30)).await;
        limiter.acquire().await;

        // Full at t=30; the two t=0 calls age out at t=60.
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::from_secs(60));

        // Window now holds t=30 and t=60, one slot free.
        assert_eq!(limiter.acquire().await, Duration::ZERO);

        // Next slot frees when the t=30 call ages out.
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::from_secs(90));
    }

    #[tokio::test(start_paused = true)]
    async fn shared_limiter_throttles_concurrent_callers() {
        let limiter = RateLimiter::shared(RateLimitConfig {
            call_ceiling: 2,
            period: Duration::from_secs(10),
        });
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..5 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.acquire().await;
                start.elapsed()
            }));
        }

        let mut finished = Vec::new();
        for h in handles {
            finished.push(h.await.unwrap());
        }
        finished.sort();

        assert_eq!(
            finished,
            vec![
                Duration::ZERO,
                Duration::ZERO,
                Duration::from_secs(10),
                Duration::from_secs(10),
                Duration::from_secs(20),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn budget_reports_window() {
        let limiter = limiter(4, 60);
        let budget = limiter.budget();
        assert!(budget.window_start.is_none());
        assert_eq!(budget.remaining(), 4);

        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        let budget = limiter.budget();
        assert_eq!(budget.calls_in_window, 2);
        assert_eq!(budget.window_start, Some(start));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(limiter.budget().calls_in_window, 0);
    }

    #[test]
    fn zero_ceiling_is_clamped() {
        let limiter = limiter(0, 60);
        assert_eq!(limiter.config().call_ceiling, 1);
    }
}
