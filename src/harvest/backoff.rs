//! Exponential pacing driven by throttling signals.

use super::{LimiterStatus, QuotaInfo, RateLimiter};
use core::time::Duration;

const LOG_TARGET: &str = "     backoff";

/// Upper bound for a server-provided retry hint.
pub const MAX_RETRY_HINT: Duration = Duration::from_mins(5);

/// Multiplier applied to the current delay after every success.
const DECAY: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffSettings {
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
        }
    }
}

/// Per-request pacing that grows exponentially under throttling and decays on success.
#[derive(Debug, Clone)]
pub struct AdaptiveBackoff {
    settings: BackoffSettings,
    consecutive_throttles: u32,
    delay: Duration,
    pending_hint: Option<Duration>,
    successes: u64,
    throttles: u64,
}

impl AdaptiveBackoff {
    #[must_use]
    pub const fn new(settings: BackoffSettings) -> Self {
        Self {
            settings,
            consecutive_throttles: 0,
            delay: settings.min_delay,
            pending_hint: None,
            successes: 0,
            throttles: 0,
        }
    }

    /// The remote side signaled throttling.
    ///
    /// The delay becomes `min(max_delay, min_delay × 2^consecutive)`. A retry hint is kept
    /// as a one-shot pacing delay, capped at [`MAX_RETRY_HINT`] and never below `min_delay`.
    pub fn on_throttled(&mut self, retry_after: Option<Duration>) {
        self.throttles += 1;
        self.consecutive_throttles = self.consecutive_throttles.saturating_add(1);

        let factor = 1_u32.checked_shl(self.consecutive_throttles).unwrap_or(u32::MAX);
        self.delay = self.settings.min_delay.saturating_mul(factor).min(self.settings.max_delay);

        if let Some(hint) = retry_after {
            self.pending_hint = Some(hint.min(MAX_RETRY_HINT));
        }
    }

    /// A request went through without throttling.
    pub fn on_succeeded(&mut self) {
        self.successes += 1;
        self.consecutive_throttles = self.consecutive_throttles.saturating_sub(1);
        self.delay = self.delay.mul_f64(DECAY).max(self.settings.min_delay);
    }

    /// How long to wait before the next request. Consumes a pending retry hint.
    ///
    /// Never shorter than `min_delay`, even when the server hints a shorter retry.
    pub fn pacing_delay(&mut self) -> Duration {
        self.pending_hint.take().unwrap_or(self.delay).max(self.settings.min_delay)
    }

    #[must_use]
    pub const fn current_delay(&self) -> Duration {
        self.delay
    }

    #[must_use]
    pub const fn consecutive_throttles(&self) -> u32 {
        self.consecutive_throttles
    }

    #[must_use]
    pub const fn successes(&self) -> u64 {
        self.successes
    }

    #[must_use]
    pub const fn throttles(&self) -> u64 {
        self.throttles
    }
}

/// A [`RateLimiter`] with [`AdaptiveBackoff`] pacing layered on top.
#[derive(Debug)]
pub struct AdaptiveLimiter {
    limiter: RateLimiter,
    backoff: std::sync::Mutex<AdaptiveBackoff>,
}

impl AdaptiveLimiter {
    #[must_use]
    pub const fn new(limiter: RateLimiter, settings: BackoffSettings) -> Self {
        Self {
            limiter,
            backoff: std::sync::Mutex::new(AdaptiveBackoff::new(settings)),
        }
    }

    /// Wait for the window check, then for the pacing delay.
    pub async fn acquire(&self) {
        self.limiter.acquire().await;

        let delay = self.backoff.lock().expect("lock not poisoned").pacing_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    pub async fn record(&self, quota: Option<&QuotaInfo>) {
        self.limiter.record(quota).await;
    }

    pub fn on_throttled(&self, retry_after: Option<Duration>) {
        let mut backoff = self.backoff.lock().expect("lock not poisoned");
        backoff.on_throttled(retry_after);
        log::warn!(target: LOG_TARGET,
            "{}: throttled {} time(s) in a row, pacing requests at {}ms",
            self.limiter.name(),
            backoff.consecutive_throttles(),
            backoff.current_delay().as_millis()
        );
    }

    pub fn on_succeeded(&self) {
        self.backoff.lock().expect("lock not poisoned").on_succeeded();
    }

    pub async fn status(&self) -> LimiterStatus {
        self.limiter.status().await
    }

    /// Snapshot of the backoff state.
    #[must_use]
    pub fn backoff(&self) -> AdaptiveBackoff {
        self.backoff.lock().expect("lock not poisoned").clone()
    }

    #[must_use]
    pub const fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }
}
