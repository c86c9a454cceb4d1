//! Fixed-window request budget reconciled with remote quota headers.
//!
//! A [`RateLimiter`] counts requests within a window of length `T` and blocks callers
//! once the effective budget (the advertised limit minus a safety buffer) is used up.
//! Quota headers reported by the remote side are fed back through
//! [`RateLimiter::record`]: when the remote count runs low it replaces the local
//! estimate, and when it is nearly exhausted the next [`RateLimiter::acquire`] is
//! suspended until the remote reset time (bounded by [`MAX_FORCED_WAIT`]).

use super::Clock;
use chrono::{DateTime, Utc};
use core::fmt::{Display, Formatter};
use core::time::Duration;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;

const LOG_TARGET: &str = "     limiter";

/// Below this many remaining remote requests, the remote `used` count replaces the local one.
pub const LOW_WATER_MARK: u32 = 100;

/// Below this many remaining remote requests, the limiter suspends until the remote reset.
pub const CRITICAL_MARK: u32 = 10;

/// Upper bound for a suspension caused by a nearly exhausted remote quota.
pub const MAX_FORCED_WAIT: Duration = Duration::from_mins(5);

/// Fraction of the advertised limit held back by default.
pub const DEFAULT_BUFFER: f64 = 0.1;

/// Budget parameters of a single limiter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitSettings {
    /// Requests allowed per window, as advertised by the remote side.
    pub limit: u32,

    /// Length of the window.
    pub window: Duration,

    /// Fraction of `limit` held back, in `[0, 1)`.
    pub buffer: f64,
}

impl RateLimitSettings {
    #[must_use]
    pub const fn hourly(limit: u32) -> Self {
        Self {
            limit,
            window: Duration::from_hours(1),
            buffer: DEFAULT_BUFFER,
        }
    }

    #[must_use]
    pub const fn per_minute(limit: u32) -> Self {
        Self {
            limit,
            window: Duration::from_mins(1),
            buffer: DEFAULT_BUFFER,
        }
    }

    #[must_use]
    pub const fn with_buffer(self, buffer: f64) -> Self {
        Self { buffer, ..self }
    }

    /// Number of requests actually granted per window: `floor(limit × (1 − buffer))`.
    ///
    /// Never less than one, so a tiny limit cannot block a caller forever.
    #[must_use]
    pub fn effective_budget(&self) -> u32 {
        let budget = (f64::from(self.limit) * (1.0 - self.buffer.clamp(0.0, 1.0))).floor();

        #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "budget lies within [0, limit]")]
        let budget = budget as u32;

        budget.max(1)
    }
}

/// Quota information reported by the remote API on every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaInfo {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
    pub used: u32,
}

/// Snapshot of a limiter for status logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterStatus {
    pub used: u32,
    pub effective_budget: u32,
    pub remaining: u32,
    pub window_elapsed: Duration,
    pub time_until_reset: Duration,
}

impl Display for LimiterStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{}/{} used, {} remaining, window resets in {}s",
            self.used,
            self.effective_budget,
            self.remaining,
            self.time_until_reset.as_secs()
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct Suspension {
    until: Instant,

    /// True when the suspension lasts until the remote reset, so the local window
    /// starts over afterwards.
    resets_window: bool,
}

/// Requests consumed in the current window.
#[derive(Debug)]
pub struct RateLimitWindow {
    used: u32,
    started: Instant,
    budget: u32,
    length: Duration,
    suspension: Option<Suspension>,
}

impl RateLimitWindow {
    fn new(budget: u32, length: Duration, now: Instant) -> Self {
        Self {
            used: 0,
            started: now,
            budget,
            length,
            suspension: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.started) >= self.length
    }

    const fn is_exhausted(&self) -> bool {
        self.used >= self.budget
    }

    fn ends_at(&self) -> Instant {
        self.started + self.length
    }

    const fn reset(&mut self, now: Instant) {
        self.used = 0;
        self.started = now;
    }
}

/// Blocks callers once a window's request budget is used up.
#[derive(Debug)]
pub struct RateLimiter {
    name: &'static str,
    settings: RateLimitSettings,
    window: Mutex<RateLimitWindow>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(name: &'static str, settings: RateLimitSettings, clock: Arc<dyn Clock>) -> Self {
        let budget = settings.effective_budget();
        log::debug!(target: LOG_TARGET,
            "{name}: {budget} requests per {}s (limit {}, buffer {:.0}%)",
            settings.window.as_secs(),
            settings.limit,
            settings.buffer * 100.0
        );

        Self {
            name,
            settings,
            window: Mutex::new(RateLimitWindow::new(budget, settings.window, Instant::now())),
            clock,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub const fn settings(&self) -> &RateLimitSettings {
        &self.settings
    }

    /// Wait until a request may be issued.
    ///
    /// Honors a pending forced suspension first, then rolls the window over if it has
    /// expired, and finally sleeps until the window ends if its budget is used up.
    /// The whole check runs under one lock, so concurrent callers queue behind a sleeper.
    pub async fn acquire(&self) {
        let mut window = self.window.lock().await;

        if let Some(suspension) = window.suspension.take() {
            let now = Instant::now();
            if suspension.until > now {
                log::warn!(target: LOG_TARGET,
                    "{}: remote quota nearly exhausted, pausing for {:.1}s",
                    self.name,
                    (suspension.until - now).as_secs_f64()
                );
                tokio::time::sleep_until(suspension.until).await;
            }

            if suspension.resets_window {
                window.reset(Instant::now());
            }
        }

        let now = Instant::now();
        if window.is_expired(now) {
            window.reset(now);
        }

        if window.is_exhausted() {
            let until = window.ends_at();
            log::info!(target: LOG_TARGET,
                "{}: budget of {} requests used up, waiting {:.1}s for the window to reset",
                self.name,
                window.budget,
                until.saturating_duration_since(now).as_secs_f64()
            );
            tokio::time::sleep_until(until).await;
            window.reset(Instant::now());
        }
    }

    /// Count a completed request and reconcile with the remote quota, if reported.
    pub async fn record(&self, quota: Option<&QuotaInfo>) {
        let mut window = self.window.lock().await;
        window.used = window.used.saturating_add(1);

        let Some(quota) = quota else {
            return;
        };

        if quota.remaining < LOW_WATER_MARK {
            log::warn!(target: LOG_TARGET,
                "{}: only {} of {} remote requests remaining, adopting remote count of {}",
                self.name,
                quota.remaining,
                quota.limit,
                quota.used
            );
            window.used = quota.used;
        }

        if quota.remaining < CRITICAL_MARK {
            // a reset time in the past converts to an error and yields no suspension
            let until_reset = quota
                .reset_at
                .signed_duration_since(self.clock.now())
                .to_std()
                .unwrap_or(Duration::ZERO);

            if !until_reset.is_zero() {
                let wait = until_reset.min(MAX_FORCED_WAIT);
                window.suspension = Some(Suspension {
                    until: Instant::now() + wait,
                    resets_window: until_reset <= MAX_FORCED_WAIT,
                });
            }
        }
    }

    /// Snapshot of the current window.
    pub async fn status(&self) -> LimiterStatus {
        let window = self.window.lock().await;
        let now = Instant::now();

        LimiterStatus {
            used: window.used,
            effective_budget: window.budget,
            remaining: window.budget.saturating_sub(window.used),
            window_elapsed: now.saturating_duration_since(window.started),
            time_until_reset: window.ends_at().saturating_duration_since(now),
        }
    }
}
