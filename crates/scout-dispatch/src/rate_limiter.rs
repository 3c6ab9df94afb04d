//! Sliding-window rate limiting per named quota

use crate::config::QuotaConfig;
use crate::error::DispatchError;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Admission control for outbound calls
///
/// Each quota keeps the timestamps of its admissions inside the trailing
/// window. A call is admitted iff fewer than `max_requests` timestamps remain
/// after pruning, and the new timestamp is recorded under the same lock, so
/// the count inside any window never exceeds the budget.
///
/// Quota names without a registered budget are always admitted.
///
/// # Examples
///
/// ```
/// use scout_dispatch::{QuotaConfig, RateLimiter};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let limiter = RateLimiter::new()
///     .with_quota("search-api", QuotaConfig::new(2, Duration::from_secs(60)));
///
/// assert!(limiter.try_acquire("search-api"));
/// assert!(limiter.try_acquire("search-api"));
/// assert!(!limiter.try_acquire("search-api"));
/// # }
/// ```
#[derive(Debug, Default)]
pub struct RateLimiter {
    quotas: HashMap<String, QuotaConfig>,
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    /// Create a limiter with no quotas
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the budget for a quota
    pub fn with_quota(mut self, name: impl Into<String>, quota: QuotaConfig) -> Self {
        self.quotas.insert(name.into(), quota);
        self
    }

    /// Budget registered for a quota
    pub fn quota(&self, name: &str) -> Option<&QuotaConfig> {
        self.quotas.get(name)
    }

    fn windows(&self) -> MutexGuard<'_, HashMap<String, VecDeque<Instant>>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admit a call right now if the budget allows
    pub fn try_acquire(&self, quota: &str) -> bool {
        self.admit_at(quota, Instant::now()).is_ok()
    }

    /// Wait until admitted, the deadline passes, or `cancel` fires
    ///
    /// Returns `true` only when a slot was recorded for this caller. While
    /// waiting the task sleeps until the oldest admission leaves the window.
    pub async fn acquire_blocking(
        &self,
        quota: &str,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> bool {
        loop {
            if cancel.is_cancelled() {
                return false;
            }

            let wait = match self.admit_at(quota, Instant::now()) {
                Ok(()) => return true,
                Err(wait) => wait,
            };

            let now = Instant::now();
            if now >= deadline {
                debug!("Admission for quota '{}' timed out", quota);
                return false;
            }

            let wake = (now + wait).min(deadline);
            debug!("Quota '{}' exhausted, waiting {:?}", quota, wake - now);

            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep_until(wake) => {}
            }
        }
    }

    /// Wait at most `timeout` for admission, reporting failure as a [`DispatchError`]
    ///
    /// # Errors
    ///
    /// - `Cancelled` when the token fires first
    /// - `RateLimitTimeout` when the timeout elapses first
    pub async fn admit(
        &self,
        quota: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let deadline = Instant::now() + timeout;
        if self.acquire_blocking(quota, deadline, cancel).await {
            return Ok(());
        }
        if cancel.is_cancelled() {
            Err(DispatchError::Cancelled)
        } else {
            Err(DispatchError::RateLimitTimeout(quota.to_string()))
        }
    }

    /// Admissions currently inside the window for a quota
    pub fn in_window(&self, quota: &str) -> usize {
        let Some(config) = self.quotas.get(quota) else {
            return 0;
        };
        let mut windows = self.windows();
        match windows.get_mut(quota) {
            Some(window) => {
                prune(window, Instant::now(), config.time_window);
                window.len()
            }
            None => 0,
        }
    }

    /// Admission check at an explicit instant
    ///
    /// On denial returns how long until the oldest admission expires.
    pub(crate) fn admit_at(&self, quota: &str, now: Instant) -> Result<(), Duration> {
        let Some(config) = self.quotas.get(quota) else {
            return Ok(());
        };

        let mut windows = self.windows();
        let window = windows.entry(quota.to_string()).or_default();
        prune(window, now, config.time_window);

        if window.len() < config.max_requests {
            window.push_back(now);
            return Ok(());
        }

        let wait = window
            .front()
            .map(|oldest| (*oldest + config.time_window).saturating_duration_since(now))
            .unwrap_or(config.time_window);
        Err(wait)
    }
}

/// Drop timestamps that are at least `window` old
fn prune(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(oldest) = timestamps.front() {
        if now.saturating_duration_since(*oldest) >= window {
            timestamps.pop_front();
        } else {
            break;
        }
    }
}
