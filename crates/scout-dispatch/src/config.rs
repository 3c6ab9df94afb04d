//! Dispatch configuration types

use std::time::Duration;

/// Budget for one named quota
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaConfig {
    /// Maximum admissions inside any trailing window
    pub max_requests: usize,
    /// Length of the sliding window
    pub time_window: Duration,
}

impl QuotaConfig {
    /// Create a quota of `max_requests` per `time_window`
    pub fn new(max_requests: usize, time_window: Duration) -> Self {
        Self {
            max_requests,
            time_window,
        }
    }

    /// Shorthand for a per-minute budget
    pub fn per_minute(max_requests: usize) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }
}

/// Parameters of a [`RetryPolicy`](crate::RetryPolicy)
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Attempts including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Growth factor between consecutive delays
    pub backoff_multiplier: f64,
    /// Extra factor applied when the provider reported `QuotaExceeded`
    pub quota_backoff_factor: f64,
    /// Randomly shorten delays by up to 25%
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            quota_backoff_factor: 2.0,
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// Single attempt, no retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}

/// Time bounds applied by the search and extraction clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientTimeouts {
    /// Longest wait for quota admission per attempt
    pub admission_timeout: Duration,
    /// Longest wait for one provider call
    pub request_timeout: Duration,
}

impl Default for ClientTimeouts {
    fn default() -> Self {
        Self {
            admission_timeout: Duration::from_secs(120),
            request_timeout: Duration::from_secs(30),
        }
    }
}
