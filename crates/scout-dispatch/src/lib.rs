//! Scout Dispatch
//!
//! Everything between the pipeline and a remote provider: quota admission,
//! classified errors, and bounded retries.
//!
//! # Architecture
//!
//! ```text
//! SearchClient::search_with_retry
//!   └── RetryPolicy::execute            (attempts, backoff, cancellation)
//!         └── RateLimiter::acquire_blocking   (per-quota sliding window)
//!               └── SearchProvider::search    (bounded by request timeout)
//! ```
//!
//! The extraction client in `scout-extractor` composes the same pieces around
//! an LLM provider under its own quota.

#![warn(missing_docs)]

mod config;
mod error;
mod rate_limiter;
mod retry;
mod search;

pub use config::{ClientTimeouts, QuotaConfig, RetryConfig};
pub use error::DispatchError;
pub use rate_limiter::RateLimiter;
pub use retry::{
    AttemptEvent, AttemptOutcome, Attempted, RetryObserver, RetryPolicy, RetryState,
    TracingObserver,
};
pub use search::SearchClient;

/// Quota name used by search clients
pub const SEARCH_QUOTA: &str = "search-api";

/// Quota name used by extraction clients
pub const LLM_QUOTA: &str = "llm-api";
