//! Rate-limited, retried access to a search provider

use crate::config::ClientTimeouts;
use crate::error::DispatchError;
use crate::rate_limiter::RateLimiter;
use crate::retry::{Attempted, RetryPolicy};
use crate::SEARCH_QUOTA;
use scout_domain::{normalize_query, RawSearchResult, SearchProvider};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Wraps a [`SearchProvider`] with quota admission, a request timeout and a
/// retry policy
#[derive(Debug)]
pub struct SearchClient<P> {
    provider: P,
    limiter: Arc<RateLimiter>,
    quota: String,
    retry: RetryPolicy,
    timeouts: ClientTimeouts,
}

impl<P: SearchProvider> SearchClient<P> {
    /// Create a client drawing on the [`SEARCH_QUOTA`] budget
    pub fn new(provider: P, limiter: Arc<RateLimiter>, retry: RetryPolicy) -> Self {
        Self {
            provider,
            limiter,
            quota: SEARCH_QUOTA.to_string(),
            retry,
            timeouts: ClientTimeouts::default(),
        }
    }

    /// Draw on a different quota
    pub fn with_quota(mut self, quota: impl Into<String>) -> Self {
        self.quota = quota.into();
        self
    }

    /// Override admission and request timeouts
    pub fn with_timeouts(mut self, timeouts: ClientTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// The wrapped provider
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Quota this client draws on
    pub fn quota(&self) -> &str {
        &self.quota
    }

    /// One admitted provider call, no retries
    ///
    /// # Errors
    ///
    /// - `RateLimitTimeout` when admission is not granted in time
    /// - `Cancelled` when the token fires while waiting for admission
    /// - `Transient` when the provider does not answer within the request timeout
    /// - the provider's own classified failure otherwise
    pub async fn search(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<RawSearchResult, DispatchError> {
        self.limiter
            .admit(&self.quota, self.timeouts.admission_timeout, cancel)
            .await?;

        debug!("Searching {} for '{}'", self.provider.name(), query);

        match tokio::time::timeout(self.timeouts.request_timeout, self.provider.search(query)).await
        {
            Ok(result) => result.map_err(DispatchError::from),
            Err(_) => Err(DispatchError::Transient(format!(
                "search request timed out after {:?}",
                self.timeouts.request_timeout
            ))),
        }
    }

    /// Search under the retry policy
    ///
    /// The query is normalized first. Each attempt re-acquires admission.
    pub async fn search_with_retry(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Attempted<RawSearchResult> {
        let query = normalize_query(query);
        self.retry
            .execute("search", cancel, |_| self.search(&query, cancel))
            .await
    }
}
