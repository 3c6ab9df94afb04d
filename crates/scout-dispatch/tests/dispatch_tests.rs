//! Concurrent clients sharing one rate limiter

use scout_dispatch::{
    ClientTimeouts, DispatchError, QuotaConfig, RateLimiter, RetryConfig, RetryPolicy,
    SearchClient, SEARCH_QUOTA,
};
use scout_domain::ErrorKind;
use scout_providers::MockSearchProvider;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn shared_client(
    provider: MockSearchProvider,
    quota: QuotaConfig,
    admission_timeout: Duration,
) -> Arc<SearchClient<MockSearchProvider>> {
    let limiter = Arc::new(RateLimiter::new().with_quota(SEARCH_QUOTA, quota));
    let client = SearchClient::new(provider, limiter, RetryPolicy::new(RetryConfig::default()))
        .with_timeouts(ClientTimeouts {
            admission_timeout,
            request_timeout: Duration::from_secs(5),
        });
    Arc::new(client)
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_searches_are_paced_by_quota() {
    let provider = MockSearchProvider::new();
    let client = shared_client(
        provider.clone(),
        QuotaConfig::new(3, Duration::from_secs(1)),
        Duration::from_secs(10),
    );
    let cancel = CancellationToken::new();
    let start = Instant::now();

    let mut handles = Vec::new();
    for i in 0..10 {
        let client = Arc::clone(&client);
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            client
                .search_with_retry(&format!("company {}", i), &cancel)
                .await
        }));
    }

    for handle in handles {
        let attempted = handle.await.unwrap();
        assert!(attempted.result.is_ok());
        assert_eq!(attempted.attempts, 1);
    }

    // Three per second: 0s, 1s, 2s, then the tenth at 3s
    assert_eq!(start.elapsed(), Duration::from_secs(3));
    assert_eq!(provider.call_count(), 10);
}

#[tokio::test(start_paused = true)]
async fn test_admission_timeouts_are_retried_then_exhausted() {
    let provider = MockSearchProvider::new();
    let client = shared_client(
        provider.clone(),
        QuotaConfig::per_minute(1),
        Duration::from_millis(100),
    );
    let cancel = CancellationToken::new();

    client.search_with_retry("first", &cancel).await.result.unwrap();
    let attempted = client.search_with_retry("second", &cancel).await;

    assert_eq!(attempted.attempts, 3);
    match attempted.result {
        Err(DispatchError::RetriesExhausted { attempts, last }) => {
            assert_eq!(attempts, 3);
            assert_eq!(*last, DispatchError::RateLimitTimeout(SEARCH_QUOTA.into()));
        }
        other => panic!("expected exhaustion, got {:?}", other),
    }
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_provider_unavailable_recovers() {
    let provider = MockSearchProvider::new();
    provider.fail_next("q", ErrorKind::ProviderUnavailable, 1);
    let client = shared_client(
        provider.clone(),
        QuotaConfig::per_minute(10),
        Duration::from_secs(1),
    );

    let attempted = client
        .search_with_retry("q", &CancellationToken::new())
        .await;

    assert!(attempted.result.is_ok());
    assert_eq!(attempted.attempts, 2);
}
