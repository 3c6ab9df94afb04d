//! Scout Provider Layer
//!
//! Implementations of the `SearchProvider` and `LlmProvider` traits from
//! `scout-domain`.
//!
//! # Providers
//!
//! - `HttpSearchProvider`: JSON search APIs (SerpAPI, Google CSE, SearxNG style)
//! - `OllamaProvider`: Local Ollama API integration
//! - `MockSearchProvider` / `MockLlmProvider`: Deterministic mocks for testing
//!
//! Providers issue one request per call and classify every failure into a
//! `ProviderError`. They never retry on their own; `scout-dispatch` owns rate
//! limiting and backoff.
//!
//! # Examples
//!
//! ```
//! use scout_providers::MockLlmProvider;
//! use scout_domain::LlmProvider;
//!
//! # async fn example() {
//! let provider = MockLlmProvider::new(r#"{"email": "info@acme.test"}"#);
//! let answer = provider.generate("find the email").await.unwrap();
//! assert_eq!(answer, r#"{"email": "info@acme.test"}"#);
//! assert_eq!(provider.call_count(), 1);
//! # }
//! ```

#![warn(missing_docs)]

pub mod mock;
pub mod ollama;
pub mod serp;

use scout_domain::ProviderError;

pub use mock::{MockLlmProvider, MockSearchProvider};
pub use ollama::OllamaProvider;
pub use serp::HttpSearchProvider;

/// Classify a transport-level reqwest failure
///
/// Timeouts and connection failures are transient; a request that could not
/// even be built (bad URL, bad header) is invalid and will never succeed.
pub(crate) fn transport_error(error: &reqwest::Error) -> ProviderError {
    if error.is_builder() {
        ProviderError::invalid_request(format!("Could not build request: {}", error))
    } else if error.is_timeout() {
        ProviderError::transient(format!("Request timed out: {}", error))
    } else if error.is_connect() {
        ProviderError::transient(format!("Connection failed: {}", error))
    } else {
        ProviderError::transient(format!("Request failed: {}", error))
    }
}

/// Turn a non-success response into a classified error
pub(crate) async fn status_error(response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    ProviderError::from_http_status(status, &body)
}
