//! HTTP JSON search provider
//!
//! Issues `GET <endpoint>?q=<query>&num=<n>[&api_key=<key>]` and normalizes
//! the common result layouts:
//!
//! | Service | Results key | URL key | Snippet key |
//! |---------|-------------|---------|-------------|
//! | SerpAPI | `organic_results` | `link` | `snippet` |
//! | Google CSE | `items` | `link` | `snippet` |
//! | SearxNG | `results` | `url` | `content` |

use crate::{status_error, transport_error};
use scout_domain::{ProviderError, RawSearchResult, SearchItem, SearchProvider};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Default number of results requested per query
pub const DEFAULT_MAX_RESULTS: usize = 5;

const RESULT_KEYS: [&str; 3] = ["organic_results", "items", "results"];

/// Search provider for JSON web search APIs
#[derive(Clone)]
pub struct HttpSearchProvider {
    endpoint: String,
    api_key: Option<String>,
    max_results: usize,
    client: reqwest::Client,
}

impl fmt::Debug for HttpSearchProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpSearchProvider")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("max_results", &self.max_results)
            .finish()
    }
}

impl HttpSearchProvider {
    /// Create a provider for `endpoint` with the given request timeout
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::invalid_request(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into(),
            api_key: None,
            max_results: DEFAULT_MAX_RESULTS,
            client,
        })
    }

    /// Send `api_key` with every request
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Limit the number of items kept per query
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.max(1);
        self
    }
}

impl SearchProvider for HttpSearchProvider {
    fn name(&self) -> &str {
        "http-search"
    }

    async fn search(&self, query: &str) -> Result<RawSearchResult, ProviderError> {
        let num = self.max_results.to_string();
        let mut request = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query), ("num", num.as_str())]);
        if let Some(key) = &self.api_key {
            request = request.query(&[("api_key", key.as_str())]);
        }

        let response = request.send().await.map_err(|e| transport_error(&e))?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::transient(format!("Malformed search response: {}", e)))?;

        let items = parse_items(&payload, self.max_results);
        debug!("Search '{}' returned {} items", query, items.len());

        Ok(RawSearchResult::new(query, items).with_raw(payload))
    }
}

/// Pull normalized items out of a provider payload
///
/// Entries without a title or URL are skipped.
pub fn parse_items(payload: &Value, limit: usize) -> Vec<SearchItem> {
    let Some(entries) = RESULT_KEYS
        .iter()
        .find_map(|key| payload.get(*key).and_then(Value::as_array))
    else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let title = first_str(entry, &["title"])?;
            let url = first_str(entry, &["link", "url"])?;
            let snippet = first_str(entry, &["snippet", "content", "description"]).unwrap_or_default();
            Some(SearchItem {
                title: title.to_string(),
                url: url.to_string(),
                snippet: snippet.to_string(),
            })
        })
        .take(limit)
        .collect()
}

fn first_str<'a>(entry: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| entry.get(*key).and_then(Value::as_str))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_serpapi_layout() {
        let payload = json!({
            "search_metadata": {"status": "Success"},
            "organic_results": [
                {"position": 1, "title": "Acme Corp", "link": "https://acme.test", "snippet": "Contact us at info@acme.test"},
                {"position": 2, "title": "Acme on Wiki", "link": "https://wiki.test/acme"}
            ]
        });

        let items = parse_items(&payload, 10);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].url, "https://acme.test");
        assert_eq!(items[0].snippet, "Contact us at info@acme.test");
        assert_eq!(items[1].snippet, "");
    }

    #[test]
    fn test_parse_searxng_layout() {
        let payload = json!({
            "results": [
                {"title": "Acme", "url": "https://acme.test", "content": "Acme makes anvils"}
            ]
        });

        let items = parse_items(&payload, 10);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].snippet, "Acme makes anvils");
    }

    #[test]
    fn test_parse_respects_limit_and_skips_incomplete() {
        let payload = json!({
            "items": [
                {"title": "no link"},
                {"title": "a", "link": "https://a.test"},
                {"title": "b", "link": "https://b.test"},
                {"title": "c", "link": "https://c.test"}
            ]
        });

        let items = parse_items(&payload, 2);
        assert_eq!(items.iter().map(|i| i.title.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_parse_unknown_layout() {
        assert!(parse_items(&json!({"answer": 42}), 5).is_empty());
    }

    #[test]
    fn test_max_results_floor() {
        let provider = HttpSearchProvider::new("https://search.test", Duration::from_secs(1))
            .unwrap()
            .with_max_results(0);
        assert_eq!(provider.max_results, 1);
    }
}
