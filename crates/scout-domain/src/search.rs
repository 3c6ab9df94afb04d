//! Search payload types

use serde::{Deserialize, Serialize};

/// One hit returned by a search provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchItem {
    /// Page title
    pub title: String,

    /// Link to the page
    pub url: String,

    /// Text excerpt the provider matched
    #[serde(default)]
    pub snippet: String,
}

/// Result of a single search request
///
/// This is the payload stored in the result cache. `raw` keeps the provider's
/// full response so later extraction passes can use fields the normalized
/// items do not carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSearchResult {
    /// The normalized query that produced this result
    pub query: String,

    /// Normalized hits, in provider ranking order
    #[serde(default)]
    pub items: Vec<SearchItem>,

    /// Opaque provider payload
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl RawSearchResult {
    /// Create a result from normalized items only
    pub fn new(query: impl Into<String>, items: Vec<SearchItem>) -> Self {
        Self {
            query: query.into(),
            items,
            raw: serde_json::Value::Null,
        }
    }

    /// Attach the provider's raw payload
    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw = raw;
        self
    }

    /// Whether the provider found nothing
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
