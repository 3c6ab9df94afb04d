//! Deterministic mock providers
//!
//! Both mocks are cheap to clone; clones share call history and scripted
//! failures through an `Arc`, so a test can keep one handle while the
//! pipeline owns another.

use scout_domain::{
    ErrorKind, LlmProvider, ProviderError, RawSearchResult, SearchItem, SearchProvider,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Default)]
struct SearchState {
    results: HashMap<String, RawSearchResult>,
    scripted_failures: HashMap<String, VecDeque<ErrorKind>>,
    permanent_failures: HashMap<String, ErrorKind>,
    calls: Vec<String>,
}

/// Mock search provider
///
/// Returns a canned result per query, or a generated single-item result for
/// unknown queries. Failures can be scripted per query.
///
/// # Examples
///
/// ```
/// use scout_providers::MockSearchProvider;
/// use scout_domain::ErrorKind;
///
/// let provider = MockSearchProvider::new();
/// // First two searches for this query fail, the third succeeds
/// provider.fail_next("Acme contact email", ErrorKind::Transient, 2);
/// assert_eq!(provider.call_count(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockSearchProvider {
    state: Arc<Mutex<SearchState>>,
    latency: Option<Duration>,
}

impl MockSearchProvider {
    /// Create a mock with no canned results
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response, to keep calls in flight during concurrency tests
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn state(&self) -> MutexGuard<'_, SearchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return `result` whenever `query` is searched
    pub fn add_result(&self, query: impl Into<String>, result: RawSearchResult) {
        self.state().results.insert(query.into(), result);
    }

    /// Fail the next `times` searches for `query` with `kind`
    pub fn fail_next(&self, query: impl Into<String>, kind: ErrorKind, times: usize) {
        self.state()
            .scripted_failures
            .entry(query.into())
            .or_default()
            .extend(std::iter::repeat(kind).take(times));
    }

    /// Fail every search for `query` with `kind`
    pub fn fail_always(&self, query: impl Into<String>, kind: ErrorKind) {
        self.state().permanent_failures.insert(query.into(), kind);
    }

    /// Total number of searches issued
    pub fn call_count(&self) -> usize {
        self.state().calls.len()
    }

    /// Number of searches issued for one query
    pub fn calls_for(&self, query: &str) -> usize {
        self.state().calls.iter().filter(|q| q.as_str() == query).count()
    }

    /// Every query searched, in call order
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    fn outcome(&self, query: &str) -> Result<RawSearchResult, ProviderError> {
        let mut state = self.state();
        state.calls.push(query.to_string());

        if let Some(kind) = state
            .scripted_failures
            .get_mut(query)
            .and_then(VecDeque::pop_front)
        {
            return Err(ProviderError::new(kind, format!("Scripted failure for '{}'", query)));
        }
        if let Some(kind) = state.permanent_failures.get(query) {
            return Err(ProviderError::new(*kind, format!("Permanent failure for '{}'", query)));
        }

        Ok(state.results.get(query).cloned().unwrap_or_else(|| {
            RawSearchResult::new(
                query,
                vec![SearchItem {
                    title: format!("Result for {}", query),
                    url: format!("https://search.test/{}", query.replace(' ', "-")),
                    snippet: format!("Snippet about {}", query),
                }],
            )
        }))
    }
}

impl SearchProvider for MockSearchProvider {
    fn name(&self) -> &str {
        "mock-search"
    }

    async fn search(&self, query: &str) -> Result<RawSearchResult, ProviderError> {
        let outcome = self.outcome(query);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        outcome
    }
}

#[derive(Debug, Default)]
struct LlmState {
    responses: Vec<(String, String)>,
    scripted_failures: VecDeque<ErrorKind>,
    prompts: Vec<String>,
}

/// Mock LLM provider for deterministic testing
///
/// Returns the first registered response whose key occurs in the prompt,
/// falling back to a fixed default.
#[derive(Debug, Clone)]
pub struct MockLlmProvider {
    default_response: String,
    state: Arc<Mutex<LlmState>>,
    latency: Option<Duration>,
}

impl MockLlmProvider {
    /// Create a new mock with a fixed response for all prompts
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default_response: response.into(),
            state: Arc::new(Mutex::new(LlmState::default())),
            latency: None,
        }
    }

    /// Delay every response
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn state(&self) -> MutexGuard<'_, LlmState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Answer with `response` when the prompt contains `needle`
    pub fn add_response(&self, needle: impl Into<String>, response: impl Into<String>) {
        self.state().responses.push((needle.into(), response.into()));
    }

    /// Fail the next `times` calls with `kind`
    pub fn fail_next(&self, kind: ErrorKind, times: usize) {
        self.state()
            .scripted_failures
            .extend(std::iter::repeat(kind).take(times));
    }

    /// Get the number of times generate was called
    pub fn call_count(&self) -> usize {
        self.state().prompts.len()
    }

    /// Every prompt received, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.state().prompts.clone()
    }

    /// Forget recorded prompts
    pub fn reset_call_count(&self) {
        self.state().prompts.clear();
    }

    fn outcome(&self, prompt: &str) -> Result<String, ProviderError> {
        let mut state = self.state();
        state.prompts.push(prompt.to_string());

        if let Some(kind) = state.scripted_failures.pop_front() {
            return Err(ProviderError::new(kind, "Scripted LLM failure"));
        }

        Ok(state
            .responses
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| self.default_response.clone()))
    }
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self::new("{}")
    }
}

impl LlmProvider for MockLlmProvider {
    fn model_name(&self) -> &str {
        "mock-llm"
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let outcome = self.outcome(prompt);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        outcome
    }
}
