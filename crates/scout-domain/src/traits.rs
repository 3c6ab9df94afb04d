//! Trait definitions for external interactions
//!
//! These traits define the boundaries between the pipeline and the remote
//! services it talks to. Implementations live in `scout-providers`.
//!
//! Both traits return `Send` futures so calls can run on any worker task of a
//! multi-threaded runtime.

use crate::error::ProviderError;
use crate::search::RawSearchResult;
use std::future::Future;

/// A web search backend
///
/// Implementations issue exactly one remote request per call. Rate limiting,
/// retries and caching are layered on top by the caller.
pub trait SearchProvider: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Run a search for an already-normalized query
    fn search(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<RawSearchResult, ProviderError>> + Send;
}

/// A language-model backend
pub trait LlmProvider: Send + Sync {
    /// Model identifier used in logs
    fn model_name(&self) -> &str;

    /// Generate a completion for the prompt
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String, ProviderError>> + Send;
}
