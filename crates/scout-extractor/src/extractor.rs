//! Rate-limited, retried field extraction through an LLM

use crate::config::ExtractorConfig;
use crate::parser::parse_fields;
use crate::prompt::PromptBuilder;
use crate::types::{ExtractedFields, ExtractionRequest};
use scout_dispatch::{
    Attempted, ClientTimeouts, DispatchError, RateLimiter, RetryPolicy, LLM_QUOTA,
};
use scout_domain::LlmProvider;
use std::sync::Arc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Turns a cached search payload into the requested fields
///
/// Draws on its own quota ([`LLM_QUOTA`] by default), independent of the
/// search budget, and runs every model call under its own retry policy.
#[derive(Debug)]
pub struct ExtractionClient<L> {
    llm: L,
    limiter: Arc<RateLimiter>,
    quota: String,
    retry: RetryPolicy,
    timeouts: ClientTimeouts,
    config: ExtractorConfig,
}

impl<L: LlmProvider> ExtractionClient<L> {
    /// Create a new extraction client
    pub fn new(llm: L, limiter: Arc<RateLimiter>, retry: RetryPolicy) -> Self {
        Self {
            llm,
            limiter,
            quota: LLM_QUOTA.to_string(),
            retry,
            timeouts: ClientTimeouts::default(),
            config: ExtractorConfig::default(),
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

    /// Override prompt shaping
    pub fn with_config(mut self, config: ExtractorConfig) -> Self {
        self.config = config;
        self
    }

    /// The wrapped model
    pub fn llm(&self) -> &L {
        &self.llm
    }

    /// Render the full prompt for a request
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if the prompt template references an attribute
    /// the entity does not have.
    pub fn build_prompt(&self, request: &ExtractionRequest<'_>) -> Result<String, DispatchError> {
        let instruction = request.prompt_template.render(request.attributes)?;

        Ok(PromptBuilder::new(instruction, request.fields)
            .with_search_result(request.raw_result)
            .with_limits(self.config.max_context_chars, self.config.max_items)
            .with_raw_fallback(self.config.include_raw_fallback)
            .build())
    }

    /// One admitted model call, no retries
    ///
    /// # Errors
    ///
    /// - `RateLimitTimeout` or `Cancelled` from admission
    /// - `Transient` when the model does not answer within the request timeout
    /// - the provider's own classified failure otherwise
    pub async fn generate(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, DispatchError> {
        self.limiter
            .admit(&self.quota, self.timeouts.admission_timeout, cancel)
            .await?;

        debug!(
            "Calling {} with a {} char prompt",
            self.llm.model_name(),
            prompt.len()
        );

        match timeout(self.timeouts.request_timeout, self.llm.generate(prompt)).await {
            Ok(answer) => answer.map_err(DispatchError::from),
            Err(_) => Err(DispatchError::Transient(format!(
                "model call timed out after {:?}",
                self.timeouts.request_timeout
            ))),
        }
    }

    /// Extract the requested fields under the retry policy
    ///
    /// An answer that is not a JSON object fails with `ExtractionValidation`
    /// and is not retried.
    pub async fn extract(
        &self,
        request: &ExtractionRequest<'_>,
        cancel: &CancellationToken,
    ) -> Attempted<ExtractedFields> {
        let prompt = match self.build_prompt(request) {
            Ok(prompt) => prompt,
            Err(e) => {
                return Attempted {
                    result: Err(e),
                    attempts: 0,
                }
            }
        };

        let attempted = self
            .retry
            .execute("extraction", cancel, |_| async {
                let answer = self.generate(&prompt, cancel).await?;
                parse_fields(&answer, request.fields).map_err(DispatchError::from)
            })
            .await;

        if let Ok(fields) = &attempted.result {
            info!(
                "Extracted {} fields for '{}' in {} attempts",
                fields.len(),
                request.raw_result.query,
                attempted.attempts
            );
        }

        attempted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NOT_FOUND;
    use scout_dispatch::{QuotaConfig, RetryConfig};
    use scout_domain::{ErrorKind, QueryTemplate, RawSearchResult, SearchItem};
    use scout_providers::MockLlmProvider;
    use std::collections::BTreeMap;
    use std::time::Duration;

    struct Fixture {
        raw: RawSearchResult,
        template: QueryTemplate,
        attributes: BTreeMap<String, String>,
        fields: Vec<String>,
    }

    impl Fixture {
        fn acme() -> Self {
            Self {
                raw: RawSearchResult::new(
                    "Acme contact email",
                    vec![SearchItem {
                        title: "Contact Acme".to_string(),
                        url: "https://acme.test/contact".to_string(),
                        snippet: "Reach us at info@acme.test".to_string(),
                    }],
                ),
                template: QueryTemplate::parse("Find contact details for {company}.").unwrap(),
                attributes: BTreeMap::from([("company".to_string(), "Acme".to_string())]),
                fields: vec!["email".to_string(), "phone".to_string()],
            }
        }

        fn request(&self) -> ExtractionRequest<'_> {
            ExtractionRequest {
                raw_result: &self.raw,
                prompt_template: &self.template,
                attributes: &self.attributes,
                fields: &self.fields,
            }
        }
    }

    fn client(llm: MockLlmProvider, limiter: RateLimiter) -> ExtractionClient<MockLlmProvider> {
        let retry = RetryPolicy::new(RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            ..RetryConfig::default()
        });
        ExtractionClient::new(llm, Arc::new(limiter), retry).with_timeouts(ClientTimeouts {
            admission_timeout: Duration::from_secs(1),
            request_timeout: Duration::from_secs(5),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_extract_fills_requested_fields() {
        let llm = MockLlmProvider::new(r#"{"email": "info@acme.test", "ceo": "W. Coyote"}"#);
        let client = client(llm.clone(), RateLimiter::new());
        let fixture = Fixture::acme();

        let attempted = client
            .extract(&fixture.request(), &CancellationToken::new())
            .await;

        assert_eq!(attempted.attempts, 1);
        let fields = attempted.result.unwrap();
        assert_eq!(fields["email"], "info@acme.test");
        assert_eq!(fields["phone"], NOT_FOUND);
        assert!(!fields.contains_key("ceo"));

        let prompt = &llm.prompts()[0];
        assert!(prompt.starts_with("Find contact details for Acme."));
        assert!(prompt.contains("info@acme.test"));
        assert!(prompt.contains("Fields to extract: email, phone"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_object_answer_is_fatal() {
        let llm = MockLlmProvider::new("I could not find anything.");
        let client = client(llm.clone(), RateLimiter::new());
        let fixture = Fixture::acme();

        let attempted = client
            .extract(&fixture.request(), &CancellationToken::new())
            .await;

        assert_eq!(attempted.attempts, 1);
        assert!(matches!(
            attempted.result,
            Err(DispatchError::ExtractionValidation(_))
        ));
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_model_failures_are_retried() {
        let llm = MockLlmProvider::new(r#"{"email": "info@acme.test"}"#);
        llm.fail_next(ErrorKind::Transient, 2);
        let client = client(llm.clone(), RateLimiter::new());
        let fixture = Fixture::acme();

        let attempted = client
            .extract(&fixture.request(), &CancellationToken::new())
            .await;

        assert_eq!(attempted.attempts, 3);
        assert_eq!(attempted.result.unwrap()["email"], "info@acme.test");
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_prompt_attribute_is_invalid_request() {
        let llm = MockLlmProvider::default();
        let client = client(llm.clone(), RateLimiter::new());
        let mut fixture = Fixture::acme();
        fixture.attributes.clear();

        let attempted = client
            .extract(&fixture.request(), &CancellationToken::new())
            .await;

        assert_eq!(attempted.attempts, 0);
        assert!(matches!(
            attempted.result,
            Err(DispatchError::InvalidRequest(_))
        ));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_uses_its_own_quota() {
        let limiter = RateLimiter::new()
            .with_quota(LLM_QUOTA, QuotaConfig::per_minute(1))
            .with_quota(scout_dispatch::SEARCH_QUOTA, QuotaConfig::per_minute(1));
        let llm = MockLlmProvider::new("{}");
        let client = client(llm.clone(), limiter);
        let cancel = CancellationToken::new();

        client.generate("first", &cancel).await.unwrap();
        let err = client.generate("second", &cancel).await.unwrap_err();

        assert_eq!(err, DispatchError::RateLimitTimeout(LLM_QUOTA.to_string()));
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_model_times_out_as_transient() {
        let llm = MockLlmProvider::new("{}").with_latency(Duration::from_secs(30));
        let client = client(llm, RateLimiter::new());

        let err = client
            .generate("prompt", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Transient(_)));
    }
}
