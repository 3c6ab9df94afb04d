//! Scout Extractor
//!
//! Turns a search payload into named fields using an LLM.
//!
//! # Architecture
//!
//! ```text
//! RawSearchResult + prompt template + attributes
//!     → PromptBuilder → RateLimiter (llm quota) → LlmProvider → parser → fields
//! ```
//!
//! The model is asked for a single JSON object keyed by the requested field
//! names. Every requested field is present in the output; fields the model
//! could not fill carry the [`NOT_FOUND`] marker.
//!
//! # Example Usage
//!
//! ```no_run
//! use scout_dispatch::{RateLimiter, RetryPolicy};
//! use scout_domain::{QueryTemplate, RawSearchResult};
//! use scout_extractor::{ExtractionClient, ExtractionRequest};
//! use scout_providers::MockLlmProvider;
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ExtractionClient::new(
//!     MockLlmProvider::new(r#"{"email": "info@acme.test"}"#),
//!     Arc::new(RateLimiter::new()),
//!     RetryPolicy::default(),
//! );
//!
//! let raw = RawSearchResult::new("Acme contact email", Vec::new());
//! let template = QueryTemplate::parse("Find the contact email of {company}.")?;
//! let attributes = BTreeMap::from([("company".to_string(), "Acme".to_string())]);
//! let fields = vec!["email".to_string()];
//!
//! let request = ExtractionRequest {
//!     raw_result: &raw,
//!     prompt_template: &template,
//!     attributes: &attributes,
//!     fields: &fields,
//! };
//!
//! let extracted = client.extract(&request, &CancellationToken::new()).await.result?;
//! println!("email: {}", extracted["email"]);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod extractor;
mod parser;
mod prompt;
mod types;


pub use config::ExtractorConfig;
pub use error::ExtractorError;
pub use extractor::ExtractionClient;
pub use parser::parse_fields;
pub use prompt::PromptBuilder;
pub use types::{ExtractedFields, ExtractionRequest, NOT_FOUND};
