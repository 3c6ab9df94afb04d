//! Scout Domain Layer
//!
//! Core vocabulary shared by every Scout crate: the entities a batch works on,
//! the templates that turn them into search queries and prompts, the search
//! payload that gets cached, and the provider traits that infrastructure
//! crates implement.
//!
//! ## Key Concepts
//!
//! - **Entity**: one row of input data, an identifier plus named attributes
//! - **QueryTemplate**: `{placeholder}` template rendered against an entity
//! - **RawSearchResult**: what a search provider returns; the cache payload
//! - **ProviderError**: a provider failure classified into a closed [`ErrorKind`]
//!
//! ## Architecture
//!
//! This crate holds no I/O. Providers (HTTP search, LLMs) live in
//! `scout-providers`; rate limiting and retries live in `scout-dispatch`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod entity;
pub mod error;
pub mod query;
pub mod search;
pub mod traits;

// Re-exports for convenience
pub use entity::{Entity, EntityId};
pub use error::{ErrorKind, ProviderError, TemplateError};
pub use query::{normalize_query, QueryTemplate};
pub use search::{RawSearchResult, SearchItem};
pub use traits::{LlmProvider, SearchProvider};
