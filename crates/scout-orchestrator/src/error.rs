//! Error types for batch orchestration
//!
//! Per-entity failures never surface here; they are recorded in that
//! entity's [`JobResult`](crate::JobResult). These errors stop a batch from
//! starting or from reporting.

use crate::config::ConfigError;
use scout_domain::TemplateError;
use scout_store::StoreError;
use thiserror::Error;

/// Errors that can occur while setting up or finishing a batch
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A query or prompt template could not be parsed
    #[error("Invalid template: {0}")]
    Template(#[from] TemplateError),

    /// No fields were requested
    #[error("At least one field must be requested")]
    NoFields,

    /// The result cache could not be opened
    #[error("Cache error: {0}")]
    Store(#[from] StoreError),

    /// A worker or the supervisor task panicked
    #[error("Worker error: {0}")]
    Worker(String),
}
