//! Error types for the CLI application.

use scout_domain::ProviderError;
use scout_orchestrator::{ConfigError, OrchestratorError};
use scout_store::StoreError;
use thiserror::Error;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pipeline configuration was rejected
    #[error(transparent)]
    Pipeline(#[from] ConfigError),

    /// Batch could not be started or finished
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    /// Cache directory error
    #[error("Cache error: {0}")]
    Store(#[from] StoreError),

    /// A provider client could not be built
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
