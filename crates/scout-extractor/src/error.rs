//! Error types for the Extractor

use scout_dispatch::DispatchError;
use thiserror::Error;

/// Errors that can occur while turning a model answer into fields
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractorError {
    /// The answer is not valid JSON
    #[error("Invalid JSON in model answer: {0}")]
    InvalidFormat(String),

    /// The answer is JSON but not an object
    #[error("Expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<ExtractorError> for DispatchError {
    fn from(e: ExtractorError) -> Self {
        DispatchError::ExtractionValidation(e.to_string())
    }
}
