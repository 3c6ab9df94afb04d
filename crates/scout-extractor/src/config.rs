//! Configuration for the extraction client

use crate::error::ExtractorError;
use serde::{Deserialize, Serialize};

/// Shapes the prompt sent to the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Upper bound on search content included in the prompt (characters)
    pub max_context_chars: usize,

    /// Maximum number of search hits included in the prompt
    pub max_items: usize,

    /// Include the provider's raw payload when it has no normalized hits
    pub include_raw_fallback: bool,
}

impl ExtractorConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_context_chars == 0 {
            return Err("max_context_chars must be greater than 0".to_string());
        }
        if self.max_items == 0 {
            return Err("max_items must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Default for ExtractorConfig {
    /// Default configuration with balanced settings
    fn default() -> Self {
        Self {
            max_context_chars: 8_000,
            max_items: 10,
            include_raw_fallback: true,
        }
    }
}

impl ExtractorConfig {
    /// Aggressive preset: small prompts for fast, cheap models
    pub fn aggressive() -> Self {
        Self {
            max_context_chars: 3_000,
            max_items: 5,
            include_raw_fallback: false,
        }
    }

    /// Lenient preset: more context for better recall
    pub fn lenient() -> Self {
        Self {
            max_context_chars: 20_000,
            max_items: 20,
            include_raw_fallback: true,
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ExtractorError> {
        toml::from_str(toml_str)
            .map_err(|e| ExtractorError::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, ExtractorError> {
        toml::to_string_pretty(self)
            .map_err(|e| ExtractorError::Config(format!("Failed to serialize to TOML: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        assert!(ExtractorConfig::default().validate().is_ok());
        assert!(ExtractorConfig::aggressive().validate().is_ok());
        assert!(ExtractorConfig::lenient().validate().is_ok());
    }

    #[test]
    fn test_invalid_limits() {
        let mut config = ExtractorConfig::default();
        config.max_context_chars = 0;
        assert!(config.validate().is_err());

        let mut config = ExtractorConfig::default();
        config.max_items = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = ExtractorConfig::lenient();
        let toml_str = config.to_toml().unwrap();
        let parsed = ExtractorConfig::from_toml(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed = ExtractorConfig::from_toml("max_items = 3").unwrap();
        assert_eq!(parsed.max_items, 3);
        assert_eq!(parsed.max_context_chars, 8_000);
    }
}
