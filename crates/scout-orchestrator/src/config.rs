//! Pipeline configuration
//!
//! Loaded from TOML. Every field has a default, so an empty file is a valid
//! configuration.

use scout_dispatch::{ClientTimeouts, QuotaConfig, RateLimiter, RetryConfig, LLM_QUOTA, SEARCH_QUOTA};
use scout_extractor::ExtractorConfig;
use scout_store::{ResultCache, StoreError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const SECS_PER_DAY: u64 = 86_400;

/// Errors raised while loading or validating a [`PipelineConfig`]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file {}: {}", .path.display(), .source)]
    Io {
        /// File that was read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// TOML could not be parsed
    #[error("Failed to parse TOML: {0}")]
    Parse(String),

    /// Config could not be serialized
    #[error("Failed to serialize to TOML: {0}")]
    Serialize(String),

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Web search provider settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Search API endpoint
    pub endpoint: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Hits requested per query
    pub max_results: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://serpapi.com/search.json".to_string(),
            api_key_env: "SCOUT_SEARCH_API_KEY".to_string(),
            max_results: 5,
        }
    }
}

impl SearchSettings {
    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

/// LLM provider settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Ollama endpoint
    pub endpoint: String,
    /// Model name
    pub model: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
        }
    }
}

/// Configuration for one enrichment run
///
/// # Examples
///
/// ```
/// use scout_orchestrator::PipelineConfig;
///
/// let config = PipelineConfig::from_toml("worker_concurrency = 2").unwrap();
/// assert_eq!(config.worker_concurrency, 2);
/// assert_eq!(config.search_max_requests, 10);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Search calls allowed per window
    pub search_max_requests: usize,
    /// Search window length (seconds)
    pub search_time_window_secs: u64,
    /// LLM calls allowed per window
    pub llm_max_requests: usize,
    /// LLM window length (seconds)
    pub llm_time_window_secs: u64,
    /// Result cache directory
    pub cache_dir: PathBuf,
    /// Cache entry lifetime (days)
    pub cache_expiry_days: u64,
    /// Attempts per call, including the first
    pub max_retry_attempts: u32,
    /// Delay before the first retry (milliseconds)
    pub base_backoff_ms: u64,
    /// Upper bound on a single retry delay (milliseconds)
    pub max_backoff_ms: u64,
    /// Growth factor between retry delays
    pub backoff_multiplier: f64,
    /// Extra backoff factor after a quota rejection
    pub quota_backoff_factor: f64,
    /// Shorten retry delays randomly by up to 25%
    pub jitter: bool,
    /// Entities processed concurrently
    pub worker_concurrency: usize,
    /// Longest wait for quota admission per attempt (seconds)
    pub admission_timeout_secs: u64,
    /// Longest wait for one provider call (seconds)
    pub request_timeout_secs: u64,
    /// Search provider
    pub search: SearchSettings,
    /// LLM provider
    pub llm: LlmSettings,
    /// Prompt shaping
    pub extraction: ExtractorConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            search_max_requests: 10,
            search_time_window_secs: 60,
            llm_max_requests: 20,
            llm_time_window_secs: 60,
            cache_dir: PathBuf::from(".scout-cache"),
            cache_expiry_days: 7,
            max_retry_attempts: 3,
            base_backoff_ms: 1000,
            max_backoff_ms: 30_000,
            backoff_multiplier: 2.0,
            quota_backoff_factor: 2.0,
            jitter: false,
            worker_concurrency: 8,
            admission_timeout_secs: 120,
            request_timeout_secs: 30,
            search: SearchSettings::default(),
            llm: LlmSettings::default(),
            extraction: ExtractorConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Aggressive preset: more parallelism, fewer retries, short waits
    pub fn aggressive() -> Self {
        Self {
            max_retry_attempts: 2,
            base_backoff_ms: 250,
            max_backoff_ms: 5_000,
            worker_concurrency: 16,
            admission_timeout_secs: 30,
            request_timeout_secs: 15,
            extraction: ExtractorConfig::aggressive(),
            ..Self::default()
        }
    }

    /// Conservative preset: gentle on providers, patient with failures
    pub fn conservative() -> Self {
        Self {
            search_max_requests: 5,
            llm_max_requests: 10,
            max_retry_attempts: 5,
            base_backoff_ms: 2_000,
            max_backoff_ms: 60_000,
            jitter: true,
            worker_concurrency: 2,
            admission_timeout_secs: 300,
            request_timeout_secs: 60,
            extraction: ExtractorConfig::lenient(),
            ..Self::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("search_max_requests", self.search_max_requests as u64),
            ("search_time_window_secs", self.search_time_window_secs),
            ("llm_max_requests", self.llm_max_requests as u64),
            ("llm_time_window_secs", self.llm_time_window_secs),
            ("max_retry_attempts", u64::from(self.max_retry_attempts)),
            ("worker_concurrency", self.worker_concurrency as u64),
            ("admission_timeout_secs", self.admission_timeout_secs),
            ("request_timeout_secs", self.request_timeout_secs),
            ("search.max_results", self.search.max_results as u64),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid(format!("{} must be greater than 0", name)));
        }

        if self.backoff_multiplier.is_nan() || self.backoff_multiplier < 1.0 {
            return Err(ConfigError::Invalid(
                "backoff_multiplier must be at least 1.0".to_string(),
            ));
        }
        if self.quota_backoff_factor.is_nan() || self.quota_backoff_factor < 1.0 {
            return Err(ConfigError::Invalid(
                "quota_backoff_factor must be at least 1.0".to_string(),
            ));
        }
        if self.max_backoff_ms < self.base_backoff_ms {
            return Err(ConfigError::Invalid(
                "max_backoff_ms cannot be less than base_backoff_ms".to_string(),
            ));
        }

        self.extraction.validate().map_err(ConfigError::Invalid)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Load and validate configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Budget for the search quota
    pub fn search_quota(&self) -> QuotaConfig {
        QuotaConfig::new(
            self.search_max_requests,
            Duration::from_secs(self.search_time_window_secs),
        )
    }

    /// Budget for the LLM quota
    pub fn llm_quota(&self) -> QuotaConfig {
        QuotaConfig::new(
            self.llm_max_requests,
            Duration::from_secs(self.llm_time_window_secs),
        )
    }

    /// Rate limiter with both quotas registered
    pub fn rate_limiter(&self) -> RateLimiter {
        RateLimiter::new()
            .with_quota(SEARCH_QUOTA, self.search_quota())
            .with_quota(LLM_QUOTA, self.llm_quota())
    }

    /// Retry parameters shared by the search and extraction clients
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_retry_attempts,
            base_delay: Duration::from_millis(self.base_backoff_ms),
            max_delay: Duration::from_millis(self.max_backoff_ms),
            backoff_multiplier: self.backoff_multiplier,
            quota_backoff_factor: self.quota_backoff_factor,
            jitter: self.jitter,
        }
    }

    /// Admission and request timeouts
    pub fn client_timeouts(&self) -> ClientTimeouts {
        ClientTimeouts {
            admission_timeout: Duration::from_secs(self.admission_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    /// Cache entry lifetime
    pub fn cache_expiry(&self) -> Duration {
        Duration::from_secs(self.cache_expiry_days.saturating_mul(SECS_PER_DAY))
    }

    /// Open the result cache this configuration points at
    pub async fn open_cache(&self) -> Result<ResultCache, StoreError> {
        ResultCache::open(&self.cache_dir, self.cache_expiry()).await
    }
}
