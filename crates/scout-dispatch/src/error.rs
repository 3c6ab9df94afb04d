//! Error taxonomy for outbound calls

use scout_domain::{ErrorKind, ProviderError, TemplateError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed set of failures a pipeline call can end with
///
/// Retry decisions depend only on the variant, see [`DispatchError::is_retryable`].
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DispatchError {
    /// Quota admission was not granted before the deadline
    #[error("Rate limit admission timed out for quota '{0}'")]
    RateLimitTimeout(String),

    /// Network error, timeout or server-side hiccup
    #[error("Transient failure: {0}")]
    Transient(String),

    /// Provider rejected the call for quota reasons
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Provider is down or overloaded
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Malformed request or rejected credentials
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The model's answer could not be turned into the requested fields
    #[error("Extraction validation failed: {0}")]
    ExtractionValidation(String),

    /// A retryable failure persisted through every attempt
    #[error("Retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Attempts made
        attempts: u32,
        /// Error from the final attempt
        last: Box<DispatchError>,
    },

    /// Result cache I/O failure
    #[error("Cache I/O error: {0}")]
    CacheIo(String),

    /// The batch was cancelled before this call could complete
    #[error("Cancelled")]
    Cancelled,
}

impl DispatchError {
    /// Whether another attempt may succeed
    ///
    /// # Examples
    ///
    /// ```
    /// use scout_dispatch::DispatchError;
    ///
    /// assert!(DispatchError::Transient("reset".into()).is_retryable());
    /// assert!(!DispatchError::InvalidRequest("401".into()).is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DispatchError::RateLimitTimeout(_)
                | DispatchError::Transient(_)
                | DispatchError::QuotaExceeded(_)
                | DispatchError::ProviderUnavailable(_)
        )
    }

    /// Stable snake_case name of the variant
    pub fn kind_name(&self) -> &'static str {
        match self {
            DispatchError::RateLimitTimeout(_) => "rate_limit_timeout",
            DispatchError::Transient(_) => "transient",
            DispatchError::QuotaExceeded(_) => "quota_exceeded",
            DispatchError::ProviderUnavailable(_) => "provider_unavailable",
            DispatchError::InvalidRequest(_) => "invalid_request",
            DispatchError::ExtractionValidation(_) => "extraction_validation",
            DispatchError::RetriesExhausted { .. } => "retries_exhausted",
            DispatchError::CacheIo(_) => "cache_io",
            DispatchError::Cancelled => "cancelled",
        }
    }

    /// The underlying error, looking through `RetriesExhausted`
    pub fn root(&self) -> &DispatchError {
        match self {
            DispatchError::RetriesExhausted { last, .. } => last.root(),
            other => other,
        }
    }
}

impl From<ProviderError> for DispatchError {
    fn from(e: ProviderError) -> Self {
        match e.kind {
            ErrorKind::Transient => DispatchError::Transient(e.message),
            ErrorKind::QuotaExceeded => DispatchError::QuotaExceeded(e.message),
            ErrorKind::ProviderUnavailable => DispatchError::ProviderUnavailable(e.message),
            ErrorKind::InvalidRequest => DispatchError::InvalidRequest(e.message),
        }
    }
}

impl From<TemplateError> for DispatchError {
    fn from(e: TemplateError) -> Self {
        DispatchError::InvalidRequest(format!("template error: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_mapping() {
        let cases = [
            (ErrorKind::Transient, "transient"),
            (ErrorKind::QuotaExceeded, "quota_exceeded"),
            (ErrorKind::ProviderUnavailable, "provider_unavailable"),
            (ErrorKind::InvalidRequest, "invalid_request"),
        ];
        for (kind, name) in cases {
            let err: DispatchError = ProviderError::new(kind, "m").into();
            assert_eq!(err.kind_name(), name);
            assert_eq!(err.is_retryable(), kind.is_retryable());
        }
    }

    #[test]
    fn test_template_error_is_invalid_request() {
        let err: DispatchError = TemplateError::MissingAttribute("company".into()).into();
        assert_eq!(
            err,
            DispatchError::InvalidRequest("template error: entity has no attribute 'company'".into())
        );
    }

    #[test]
    fn test_fatal_variants() {
        assert!(!DispatchError::ExtractionValidation("x".into()).is_retryable());
        assert!(!DispatchError::CacheIo("x".into()).is_retryable());
        assert!(!DispatchError::Cancelled.is_retryable());
        let exhausted = DispatchError::RetriesExhausted {
            attempts: 3,
            last: Box::new(DispatchError::Transient("x".into())),
        };
        assert!(!exhausted.is_retryable());
    }

    #[test]
    fn test_root_unwraps_exhaustion() {
        let err = DispatchError::RetriesExhausted {
            attempts: 3,
            last: Box::new(DispatchError::QuotaExceeded("429".into())),
        };
        assert_eq!(err.root(), &DispatchError::QuotaExceeded("429".into()));
        assert_eq!(
            err.to_string(),
            "Retries exhausted after 3 attempts: Quota exceeded: 429"
        );
    }

    #[test]
    fn test_serialized_shape() {
        let err = DispatchError::RetriesExhausted {
            attempts: 2,
            last: Box::new(DispatchError::Transient("timeout".into())),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "retries_exhausted");
        assert_eq!(json["detail"]["attempts"], 2);
        assert_eq!(json["detail"]["last"]["kind"], "transient");

        let cancelled = serde_json::to_value(DispatchError::Cancelled).unwrap();
        assert_eq!(cancelled["kind"], "cancelled");
    }
}
