//! Classified provider failures and template errors
//!
//! Providers never hand raw transport errors upward. Every failure is reduced
//! to one of four [`ErrorKind`]s so that retry decisions are a pure function of
//! the kind instead of string inspection.

use std::fmt;

/// Closed set of provider failure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Network hiccup, timeout or 5xx; worth retrying
    Transient,
    /// The provider rejected the call for quota reasons (HTTP 429)
    QuotaExceeded,
    /// The provider is down or overloaded (HTTP 503)
    ProviderUnavailable,
    /// Malformed request or bad credentials; retrying cannot help
    InvalidRequest,
}

impl ErrorKind {
    /// Whether a failure of this kind may succeed on a later attempt
    pub fn is_retryable(self) -> bool {
        !matches!(self, ErrorKind::InvalidRequest)
    }

    /// Classify an HTTP status code returned by a provider
    ///
    /// Returns `None` for success statuses.
    ///
    /// # Examples
    ///
    /// ```
    /// use scout_domain::ErrorKind;
    ///
    /// assert_eq!(ErrorKind::from_http_status(429), Some(ErrorKind::QuotaExceeded));
    /// assert_eq!(ErrorKind::from_http_status(401), Some(ErrorKind::InvalidRequest));
    /// assert_eq!(ErrorKind::from_http_status(200), None);
    /// ```
    pub fn from_http_status(status: u16) -> Option<Self> {
        match status {
            200..=299 => None,
            429 => Some(ErrorKind::QuotaExceeded),
            503 => Some(ErrorKind::ProviderUnavailable),
            408 | 500..=599 => Some(ErrorKind::Transient),
            // Remaining 4xx (auth, not found, validation) and odd 1xx/3xx
            _ => Some(ErrorKind::InvalidRequest),
        }
    }

    /// Stable lowercase name, used in logs and exports
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Transient => "transient",
            ErrorKind::QuotaExceeded => "quota_exceeded",
            ErrorKind::ProviderUnavailable => "provider_unavailable",
            ErrorKind::InvalidRequest => "invalid_request",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure reported by a search or LLM provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    /// Classification driving retry behavior
    pub kind: ErrorKind,
    /// Human-readable detail
    pub message: String,
}

impl ProviderError {
    /// Create a new classified error
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for [`ErrorKind::Transient`]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    /// Shorthand for [`ErrorKind::QuotaExceeded`]
    pub fn quota_exceeded(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::QuotaExceeded, message)
    }

    /// Shorthand for [`ErrorKind::ProviderUnavailable`]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProviderUnavailable, message)
    }

    /// Shorthand for [`ErrorKind::InvalidRequest`]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }

    /// Build an error from a non-success HTTP response
    pub fn from_http_status(status: u16, body: &str) -> Self {
        let kind = ErrorKind::from_http_status(status).unwrap_or(ErrorKind::Transient);
        let mut detail: String = body.chars().take(200).collect();
        if detail.is_empty() {
            detail.push_str("no response body");
        }
        Self::new(kind, format!("HTTP {}: {}", status, detail))
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl std::error::Error for ProviderError {}

/// Errors raised while parsing or rendering a [`crate::QueryTemplate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// A `{` without a matching `}`
    Unclosed {
        /// Byte offset of the opening brace
        position: usize,
    },
    /// A `}` that does not close a placeholder and is not escaped as `}}`
    UnexpectedClose {
        /// Byte offset of the brace
        position: usize,
    },
    /// `{}` with no name inside
    EmptyPlaceholder {
        /// Byte offset of the opening brace
        position: usize,
    },
    /// The entity has no attribute for a placeholder
    MissingAttribute(String),
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateError::Unclosed { position } => {
                write!(f, "unclosed placeholder starting at byte {}", position)
            }
            TemplateError::UnexpectedClose { position } => {
                write!(f, "unexpected '}}' at byte {} (use '}}}}' for a literal brace)", position)
            }
            TemplateError::EmptyPlaceholder { position } => {
                write!(f, "empty placeholder at byte {}", position)
            }
            TemplateError::MissingAttribute(name) => {
                write!(f, "entity has no attribute '{}'", name)
            }
        }
    }
}

impl std::error::Error for TemplateError {}
