use std::time::Duration;

use switchboard_core::ErrorKind;
use thiserror::Error;

/// Errors that can occur during LLM operations
#[derive(Debug, Error)]
pub enum LlmError {
    /// Caller-supplied data violates protocol invariants
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Requested model is not served by any configured provider
    #[error("unknown model: {model}")]
    UnknownModel { model: String },

    /// Named provider does not exist in configuration
    #[error("provider not found: {provider}")]
    ProviderNotFound { provider: String },

    /// Network failure, unreadable body or untrustworthy stream frame
    #[error("communication error: {0}")]
    Communication(String),

    /// A timeout budget was exceeded
    #[error("timed out: {0}")]
    Timeout(String),

    /// Classified vendor failure
    #[error("provider error ({kind}): {message}")]
    Provider {
        /// Closed classification of the failure
        kind: ErrorKind,
        /// HTTP status, absent when the failure did not come from a response
        status: Option<u16>,
        /// Best-effort diagnostic extracted from the vendor body
        message: String,
        /// Server-requested delay before the next attempt
        retry_after: Option<Duration>,
    },

    /// Provider stopped generating because of a safety block or content filter
    #[error("content blocked by provider: {reason}")]
    ContentBlocked { reason: String },

    /// Caller cancelled the operation
    #[error("operation cancelled")]
    Cancelled,
}

impl LlmError {
    /// Build a provider error that did not originate from an HTTP status
    pub fn provider(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Provider {
            kind,
            status: None,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Whether another attempt of the same call may succeed
    ///
    /// Transport failures, per-attempt timeouts, 5xx and 429 responses are
    /// retryable. Everything else surfaces unchanged.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Communication(_) | Self::Timeout(_) => true,
            Self::Provider {
                status: Some(status), ..
            } => *status == 429 || *status >= 500,
            Self::Provider { kind, status: None, .. } => matches!(
                kind,
                ErrorKind::RateLimitExceeded | ErrorKind::ServiceUnavailable | ErrorKind::Timeout
            ),
            _ => false,
        }
    }

    /// Classification of a provider failure
    pub const fn provider_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Provider { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Whether the credential that produced this error should be disabled
    pub fn is_fatal(&self) -> bool {
        self.provider_kind().is_some_and(ErrorKind::is_fatal)
    }

    /// Server-requested delay carried by a rate-limit or outage response
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Provider { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Whether a provider outage counts against its circuit breaker
    pub const fn is_outage(&self) -> bool {
        match self {
            Self::Communication(_) | Self::Timeout(_) => true,
            Self::Provider { kind, .. } => matches!(kind, ErrorKind::ServiceUnavailable | ErrorKind::Timeout),
            _ => false,
        }
    }

    /// Short label used as a metric attribute
    pub const fn label(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::UnknownModel { .. } => "unknown_model",
            Self::ProviderNotFound { .. } => "provider_not_found",
            Self::Communication(_) => "communication",
            Self::Timeout(_) => "timeout",
            Self::Provider { kind, .. } => kind.as_str(),
            Self::ContentBlocked { .. } => "content_blocked",
            Self::Cancelled => "cancelled",
        }
    }
}
