use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed classification of provider failures
///
/// Discriminants form a fixed severity ordering: everything up to and
/// including `ModelNotFound` is fatal for the credential that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ErrorKind {
    /// Key rejected by the provider (401)
    InvalidApiKey = 1,
    /// Account has no remaining credit (402)
    InsufficientBalance = 2,
    /// Key lacks permission for the resource (403)
    AccessForbidden = 3,
    /// Model does not exist or is not available to this key (404)
    ModelNotFound = 4,
    /// Provider throttled the key (429)
    RateLimitExceeded = 5,
    /// Provider outage or overload (5xx)
    ServiceUnavailable = 6,
    /// Provider or gateway timed out (408, 504)
    Timeout = 7,
    /// Anything else
    Unknown = 8,
}

impl ErrorKind {
    /// Numeric severity, lower is more severe
    pub const fn severity(self) -> u8 {
        self as u8
    }

    /// Whether the credential that produced this error should be disabled
    pub const fn is_fatal(self) -> bool {
        self.severity() <= Self::ModelNotFound.severity()
    }

    /// Stable label for logs and metrics
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidApiKey => "invalid_api_key",
            Self::InsufficientBalance => "insufficient_balance",
            Self::AccessForbidden => "access_forbidden",
            Self::ModelNotFound => "model_not_found",
            Self::RateLimitExceeded => "rate_limit_exceeded",
            Self::ServiceUnavailable => "service_unavailable",
            Self::Timeout => "timeout",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure finding handed to the credential-health service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderErrorInfo {
    /// Key that produced the failure
    pub key_id: String,
    /// Provider the key belongs to
    pub provider_id: String,
    /// Classified failure
    pub error_kind: ErrorKind,
    /// Human-readable diagnostic, already truncated
    pub message: String,
    /// HTTP status when the provider answered
    pub http_status: Option<u16>,
    /// Zero-based attempt number within the retry loop
    pub retry_attempt: u32,
}
