//! Conversion between canonical types and wire formats
//!
//! Each submodule builds its vendor's request body, reads its one-shot
//! response, and provides the vendor's [`FrameParser`](crate::stream::FrameParser).

pub mod anthropic;
pub mod google;
pub mod ollama;
pub mod openai;

use switchboard_core::ErrorKind;

/// Classify an error `type` string sent inside a stream or error body
///
/// Mid-stream failures have no HTTP status of their own, so the vendor's
/// error type is the only signal available.
pub fn error_kind_from_type(error_type: &str) -> ErrorKind {
    match error_type {
        "authentication_error" | "invalid_api_key" => ErrorKind::InvalidApiKey,
        "insufficient_quota" | "billing_error" => ErrorKind::InsufficientBalance,
        "permission_error" | "permission_denied" => ErrorKind::AccessForbidden,
        "not_found_error" | "model_not_found" => ErrorKind::ModelNotFound,
        "rate_limit_error" | "rate_limit_exceeded" => ErrorKind::RateLimitExceeded,
        "overloaded_error" | "api_error" | "server_error" => ErrorKind::ServiceUnavailable,
        "timeout_error" => ErrorKind::Timeout,
        _ => ErrorKind::Unknown,
    }
}
