//! Provider failure classification
//!
//! Maps an HTTP status onto the closed [`ErrorKind`] taxonomy. The vendor
//! body is only read for a human-readable message.

use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, StatusCode, header::RETRY_AFTER};
use switchboard_core::ErrorKind;

use crate::error::LlmError;
use crate::provider::RawResponse;

/// Longest diagnostic message kept from a vendor error body
pub const MAX_MESSAGE_CHARS: usize = 500;

/// Classify a failing HTTP status
pub const fn classify_status(status: StatusCode) -> ErrorKind {
    match status.as_u16() {
        401 => ErrorKind::InvalidApiKey,
        402 => ErrorKind::InsufficientBalance,
        403 => ErrorKind::AccessForbidden,
        404 => ErrorKind::ModelNotFound,
        429 => ErrorKind::RateLimitExceeded,
        408 | 504 => ErrorKind::Timeout,
        500..=599 => ErrorKind::ServiceUnavailable,
        _ => ErrorKind::Unknown,
    }
}

/// Pull a readable message out of a vendor error body
///
/// Understands the common `{"error": {"message": ..}}`, `{"message": ..}`
/// and `{"error": ".."}` shapes and falls back to the raw text.
pub fn extract_message(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);

    let message = serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .or_else(|| value.get("message"))
                .or_else(|| value.get("error"))
                .or_else(|| value.get("detail"))
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned)
        })
        .unwrap_or_else(|| text.trim().to_owned());

    truncate(&message, MAX_MESSAGE_CHARS)
}

/// Parse a `Retry-After` header given in seconds
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

/// Build the classified error for a failing response body
pub fn provider_error(status: StatusCode, headers: &HeaderMap, body: &[u8]) -> LlmError {
    LlmError::Provider {
        kind: classify_status(status),
        status: Some(status.as_u16()),
        message: extract_message(body),
        retry_after: retry_after(headers),
    }
}

/// Pass successful responses through and turn failures into errors
///
/// # Errors
///
/// Returns `LlmError::Provider` for any non-2xx status. A failing body
/// that cannot be read is logged and classified by status alone.
pub async fn ensure_success(response: RawResponse) -> Result<RawResponse, LlmError> {
    if response.status.is_success() {
        return Ok(response);
    }

    let status = response.status;
    let headers = response.headers.clone();
    let body = match response.bytes().await {
        Ok(body) => body,
        Err(error) => {
            tracing::debug!(status = %status, error = %error, "failed to read upstream error body");
            Bytes::new()
        }
    };
    let error = provider_error(status, &headers, &body);

    tracing::warn!(status = %status, error = %error, "upstream returned error");

    Err(error)
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_owned(),
    }
}
