/// Errors returned by the credential-health client
#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    /// HTTP transport or connection error
    #[error("credential-health request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-success status
    #[error("credential-health API error ({status}): {message}")]
    Api {
        /// HTTP status from the service
        status: u16,
        /// Error message from the response body
        message: String,
    },

    /// Configured base URL cannot address the errors endpoint
    #[error("invalid credential-health URL: {0}")]
    InvalidUrl(String),

    /// Too many recent failures, reports are being dropped
    #[error("credential-health service circuit is open")]
    CircuitOpen,
}
