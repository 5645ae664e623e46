use crate::error::ProviderErrorInfo;

/// Sink for credential health findings
///
/// Implementations must not block the caller: reporting is fire-and-forget
/// and any failure to deliver is the implementation's problem to log.
pub trait CredentialHealth: Send + Sync {
    /// Record a classified provider failure for a key
    fn report_error(&self, info: ProviderErrorInfo);
}

/// Discards every report
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHealth;

impl CredentialHealth for NoopHealth {
    fn report_error(&self, _info: ProviderErrorInfo) {}
}

/// Writes every report to the log and nothing else
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingHealth;

impl CredentialHealth for LoggingHealth {
    fn report_error(&self, info: ProviderErrorInfo) {
        tracing::warn!(
            provider = %info.provider_id,
            key_id = %info.key_id,
            error_kind = %info.error_kind,
            status = ?info.http_status,
            attempt = info.retry_attempt,
            message = %info.message,
            "credential health finding"
        );
    }
}
