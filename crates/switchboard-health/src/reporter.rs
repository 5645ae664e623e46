use switchboard_config::CredentialHealthConfig;
use switchboard_core::{CredentialHealth, ProviderErrorInfo};
use switchboard_telemetry::metrics::HEALTH_REPORT_COUNT;
use switchboard_telemetry::{Counter, KeyValue};
use tokio::sync::{mpsc, oneshot};

use crate::circuit::CircuitBreaker;
use crate::client::HealthClient;
use crate::error::HealthError;

enum Command {
    Report(ProviderErrorInfo),
    Flush(oneshot::Sender<()>),
}

/// Credential-health sink that ships findings from a background task
///
/// Reports go through an unbounded channel so the calling request never
/// waits on the health service. Delivery failures are logged and never
/// surface to callers.
#[derive(Clone)]
pub struct HealthReporter {
    tx: mpsc::UnboundedSender<Command>,
}

impl HealthReporter {
    /// Create a new reporter and spawn its background delivery task
    ///
    /// Must be called from within a Tokio runtime. The task runs until
    /// every clone of the reporter is dropped.
    #[must_use]
    pub fn new(client: HealthClient) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(process_commands(rx, client));

        Self { tx }
    }

    /// Build a reporter from configuration
    ///
    /// Returns `None` when reporting is disabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the service URL cannot address the errors endpoint
    pub fn from_config(config: &CredentialHealthConfig) -> Result<Option<Self>, HealthError> {
        if !config.enabled {
            return Ok(None);
        }

        let client = HealthClient::new(&config.url, config.service_api_key.clone())?;
        Ok(Some(Self::new(client)))
    }

    /// Wait until every report enqueued before this call has been handled
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();

        if self.tx.send(Command::Flush(done_tx)).is_err() {
            return;
        }

        let _ = done_rx.await;
    }
}

impl CredentialHealth for HealthReporter {
    fn report_error(&self, info: ProviderErrorInfo) {
        if let Err(e) = self.tx.send(Command::Report(info)) {
            tracing::warn!(
                error = %e,
                "failed to enqueue credential-health report, channel closed"
            );
        }
    }
}

impl std::fmt::Debug for HealthReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthReporter").finish_non_exhaustive()
    }
}

/// Background task that delivers reports in order
async fn process_commands(mut rx: mpsc::UnboundedReceiver<Command>, client: HealthClient) {
    let mut breaker = CircuitBreaker::new();
    let reports: Counter<u64> = switchboard_telemetry::meter()
        .u64_counter(HEALTH_REPORT_COUNT)
        .with_description("Credential-health reports by delivery outcome")
        .build();

    while let Some(command) = rx.recv().await {
        match command {
            Command::Report(info) => {
                let outcome = deliver(&client, &mut breaker, &info).await;
                reports.add(
                    1,
                    &[
                        KeyValue::new("outcome", outcome),
                        KeyValue::new("error_kind", info.error_kind.as_str()),
                    ],
                );
            }
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
    }

    tracing::debug!("credential-health reporter shutting down");
}

/// Deliver one report, returning the outcome label
async fn deliver(client: &HealthClient, breaker: &mut CircuitBreaker, info: &ProviderErrorInfo) -> &'static str {
    if breaker.check().is_err() {
        tracing::debug!(
            provider = %info.provider_id,
            key_id = %info.key_id,
            error_kind = info.error_kind.as_str(),
            "credential-health circuit open, dropping report"
        );
        return "dropped";
    }

    match client.report(info).await {
        Ok(()) => {
            breaker.record_success();
            "delivered"
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                provider = %info.provider_id,
                key_id = %info.key_id,
                "failed to deliver credential-health report"
            );
            breaker.record_failure();
            "failed"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use switchboard_core::ErrorKind;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn info(kind: ErrorKind) -> ProviderErrorInfo {
        ProviderErrorInfo {
            key_id: "primary".to_owned(),
            provider_id: "anthropic".to_owned(),
            error_kind: kind,
            message: "rate limited".to_owned(),
            http_status: Some(429),
            retry_attempt: 1,
        }
    }

    fn reporter(server: &MockServer) -> HealthReporter {
        let client = HealthClient::new(&Url::parse(&server.uri()).unwrap(), None).unwrap();
        HealthReporter::new(client)
    }

    #[tokio::test]
    async fn reports_are_delivered_before_flush_returns() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/errors"))
            .respond_with(ResponseTemplate::new(202))
            .expect(2)
            .mount(&server)
            .await;

        let reporter = reporter(&server);
        reporter.report_error(info(ErrorKind::RateLimitExceeded));
        reporter.report_error(info(ErrorKind::RateLimitExceeded));
        reporter.flush().await;

        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn circuit_stops_delivery_after_repeated_failures() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/errors"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let reporter = reporter(&server);
        for _ in 0..5 {
            reporter.report_error(info(ErrorKind::ServiceUnavailable));
        }
        reporter.flush().await;

        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[test]
    fn disabled_config_builds_no_reporter() {
        let config = CredentialHealthConfig {
            enabled: false,
            url: Url::parse("http://health.internal/v1").unwrap(),
            service_api_key: None,
        };

        assert!(HealthReporter::from_config(&config).unwrap().is_none());
    }
}
