mod harness;

use std::sync::Arc;

use harness::config::ConfigBuilder;
use harness::mock_vendor::{DEFAULT_REPLY, MockVendor, Reply};
use harness::recording::RecordingHealth;
use switchboard_core::ErrorKind;
use switchboard_llm::{ChatCompletionRequest, CircuitState, Gateway, Message};
use tokio_util::sync::CancellationToken;

fn request() -> ChatCompletionRequest {
    ChatCompletionRequest::new("mock-model-1", vec![Message::user("hi")])
}

fn gateway(mock: &MockVendor, builder: ConfigBuilder, health: &Arc<RecordingHealth>) -> Gateway {
    let config = builder.with_openai_provider("mock", &mock.openai_base_url()).build();
    Gateway::from_config(&config, Arc::clone(health) as _).unwrap()
}

#[tokio::test]
async fn rate_limits_are_retried_and_reported() {
    let mock = MockVendor::start_scripted(vec![
        Reply::error(429, "Rate limit reached"),
        Reply::error(429, "Rate limit reached"),
    ])
    .await
    .unwrap();
    let health = Arc::new(RecordingHealth::default());
    let gateway = gateway(&mock, ConfigBuilder::new().with_max_retries(3), &health);
    let credential = gateway.credential_for("mock").unwrap();

    let response = gateway
        .complete(&request(), &credential, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(response.content(), DEFAULT_REPLY);
    assert_eq!(mock.request_count(), 3);

    let reports = health.reports();
    assert_eq!(
        health.kinds(),
        vec![ErrorKind::RateLimitExceeded, ErrorKind::RateLimitExceeded]
    );
    assert_eq!(reports[0].retry_attempt, 0);
    assert_eq!(reports[1].retry_attempt, 1);
    assert!(reports.iter().all(|r| r.key_id == "primary" && r.provider_id == "mock"));
    assert!(reports.iter().all(|r| r.http_status == Some(429)));
}

#[tokio::test]
async fn invalid_key_fails_immediately_with_one_fatal_report() {
    let mock = MockVendor::start_scripted(vec![Reply::error(401, "Incorrect API key provided")])
        .await
        .unwrap();
    let health = Arc::new(RecordingHealth::default());
    let gateway = gateway(&mock, ConfigBuilder::new().with_max_retries(3), &health);
    let credential = gateway.credential_for("mock").unwrap();

    let err = gateway
        .complete(&request(), &credential, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.provider_kind(), Some(ErrorKind::InvalidApiKey));
    assert_eq!(mock.request_count(), 1);

    let reports = health.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].error_kind, ErrorKind::InvalidApiKey);
    assert!(reports[0].error_kind.is_fatal());
    assert_eq!(reports[0].http_status, Some(401));
    assert!(reports[0].message.contains("Incorrect API key"));
}

#[tokio::test]
async fn persistent_outage_exhausts_retries() {
    let mock = MockVendor::start_scripted(vec![
        Reply::error(503, "overloaded"),
        Reply::error(503, "overloaded"),
        Reply::error(503, "overloaded"),
    ])
    .await
    .unwrap();
    let health = Arc::new(RecordingHealth::default());
    let gateway = gateway(&mock, ConfigBuilder::new().with_max_retries(2), &health);
    let credential = gateway.credential_for("mock").unwrap();

    let err = gateway
        .complete(&request(), &credential, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.provider_kind(), Some(ErrorKind::ServiceUnavailable));
    assert_eq!(mock.request_count(), 3);
    assert!(health.reports().is_empty());
}

#[tokio::test]
async fn circuit_opens_after_repeated_outages() {
    let mock = MockVendor::start_scripted(vec![Reply::error(500, "boom"), Reply::error(502, "bad gateway")])
        .await
        .unwrap();
    let health = Arc::new(RecordingHealth::default());
    let gateway = gateway(
        &mock,
        ConfigBuilder::new().with_max_retries(0).with_circuit_threshold(2),
        &health,
    );
    let credential = gateway.credential_for("mock").unwrap();
    let cancel = CancellationToken::new();

    assert!(gateway.complete(&request(), &credential, &cancel).await.is_err());
    assert_eq!(gateway.circuit_state("mock"), CircuitState::Closed);
    assert!(gateway.complete(&request(), &credential, &cancel).await.is_err());
    assert_eq!(gateway.circuit_state("mock"), CircuitState::Open);

    let err = gateway.complete(&request(), &credential, &cancel).await.unwrap_err();

    assert_eq!(err.provider_kind(), Some(ErrorKind::ServiceUnavailable));
    assert!(err.to_string().contains("circuit open"));
    assert_eq!(mock.request_count(), 2);
}

#[tokio::test]
async fn cancelled_call_makes_no_request() {
    let mock = MockVendor::start().await.unwrap();
    let health = Arc::new(RecordingHealth::default());
    let gateway = gateway(&mock, ConfigBuilder::new(), &health);
    let credential = gateway.credential_for("mock").unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = gateway.complete(&request(), &credential, &cancel).await.unwrap_err();

    assert!(matches!(err, switchboard_llm::LlmError::Cancelled));
    assert_eq!(mock.request_count(), 0);
}
