mod harness;

use std::sync::Arc;

use harness::config::ConfigBuilder;
use harness::mock_health::MockHealthService;
use harness::mock_vendor::{MockVendor, Reply};
use switchboard_config::CredentialHealthConfig;
use switchboard_health::HealthReporter;
use switchboard_llm::{ChatCompletionRequest, Gateway, Message};
use tokio_util::sync::CancellationToken;

fn reporter(service: &MockHealthService) -> HealthReporter {
    let config = CredentialHealthConfig {
        enabled: true,
        url: service.base_url().parse().unwrap(),
        service_api_key: None,
    };

    HealthReporter::from_config(&config).unwrap().unwrap()
}

#[tokio::test]
async fn fatal_vendor_error_is_posted_to_health_service() {
    let service = MockHealthService::start().await.unwrap();
    let mock = MockVendor::start_scripted(vec![Reply::error(402, "Your credit balance is too low")])
        .await
        .unwrap();
    let config = ConfigBuilder::new()
        .with_openai_provider("mock", &mock.openai_base_url())
        .build();
    let reporter = reporter(&service);
    let gateway = Gateway::from_config(&config, Arc::new(reporter.clone())).unwrap();
    let credential = gateway.credential_for("mock").unwrap();

    let request = ChatCompletionRequest::new("mock-model-1", vec![Message::user("hi")]);
    assert!(
        gateway
            .complete(&request, &credential, &CancellationToken::new())
            .await
            .is_err()
    );

    reporter.flush().await;

    let received = service.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["keyId"], "primary");
    assert_eq!(received[0]["providerId"], "mock");
    assert_eq!(received[0]["errorKind"], "InsufficientBalance");
    assert_eq!(received[0]["httpStatus"], 402);
    assert_eq!(received[0]["retryAttempt"], 0);
    assert_eq!(received[0]["message"], "Your credit balance is too low");
}

#[tokio::test]
async fn successful_call_posts_nothing() {
    let service = MockHealthService::start().await.unwrap();
    let mock = MockVendor::start().await.unwrap();
    let config = ConfigBuilder::new()
        .with_openai_provider("mock", &mock.openai_base_url())
        .build();
    let reporter = reporter(&service);
    let gateway = Gateway::from_config(&config, Arc::new(reporter.clone())).unwrap();
    let credential = gateway.credential_for("mock").unwrap();

    let request = ChatCompletionRequest::new("mock-model-1", vec![Message::user("hi")]);
    gateway
        .complete(&request, &credential, &CancellationToken::new())
        .await
        .unwrap();

    reporter.flush().await;

    assert!(service.received().is_empty());
}
