//! Gateway facade composing routing, transports and the resilience executor

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use switchboard_config::Config;
use switchboard_core::{CredentialContext, CredentialHealth};
use tokio_util::sync::CancellationToken;

use crate::classify::ensure_success;
use crate::error::LlmError;
use crate::health::CircuitState;
use crate::metrics::LlmMetrics;
use crate::provider::{OutboundCall, RawResponse, Transport, build_transport};
use crate::resilience::{CallContext, ResilienceExecutor};
use crate::routing::{ModelRouter, ResolvedModel};
use crate::stream::{ChunkStream, StreamTranslator, TranslatorOptions, frames};
use crate::types::{ChatCompletionRequest, ChatCompletionResponse};

/// Entry point for completions
///
/// Cheap to clone; every clone shares transports, circuit breaker state
/// and connection pools.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    router: ModelRouter,
    transports: HashMap<String, Arc<dyn Transport>>,
    credentials: HashMap<String, Vec<CredentialContext>>,
    executor: ResilienceExecutor,
    stream_idle_timeout: Option<Duration>,
    metrics: LlmMetrics,
}

impl Gateway {
    /// Build a gateway from configuration, constructing every transport
    ///
    /// # Errors
    ///
    /// Returns an error if a transport or the routing table cannot be built
    pub fn from_config(config: &Config, health: Arc<dyn CredentialHealth>) -> Result<Self, LlmError> {
        let transports = config
            .llm
            .providers
            .iter()
            .map(|(name, provider)| Ok((name.clone(), build_transport(name, provider)?)))
            .collect::<Result<HashMap<_, _>, LlmError>>()?;

        Self::with_transports(config, transports, health)
    }

    /// Build a gateway around caller-supplied transports
    ///
    /// Routing, credentials and resilience policies still come from
    /// `config`; every configured provider needs a transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the routing table cannot be built or a provider
    /// has no transport
    pub fn with_transports(
        config: &Config,
        transports: HashMap<String, Arc<dyn Transport>>,
        health: Arc<dyn CredentialHealth>,
    ) -> Result<Self, LlmError> {
        if let Some(missing) = config.llm.providers.keys().find(|name| !transports.contains_key(*name)) {
            return Err(LlmError::ProviderNotFound {
                provider: missing.clone(),
            });
        }

        let credentials = config
            .llm
            .providers
            .iter()
            .map(|(name, provider)| {
                let mut keys: Vec<CredentialContext> = provider
                    .keys
                    .iter()
                    .map(|key| CredentialContext::new(name.clone(), key.id.clone(), key.api_key.clone()))
                    .collect();

                if keys.is_empty() && !provider.provider_type.requires_key() {
                    keys.push(CredentialContext::anonymous(name.clone()));
                }

                (name.clone(), keys)
            })
            .collect();

        let metrics = LlmMetrics::new();
        let executor = ResilienceExecutor::from_config(&config.resilience, health).with_metrics(metrics.clone());

        tracing::info!(providers = transports.len(), "gateway initialised");

        Ok(Self {
            inner: Arc::new(GatewayInner {
                router: ModelRouter::new(&config.llm)?,
                transports,
                credentials,
                executor,
                stream_idle_timeout: config.resilience.stream_idle_timeout,
                metrics,
            }),
        })
    }

    /// Resolve a model string to the provider that will serve it
    ///
    /// # Errors
    ///
    /// Returns `LlmError::UnknownModel` or `LlmError::ProviderNotFound`
    pub fn resolve(&self, model: &str) -> Result<ResolvedModel, LlmError> {
        self.inner.router.resolve(model)
    }

    /// Credential built from a provider's first configured key
    pub fn credential_for(&self, provider: &str) -> Option<CredentialContext> {
        self.inner.credentials.get(provider)?.first().cloned()
    }

    /// Credential for a specific key of a provider
    pub fn credential(&self, provider: &str, key_id: &str) -> Option<CredentialContext> {
        self.inner
            .credentials
            .get(provider)?
            .iter()
            .find(|credential| credential.key_id == key_id)
            .cloned()
    }

    /// Circuit state of a provider, `Closed` when the breaker is disabled
    pub fn circuit_state(&self, provider: &str) -> CircuitState {
        self.inner
            .executor
            .circuit_breaker()
            .map_or(CircuitState::Closed, |breaker| breaker.state(provider))
    }

    /// Run a one-shot completion
    ///
    /// The response's `model` is the string the caller asked for, not the
    /// vendor's model id.
    ///
    /// # Errors
    ///
    /// Returns validation and routing errors before any network call, and
    /// otherwise the executor's final error
    pub async fn complete(
        &self,
        request: &ChatCompletionRequest,
        credential: &CredentialContext,
        cancel: &CancellationToken,
    ) -> Result<ChatCompletionResponse, LlmError> {
        request.validate()?;
        let (resolved, transport) = self.route(request, credential)?;
        let transport = transport.as_ref();

        let start = Instant::now();
        let operation = request.operation();
        let ctx = CallContext {
            operation: &operation,
            credential,
            cancel,
        };
        let call = OutboundCall {
            request,
            model_id: &resolved.model_id,
            credential,
            stream: false,
        };

        let result = self
            .inner
            .executor
            .execute(ctx, move |attempt| async move {
                tracing::debug!(provider = transport.name(), attempt, "issuing completion attempt");

                let response = ensure_success(transport.send(call).await?).await?;
                let body = response.bytes().await?;
                transport.parse_response(&body)
            })
            .await;

        let metrics = &self.inner.metrics;
        let provider = resolved.provider_name.as_str();

        match result {
            Ok(mut response) => {
                response.model.clone_from(&request.model);
                metrics.record_request(provider, &request.model, false, "success", start);
                metrics.record_usage(provider, &request.model, &response.usage);

                tracing::info!(
                    provider,
                    model = %request.model,
                    prompt_tokens = response.usage.prompt_tokens,
                    completion_tokens = response.usage.completion_tokens,
                    "completion finished"
                );

                Ok(response)
            }
            Err(error) => {
                metrics.record_request(provider, &request.model, false, error.label(), start);
                tracing::warn!(provider, model = %request.model, error = %error, "completion failed");
                Err(error)
            }
        }
    }

    /// Start a streaming completion
    ///
    /// Only establishing the stream is retried. Once a success status has
    /// been accepted, failures surface as the final item of the returned
    /// stream. The operation budget keeps running until the stream ends.
    ///
    /// # Errors
    ///
    /// Returns validation and routing errors before any network call, and
    /// otherwise the executor's final error
    pub async fn complete_stream(
        &self,
        request: &ChatCompletionRequest,
        credential: &CredentialContext,
        cancel: &CancellationToken,
    ) -> Result<ChunkStream, LlmError> {
        request.validate()?;
        let (resolved, transport) = self.route(request, credential)?;

        let start = Instant::now();
        let operation = request.operation();
        let deadline = tokio::time::Instant::now() + self.inner.executor.budget_for(&operation);
        let ctx = CallContext {
            operation: &operation,
            credential,
            cancel,
        };
        let call = OutboundCall {
            request,
            model_id: &resolved.model_id,
            credential,
            stream: true,
        };

        let sender = transport.as_ref();
        let result: Result<RawResponse, LlmError> = self
            .inner
            .executor
            .execute(ctx, move |attempt| async move {
                tracing::debug!(provider = sender.name(), attempt, "opening stream");
                ensure_success(sender.send(call).await?).await
            })
            .await;

        let metrics = self.inner.metrics.clone();
        let provider = resolved.provider_name;

        let response = match result {
            Ok(response) => response,
            Err(error) => {
                metrics.record_request(&provider, &request.model, true, error.label(), start);
                tracing::warn!(provider = %provider, model = %request.model, error = %error, "stream could not be opened");
                return Err(error);
            }
        };
        metrics.record_request(&provider, &request.model, true, "success", start);

        let translator = StreamTranslator::new(
            frames(response.into_byte_stream(), transport.framing()),
            transport.frame_parser(),
            TranslatorOptions {
                model: request.model.clone(),
                idle_timeout: self.inner.stream_idle_timeout,
                deadline: Some(deadline),
                cancel: cancel.clone(),
            },
        );

        let model = request.model.clone();
        let chunks = translator.into_stream().inspect(move |item| match item {
            Ok(chunk) => {
                metrics.record_chunk(&provider);
                if let Some(usage) = &chunk.usage {
                    metrics.record_usage(&provider, &model, usage);
                }
            }
            Err(error) => {
                tracing::warn!(provider = %provider, model = %model, error = %error, "stream ended with error");
            }
        });

        Ok(Box::pin(chunks))
    }

    /// Resolve the model and check the credential belongs to its provider
    fn route(
        &self,
        request: &ChatCompletionRequest,
        credential: &CredentialContext,
    ) -> Result<(ResolvedModel, Arc<dyn Transport>), LlmError> {
        let resolved = self.inner.router.resolve(&request.model)?;

        if credential.provider_id != resolved.provider_name {
            return Err(LlmError::InvalidRequest(format!(
                "model '{}' is served by provider '{}' but the credential belongs to '{}'",
                request.model, resolved.provider_name, credential.provider_id
            )));
        }

        let transport = self
            .inner
            .transports
            .get(&resolved.provider_name)
            .ok_or_else(|| LlmError::ProviderNotFound {
                provider: resolved.provider_name.clone(),
            })?;

        Ok((resolved, Arc::clone(transport)))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use bytes::Bytes;
    use http::{HeaderMap, StatusCode};
    use secrecy::SecretString;
    use switchboard_config::{ApiKeyConfig, LlmProviderConfig, LlmProviderType, ModelOverride};
    use switchboard_core::NoopHealth;

    use super::*;
    use crate::convert::openai::OpenAiFrameParser;
    use crate::provider::RawBody;
    use crate::stream::{FrameParser, Framing};

    /// Transport replaying scripted `(status, body)` pairs
    struct ScriptedTransport {
        script: Mutex<VecDeque<(u16, &'static str)>>,
        calls: AtomicU32,
        streamed: Mutex<Vec<bool>>,
        /// Keep every body open after its scripted bytes
        stall: bool,
    }

    impl ScriptedTransport {
        fn new(script: &[(u16, &'static str)]) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.iter().copied().collect()),
                calls: AtomicU32::new(0),
                streamed: Mutex::new(Vec::new()),
                stall: false,
            })
        }

        fn stalling(script: &[(u16, &'static str)]) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.iter().copied().collect()),
                calls: AtomicU32::new(0),
                streamed: Mutex::new(Vec::new()),
                stall: true,
            })
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        fn name(&self) -> &str {
            "openai"
        }

        fn framing(&self) -> Framing {
            Framing::ServerSentEvents
        }

        fn auth_headers(&self, _credential: &CredentialContext) -> Result<HeaderMap, LlmError> {
            Ok(HeaderMap::new())
        }

        async fn send(&self, call: OutboundCall<'_>) -> Result<RawResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.streamed.lock().unwrap().push(call.stream);

            let (status, body) = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| LlmError::Communication("script exhausted".into()))?;

            let bytes = Bytes::from_static(body.as_bytes());
            let body = if self.stall {
                let open = futures_util::stream::once(async move { Ok(bytes) }).chain(futures_util::stream::pending());
                RawBody::Streaming(Box::pin(open))
            } else {
                RawBody::Full(bytes)
            };

            Ok(RawResponse {
                status: StatusCode::from_u16(status).unwrap(),
                headers: HeaderMap::new(),
                body,
            })
        }

        fn parse_response(&self, body: &[u8]) -> Result<ChatCompletionResponse, LlmError> {
            crate::convert::openai::parse_response("openai", body)
        }

        fn frame_parser(&self) -> Box<dyn FrameParser> {
            Box::new(OpenAiFrameParser::new("openai"))
        }
    }

    const COMPLETION: &str = r#"{"id":"c1","created":1,"model":"gpt-4o-mini-2024-07-18","choices":[{"index":0,"message":{"role":"assistant","content":"Hi"},"finish_reason":"stop"}],"usage":{"prompt_tokens":3,"completion_tokens":1}}"#;

    const STREAM: &str = "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"Hel\"}}]}\n\n\
                          data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"lo\"},\"finish_reason\":\"stop\"}]}\n\n\
                          data: {\"id\":\"c1\",\"choices\":[],\"usage\":{\"prompt_tokens\":3,\"completion_tokens\":2}}\n\n\
                          data: [DONE]\n\n";

    fn config() -> Config {
        let mut provider = LlmProviderConfig::new(LlmProviderType::Openai);
        provider.keys.push(ApiKeyConfig {
            id: "primary".to_owned(),
            api_key: SecretString::from("sk-test"),
        });
        provider.models.overrides.insert(
            "gpt-4o-mini".to_owned(),
            ModelOverride {
                alias: Some("fast".to_owned()),
            },
        );

        let mut config = Config::default();
        config.llm.providers.insert("openai".to_owned(), provider);
        config.resilience.retry.initial_delay = Duration::from_millis(10);
        config.resilience.retry.max_delay = Duration::from_millis(50);
        config
    }

    fn gateway(transport: Arc<ScriptedTransport>) -> Gateway {
        let transports = HashMap::from([("openai".to_owned(), transport as Arc<dyn Transport>)]);
        Gateway::with_transports(&config(), transports, Arc::new(NoopHealth)).unwrap()
    }

    fn request() -> ChatCompletionRequest {
        ChatCompletionRequest::new("fast", vec![crate::types::Message::user("hi")])
    }

    #[tokio::test]
    async fn completion_reports_requested_alias() {
        let transport = ScriptedTransport::new(&[(200, COMPLETION)]);
        let gateway = gateway(Arc::clone(&transport));
        let credential = gateway.credential_for("openai").unwrap();

        let response = gateway
            .complete(&request(), &credential, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.model, "fast");
        assert_eq!(response.content(), "Hi");
        assert_eq!(response.usage.total_tokens, 4);
        assert_eq!(*transport.streamed.lock().unwrap(), [false]);
    }

    #[tokio::test(start_paused = true)]
    async fn completion_retries_transient_status() {
        let transport = ScriptedTransport::new(&[(503, "busy"), (200, COMPLETION)]);
        let gateway = gateway(Arc::clone(&transport));
        let credential = gateway.credential_for("openai").unwrap();

        let response = gateway
            .complete(&request(), &credential, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.content(), "Hi");
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalid_request_never_reaches_transport() {
        let transport = ScriptedTransport::new(&[]);
        let gateway = gateway(Arc::clone(&transport));
        let credential = gateway.credential_for("openai").unwrap();

        let empty = ChatCompletionRequest::new("fast", vec![]);
        let err = gateway
            .complete(&empty, &credential, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::InvalidRequest(_)));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn credential_must_belong_to_resolved_provider() {
        let transport = ScriptedTransport::new(&[(200, COMPLETION)]);
        let gateway = gateway(Arc::clone(&transport));
        let foreign = CredentialContext::new("anthropic", "k1", SecretString::from("sk-ant"));

        let err = gateway
            .complete(&request(), &foreign, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::InvalidRequest(_)));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stream_yields_canonical_chunks() {
        let transport = ScriptedTransport::new(&[(200, STREAM)]);
        let gateway = gateway(Arc::clone(&transport));
        let credential = gateway.credential("openai", "primary").unwrap();

        let stream = gateway
            .complete_stream(&request(), &credential, &CancellationToken::new())
            .await
            .unwrap();
        let chunks: Vec<_> = stream.collect().await;

        assert_eq!(chunks.len(), 2);
        let first = chunks[0].as_ref().unwrap();
        let last = chunks[1].as_ref().unwrap();

        assert_eq!(first.model, "fast");
        assert_eq!(first.content(), "Hel");
        assert_eq!(last.content(), "lo");
        assert!(last.is_finishing());
        assert_eq!(last.usage.map(|u| u.total_tokens), Some(5));
        assert_eq!(first.id, last.id);
        assert_eq!(*transport.streamed.lock().unwrap(), [true]);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_stream_is_bounded_by_the_operation_budget() {
        let transport = ScriptedTransport::stalling(&[(
            200,
            "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hel\"}}]}\n\n",
        )]);
        let mut config = config();
        config
            .resilience
            .timeouts
            .operations
            .insert("completion".to_owned(), Duration::from_secs(1));
        let transports = HashMap::from([("openai".to_owned(), Arc::clone(&transport) as Arc<dyn Transport>)]);
        let gateway = Gateway::with_transports(&config, transports, Arc::new(NoopHealth)).unwrap();
        let credential = gateway.credential_for("openai").unwrap();

        let mut stream = gateway
            .complete_stream(&request(), &credential, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(stream.next().await.unwrap().unwrap().content(), "Hel");

        let next = tokio::time::timeout(Duration::from_secs(600), stream.next())
            .await
            .expect("stream ends once the budget is spent");
        assert!(matches!(next, Some(Err(LlmError::Timeout(_)))));
        assert!(stream.next().await.is_none());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stream_open_failure_is_returned_directly() {
        let transport = ScriptedTransport::new(&[(401, r#"{"error":{"message":"bad key"}}"#)]);
        let gateway = gateway(Arc::clone(&transport));
        let credential = gateway.credential_for("openai").unwrap();

        let Err(err) = gateway
            .complete_stream(&request(), &credential, &CancellationToken::new())
            .await
        else {
            panic!("expected error");
        };

        assert_eq!(err.provider_kind(), Some(switchboard_core::ErrorKind::InvalidApiKey));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_transport_is_rejected() {
        let result = Gateway::with_transports(&config(), HashMap::new(), Arc::new(NoopHealth));
        assert!(matches!(result, Err(LlmError::ProviderNotFound { .. })));
    }

    #[test]
    fn keyless_ollama_gets_anonymous_credential() {
        let mut config = Config::default();
        config
            .llm
            .providers
            .insert("local".to_owned(), LlmProviderConfig::new(LlmProviderType::Ollama));

        let gateway = Gateway::from_config(&config, Arc::new(NoopHealth)).unwrap();
        let credential = gateway.credential_for("local").unwrap();

        assert!(credential.api_key.is_none());
        assert!(gateway.credential("local", "primary").is_none());
    }
}
