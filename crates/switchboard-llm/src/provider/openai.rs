//! OpenAI-compatible transport

use async_trait::async_trait;
use http::HeaderMap;
use switchboard_config::LlmProviderConfig;
use switchboard_core::CredentialContext;
use url::Url;

use super::{HttpSender, OutboundCall, RawResponse, Transport, bearer_auth, default_base_url, join_url, require_key};
use crate::convert::openai::{OpenAiFrameParser, build_request, parse_response};
use crate::error::LlmError;
use crate::stream::{FrameParser, Framing};
use crate::types::ChatCompletionResponse;

/// Default `OpenAI` API base URL
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Whether the provider is the canonical `OpenAI` API (vs a compatible third-party)
fn is_canonical_openai(base_url: &Url) -> bool {
    base_url.host_str().is_some_and(|h| h == "api.openai.com")
}

/// OpenAI-compatible transport
pub struct OpenAiTransport {
    name: String,
    sender: HttpSender,
    endpoint: String,
    include_usage: bool,
}

impl OpenAiTransport {
    /// Create from provider configuration
    ///
    /// # Errors
    ///
    /// Returns `LlmError::InvalidRequest` if a configured header is invalid
    pub fn new(name: String, config: &LlmProviderConfig) -> Result<Self, LlmError> {
        let base_url = match &config.base_url {
            Some(url) => url.clone(),
            None => default_base_url(DEFAULT_BASE_URL)?,
        };

        Ok(Self {
            sender: HttpSender::new(&name, &config.headers)?,
            endpoint: join_url(&base_url, "chat/completions"),
            // Compatible servers often reject unknown stream options
            include_usage: is_canonical_openai(&base_url),
            name,
        })
    }
}

#[async_trait]
impl Transport for OpenAiTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn framing(&self) -> Framing {
        Framing::ServerSentEvents
    }

    fn auth_headers(&self, credential: &CredentialContext) -> Result<HeaderMap, LlmError> {
        bearer_auth(require_key(&self.name, credential)?)
    }

    async fn send(&self, call: OutboundCall<'_>) -> Result<RawResponse, LlmError> {
        let body = build_request(call.request, call.model_id, call.stream, self.include_usage);
        let auth = self.auth_headers(call.credential)?;

        tracing::debug!(provider = %self.name, model = %call.model_id, stream = call.stream, "sending chat completion");

        self.sender.post_json(&self.endpoint, auth, &body).await
    }

    fn parse_response(&self, body: &[u8]) -> Result<ChatCompletionResponse, LlmError> {
        parse_response(&self.name, body)
    }

    fn frame_parser(&self) -> Box<dyn FrameParser> {
        Box::new(OpenAiFrameParser::new(self.name.clone()))
    }
}
