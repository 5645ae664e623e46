//! Anthropic Messages API transport

use async_trait::async_trait;
use http::HeaderMap;
use http::header::{HeaderName, HeaderValue};
use secrecy::ExposeSecret;
use switchboard_config::LlmProviderConfig;
use switchboard_core::CredentialContext;

use super::{HttpSender, OutboundCall, RawResponse, Transport, default_base_url, join_url, require_key, secret_header};
use crate::convert::anthropic::{AnthropicFrameParser, build_request, parse_response};
use crate::error::LlmError;
use crate::stream::{FrameParser, Framing};
use crate::types::ChatCompletionResponse;

/// Default Anthropic API base URL
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Anthropic API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic transport
pub struct AnthropicTransport {
    name: String,
    sender: HttpSender,
    endpoint: String,
}

impl AnthropicTransport {
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
            endpoint: join_url(&base_url, "messages"),
            name,
        })
    }
}

#[async_trait]
impl Transport for AnthropicTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn framing(&self) -> Framing {
        Framing::ServerSentEvents
    }

    fn auth_headers(&self, credential: &CredentialContext) -> Result<HeaderMap, LlmError> {
        let key = require_key(&self.name, credential)?;

        let mut headers = secret_header(HeaderName::from_static("x-api-key"), key.expose_secret())?;
        headers.insert(
            HeaderName::from_static("anthropic-version"),
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        Ok(headers)
    }

    async fn send(&self, call: OutboundCall<'_>) -> Result<RawResponse, LlmError> {
        let body = build_request(call.request, call.model_id, call.stream);
        let auth = self.auth_headers(call.credential)?;

        tracing::debug!(provider = %self.name, model = %call.model_id, stream = call.stream, "sending messages request");

        self.sender.post_json(&self.endpoint, auth, &body).await
    }

    fn parse_response(&self, body: &[u8]) -> Result<ChatCompletionResponse, LlmError> {
        parse_response(&self.name, body)
    }

    fn frame_parser(&self) -> Box<dyn FrameParser> {
        Box::new(AnthropicFrameParser::new(self.name.clone()))
    }
}
