//! Ollama chat API transport

use async_trait::async_trait;
use http::HeaderMap;
use switchboard_config::LlmProviderConfig;
use switchboard_core::CredentialContext;

use super::{HttpSender, OutboundCall, RawResponse, Transport, bearer_auth, default_base_url, join_url};
use crate::convert::ollama::{OllamaFrameParser, build_request, parse_response};
use crate::error::LlmError;
use crate::stream::{FrameParser, Framing};
use crate::types::ChatCompletionResponse;

/// Default local Ollama address
const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Ollama transport
///
/// Local servers need no key; one is sent as a bearer token when the
/// credential carries it (e.g. behind an authenticating proxy).
pub struct OllamaTransport {
    name: String,
    sender: HttpSender,
    endpoint: String,
}

impl OllamaTransport {
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
            endpoint: join_url(&base_url, "api/chat"),
            name,
        })
    }
}

#[async_trait]
impl Transport for OllamaTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn framing(&self) -> Framing {
        Framing::JsonLines
    }

    fn auth_headers(&self, credential: &CredentialContext) -> Result<HeaderMap, LlmError> {
        credential.api_key.as_ref().map_or_else(|| Ok(HeaderMap::new()), bearer_auth)
    }

    async fn send(&self, call: OutboundCall<'_>) -> Result<RawResponse, LlmError> {
        let body = build_request(call.request, call.model_id, call.stream);
        let auth = self.auth_headers(call.credential)?;

        tracing::debug!(provider = %self.name, model = %call.model_id, stream = call.stream, "sending chat request");

        self.sender.post_json(&self.endpoint, auth, &body).await
    }

    fn parse_response(&self, body: &[u8]) -> Result<ChatCompletionResponse, LlmError> {
        parse_response(&self.name, body)
    }

    fn frame_parser(&self) -> Box<dyn FrameParser> {
        Box::new(OllamaFrameParser::new(self.name.clone()))
    }
}
