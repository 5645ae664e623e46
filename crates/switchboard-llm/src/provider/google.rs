//! Google Generative Language API transport

use async_trait::async_trait;
use http::HeaderMap;
use http::header::HeaderName;
use secrecy::ExposeSecret;
use switchboard_config::LlmProviderConfig;
use switchboard_core::CredentialContext;
use url::Url;

use super::{HttpSender, OutboundCall, RawResponse, Transport, default_base_url, join_url, require_key, secret_header};
use crate::convert::google::{GoogleFrameParser, build_request, parse_response};
use crate::error::LlmError;
use crate::stream::{FrameParser, Framing};
use crate::types::ChatCompletionResponse;

/// Default Google Generative Language API base URL
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google transport
///
/// The model is part of the URL rather than the body, and streaming uses
/// a separate method.
pub struct GoogleTransport {
    name: String,
    sender: HttpSender,
    base_url: Url,
}

impl GoogleTransport {
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
            base_url,
            name,
        })
    }

    fn endpoint(&self, model_id: &str, stream: bool) -> String {
        let method = if stream {
            "streamGenerateContent?alt=sse"
        } else {
            "generateContent"
        };
        join_url(&self.base_url, &format!("models/{model_id}:{method}"))
    }
}

#[async_trait]
impl Transport for GoogleTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn framing(&self) -> Framing {
        Framing::ServerSentEvents
    }

    fn auth_headers(&self, credential: &CredentialContext) -> Result<HeaderMap, LlmError> {
        let key = require_key(&self.name, credential)?;
        secret_header(HeaderName::from_static("x-goog-api-key"), key.expose_secret())
    }

    async fn send(&self, call: OutboundCall<'_>) -> Result<RawResponse, LlmError> {
        let body = build_request(call.request);
        let auth = self.auth_headers(call.credential)?;
        let url = self.endpoint(call.model_id, call.stream);

        tracing::debug!(provider = %self.name, model = %call.model_id, stream = call.stream, "sending generate content request");

        self.sender.post_json(&url, auth, &body).await
    }

    fn parse_response(&self, body: &[u8]) -> Result<ChatCompletionResponse, LlmError> {
        parse_response(&self.name, body)
    }

    fn frame_parser(&self) -> Box<dyn FrameParser> {
        Box::new(GoogleFrameParser::new(self.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use switchboard_config::LlmProviderType;

    fn transport() -> GoogleTransport {
        GoogleTransport::new("google".into(), &LlmProviderConfig::new(LlmProviderType::Google)).unwrap()
    }

    #[test]
    fn endpoint_depends_on_streaming() {
        let transport = transport();

        assert_eq!(
            transport.endpoint("gemini-2.5-flash", false),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert_eq!(
            transport.endpoint("gemini-2.5-flash", true),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:streamGenerateContent?alt=sse"
        );
    }

    #[test]
    fn key_goes_in_header_not_url() {
        let credential = CredentialContext::new("google", "k1", SecretString::from("AIza-test"));
        let headers = transport().auth_headers(&credential).unwrap();

        assert_eq!(headers["x-goog-api-key"], "AIza-test");
    }
}
