//! Transport trait and per-vendor implementations
//!
//! A transport knows how to turn a canonical request into one vendor HTTP
//! call and how to read that vendor's bodies back. Retrying, classification
//! and stream translation happen around it, never inside it.

pub mod anthropic;
pub mod google;
mod sender;
pub mod ollama;
pub mod openai;

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use http::header::{AUTHORIZATION, HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use switchboard_config::{LlmProviderConfig, LlmProviderType};
use switchboard_core::CredentialContext;

pub use self::sender::HttpSender;
use crate::error::LlmError;
use crate::stream::{FrameParser, Framing};
use crate::types::{ChatCompletionRequest, ChatCompletionResponse};

/// Raw response body chunks as they arrive from the network
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, LlmError>> + Send>>;

/// Everything a transport needs to issue one attempt
#[derive(Debug, Clone, Copy)]
pub struct OutboundCall<'a> {
    /// Canonical request as supplied by the caller
    pub request: &'a ChatCompletionRequest,
    /// Vendor model identifier after alias resolution
    pub model_id: &'a str,
    /// Credential the attempt is attributed to
    pub credential: &'a CredentialContext,
    /// Whether to ask the vendor for incremental output
    pub stream: bool,
}

/// Body of a raw vendor response
pub enum RawBody {
    /// Fully buffered body
    Full(Bytes),
    /// Body still being received
    Streaming(ByteStream),
}

impl std::fmt::Debug for RawBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full(bytes) => f.debug_tuple("Full").field(bytes).finish(),
            Self::Streaming(_) => f.debug_tuple("Streaming").finish_non_exhaustive(),
        }
    }
}

/// Vendor response before classification
#[derive(Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: RawBody,
}

impl RawResponse {
    /// Read the whole body into memory
    ///
    /// # Errors
    ///
    /// Returns the first error produced by the underlying byte stream
    pub async fn bytes(self) -> Result<Bytes, LlmError> {
        match self.body {
            RawBody::Full(bytes) => Ok(bytes),
            RawBody::Streaming(mut stream) => {
                let mut buffer = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buffer.extend_from_slice(&chunk?);
                }
                Ok(buffer.freeze())
            }
        }
    }

    /// Body as a byte stream, regardless of how it was received
    pub fn into_byte_stream(self) -> ByteStream {
        match self.body {
            RawBody::Full(bytes) => Box::pin(futures_util::stream::once(async move { Ok(bytes) })),
            RawBody::Streaming(stream) => stream,
        }
    }
}

/// Vendor-specific HTTP transport
#[async_trait]
pub trait Transport: Send + Sync {
    /// Configured provider name
    fn name(&self) -> &str;

    /// How streamed bodies are split into frames
    fn framing(&self) -> Framing;

    /// Authentication headers for a credential
    ///
    /// # Errors
    ///
    /// Returns `LlmError::InvalidRequest` if the credential cannot be encoded
    /// into a header or a required key is missing
    fn auth_headers(&self, credential: &CredentialContext) -> Result<HeaderMap, LlmError>;

    /// Issue one attempt
    ///
    /// Any HTTP status is returned as a response; only failing to obtain a
    /// response at all is an error.
    async fn send(&self, call: OutboundCall<'_>) -> Result<RawResponse, LlmError>;

    /// Parse a successful non-streaming body
    ///
    /// The returned `model` field is the vendor's; callers replace it with
    /// the requested alias.
    fn parse_response(&self, body: &[u8]) -> Result<ChatCompletionResponse, LlmError>;

    /// Fresh parser for one streamed body
    fn frame_parser(&self) -> Box<dyn FrameParser>;
}

/// Build the transport for a configured provider
///
/// # Errors
///
/// Returns an error if the provider's static headers are invalid
pub fn build_transport(name: &str, config: &LlmProviderConfig) -> Result<Arc<dyn Transport>, LlmError> {
    let transport: Arc<dyn Transport> = match config.provider_type {
        LlmProviderType::Openai => Arc::new(openai::OpenAiTransport::new(name.to_owned(), config)?),
        LlmProviderType::Anthropic => Arc::new(anthropic::AnthropicTransport::new(name.to_owned(), config)?),
        LlmProviderType::Google => Arc::new(google::GoogleTransport::new(name.to_owned(), config)?),
        LlmProviderType::Ollama => Arc::new(ollama::OllamaTransport::new(name.to_owned(), config)?),
    };

    Ok(transport)
}

/// Join a path onto a base URL without doubling slashes
fn join_url(base: &url::Url, path: &str) -> String {
    let base = base.as_str().trim_end_matches('/');
    format!("{base}/{}", path.trim_start_matches('/'))
}

/// Default base URL for a vendor, used when none is configured
fn default_base_url(raw: &str) -> Result<url::Url, LlmError> {
    url::Url::parse(raw).map_err(|e| LlmError::InvalidRequest(format!("invalid base URL '{raw}': {e}")))
}

/// Key carried by a credential, or an error naming the provider
fn require_key<'a>(provider: &str, credential: &'a CredentialContext) -> Result<&'a SecretString, LlmError> {
    credential
        .api_key
        .as_ref()
        .ok_or_else(|| LlmError::InvalidRequest(format!("no API key available for provider '{provider}'")))
}

/// `Authorization: Bearer <key>`
fn bearer_auth(key: &SecretString) -> Result<HeaderMap, LlmError> {
    secret_header(AUTHORIZATION, &format!("Bearer {}", key.expose_secret()))
}

/// Single sensitive header carrying a key
fn secret_header(name: HeaderName, value: &str) -> Result<HeaderMap, LlmError> {
    let mut value = HeaderValue::try_from(value)
        .map_err(|_| LlmError::InvalidRequest(format!("API key is not a valid value for header '{name}'")))?;
    value.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(name, value);
    Ok(headers)
}
