use std::collections::BTreeMap;
use std::time::Duration;

use futures_util::TryStreamExt;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde::Serialize;

use super::{RawBody, RawResponse};
use crate::error::LlmError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared HTTP plumbing for every transport
///
/// Owns the connection pool and the provider's static headers. Requests
/// are sent as JSON and the body is handed back unread.
pub struct HttpSender {
    provider: String,
    client: Client,
    static_headers: HeaderMap,
}

impl HttpSender {
    /// Create a sender for one provider
    ///
    /// # Errors
    ///
    /// Returns `LlmError::InvalidRequest` if a configured header name or
    /// value is invalid, or `LlmError::Communication` if the HTTP client
    /// cannot be built
    pub fn new(provider: &str, headers: &BTreeMap<String, String>) -> Result<Self, LlmError> {
        let mut static_headers = HeaderMap::new();

        for (name, value) in headers {
            let name = HeaderName::try_from(name.as_str())
                .map_err(|e| LlmError::InvalidRequest(format!("invalid header name '{name}': {e}")))?;
            let value = HeaderValue::try_from(value.as_str())
                .map_err(|e| LlmError::InvalidRequest(format!("invalid value for header '{name}': {e}")))?;
            static_headers.insert(name, value);
        }

        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| LlmError::Communication(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            provider: provider.to_owned(),
            client,
            static_headers,
        })
    }

    /// POST a JSON body and return the response without reading it
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Timeout` or `LlmError::Communication` if no
    /// response was received
    pub async fn post_json<T>(&self, url: &str, auth: HeaderMap, body: &T) -> Result<RawResponse, LlmError>
    where
        T: Serialize + Sync + ?Sized,
    {
        let response = self
            .client
            .post(url)
            .headers(self.static_headers.clone())
            .headers(auth)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(provider = %self.provider, error = %e, "upstream request failed");
                transport_error(&e)
            })?;

        let status = response.status();
        let headers = response.headers().clone();

        tracing::debug!(provider = %self.provider, status = %status, "upstream responded");

        let stream = response.bytes_stream().map_err(|e| transport_error(&e));

        Ok(RawResponse {
            status,
            headers,
            body: RawBody::Streaming(Box::pin(stream)),
        })
    }
}

fn transport_error(error: &reqwest::Error) -> LlmError {
    if error.is_timeout() {
        LlmError::Timeout(error.to_string())
    } else {
        LlmError::Communication(error.to_string())
    }
}
