use secrecy::{ExposeSecret, SecretString};
use switchboard_core::ProviderErrorInfo;
use url::Url;

use crate::error::HealthError;

/// Header carrying the service token
const SERVICE_KEY_HEADER: &str = "x-service-api-key";

/// Async HTTP client for the credential-health service
#[derive(Clone)]
pub struct HealthClient {
    http: reqwest::Client,
    errors_url: Url,
    service_api_key: Option<SecretString>,
}

impl HealthClient {
    /// Create a new client
    ///
    /// Findings are posted to `<base_url>/errors`; a missing trailing slash
    /// on `base_url` is tolerated.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be joined or the HTTP client
    /// cannot be built
    pub fn new(base_url: &Url, service_api_key: Option<SecretString>) -> Result<Self, HealthError> {
        let mut base = base_url.clone();
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }

        let errors_url = base
            .join("errors")
            .map_err(|e| HealthError::InvalidUrl(format!("{base_url}: {e}")))?;

        let http = reqwest::Client::builder().build().map_err(HealthError::Request)?;

        Ok(Self {
            http,
            errors_url,
            service_api_key,
        })
    }

    /// Report one provider failure
    ///
    /// POST `/errors`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request fails or the service returns an error
    pub async fn report(&self, info: &ProviderErrorInfo) -> Result<(), HealthError> {
        let mut request = self.http.post(self.errors_url.clone()).json(info);

        if let Some(key) = &self.service_api_key {
            request = request.header(SERVICE_KEY_HEADER, key.expose_secret());
        }

        let response = request.send().await?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            Err(HealthError::Api { status, message })
        }
    }
}

impl std::fmt::Debug for HealthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthClient")
            .field("errors_url", &self.errors_url)
            .finish_non_exhaustive()
    }
}
