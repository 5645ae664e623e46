use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// External credential-health service that receives provider error findings
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialHealthConfig {
    /// Whether findings are shipped to the service
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Base URL of the service; findings are posted to `<url>/errors`
    pub url: Url,
    /// Token sent in the `x-service-api-key` header
    #[serde(default)]
    pub service_api_key: Option<SecretString>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_enabled() -> bool {
    true
}
