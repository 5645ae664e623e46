use secrecy::SecretString;

/// Credential used for a single outbound call
///
/// Passed explicitly to every gateway call so that retry and error
/// reports are attributed to the key that actually served the request.
#[derive(Debug, Clone)]
pub struct CredentialContext {
    /// Provider the credential belongs to (key in config)
    pub provider_id: String,
    /// Stable identifier of the key, safe to log
    pub key_id: String,
    /// Secret material, absent for providers without authentication
    pub api_key: Option<SecretString>,
}

impl CredentialContext {
    /// Create a context for an authenticated key
    pub fn new(provider_id: impl Into<String>, key_id: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            provider_id: provider_id.into(),
            key_id: key_id.into(),
            api_key: Some(api_key),
        }
    }

    /// Create a context for a provider that needs no credential
    pub fn anonymous(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            key_id: "anonymous".to_owned(),
            api_key: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn anonymous_context_has_no_key() {
        let ctx = CredentialContext::anonymous("ollama");
        assert_eq!(ctx.provider_id, "ollama");
        assert_eq!(ctx.key_id, "anonymous");
        assert!(ctx.api_key.is_none());
    }

    #[test]
    fn debug_output_redacts_secret() {
        let ctx = CredentialContext::new("openai", "primary", SecretString::from("sk-live-123"));
        let rendered = format!("{ctx:?}");
        assert!(!rendered.contains("sk-live-123"));
        assert_eq!(ctx.api_key.as_ref().map(|k| k.expose_secret().to_owned()).as_deref(), Some("sk-live-123"));
    }
}
