use crate::error::CredentialError;
use crate::provider::ProviderKind;

/// An opaque secret. Never printed; `Debug` and `Display` are redacted.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

/// Credential-lookup capability consumed by the adapter factory.
///
/// Key storage mechanics live outside the core; this trait is the whole
/// surface the core sees.
pub trait CredentialStore: Send + Sync {
    fn get_credential(&self, kind: ProviderKind) -> Result<Secret, CredentialError>;
}

/// Resolves credentials from provider-specific environment variables.
pub struct EnvCredentialStore;

impl EnvCredentialStore {
    fn env_candidates(kind: ProviderKind) -> &'static [&'static str] {
        match kind {
            ProviderKind::Anthropic => &["ANTHROPIC_API_KEY"],
            ProviderKind::Gemini => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
            ProviderKind::Ollama => &[],
        }
    }
}

impl CredentialStore for EnvCredentialStore {
    fn get_credential(&self, kind: ProviderKind) -> Result<Secret, CredentialError> {
        for env_var in Self::env_candidates(kind) {
            if let Ok(value) = std::env::var(env_var) {
                let value = value.trim();
                if !value.is_empty() {
                    return Ok(Secret::new(value));
                }
            }
        }
        Err(CredentialError::NotConfigured(kind.to_string()))
    }
}
