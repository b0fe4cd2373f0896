use super::anthropic::AnthropicAdapter;
use super::gemini::GeminiAdapter;
use super::ollama::OllamaAdapter;
use super::traits::{AdapterSet, ProviderAdapter};
use super::types::ProviderKind;
use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::error::SwitchboardError;
use std::sync::Arc;

/// Create one adapter for a provider kind, resolving its credential through
/// the supplied store. The local server needs none.
pub fn create_adapter(
    kind: ProviderKind,
    config: &Config,
    credentials: &dyn CredentialStore,
) -> Result<Arc<dyn ProviderAdapter>, SwitchboardError> {
    let timeout = config.dispatch.request_timeout_secs;
    let adapter: Arc<dyn ProviderAdapter> = match kind {
        ProviderKind::Anthropic => {
            let secret = credentials.get_credential(kind)?;
            match config.providers.anthropic_base_url.as_deref() {
                Some(base) => Arc::new(AnthropicAdapter::with_base_url(
                    secret.expose(),
                    base,
                    timeout,
                )),
                None => Arc::new(AnthropicAdapter::new(secret.expose(), timeout)),
            }
        }
        ProviderKind::Gemini => {
            let secret = credentials.get_credential(kind)?;
            match config.providers.gemini_base_url.as_deref() {
                Some(base) => {
                    Arc::new(GeminiAdapter::with_base_url(secret.expose(), base, timeout))
                }
                None => Arc::new(GeminiAdapter::new(secret.expose(), timeout)),
            }
        }
        ProviderKind::Ollama => Arc::new(OllamaAdapter::new(
            Some(config.providers.ollama_base_url.as_str()),
            timeout,
        )),
    };
    Ok(adapter)
}

/// Build adapters for every provider kind the model catalog references.
///
/// A kind whose credential is missing is skipped with a warning rather than
/// failing the whole set; its models will fail dispatch and fall back through
/// their chains like any other unreachable backend.
pub fn build_adapter_set(
    config: &Config,
    credentials: &dyn CredentialStore,
) -> Result<AdapterSet, SwitchboardError> {
    let mut kinds: Vec<ProviderKind> = config.models.iter().map(|m| m.provider).collect();
    kinds.sort_by_key(|k| k.to_string());
    kinds.dedup();

    let mut set = AdapterSet::new();
    for kind in kinds {
        match create_adapter(kind, config, credentials) {
            Ok(adapter) => set.insert(adapter),
            Err(SwitchboardError::Credentials(e)) => {
                tracing::warn!(provider = %kind, "Skipping provider: {e}");
            }
            Err(e) => return Err(e),
        }
    }

    if set.is_empty() {
        return Err(SwitchboardError::Other(anyhow::anyhow!(
            "no provider adapter could be constructed; configure at least one credential \
             or a local server"
        )));
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::Secret;
    use crate::error::CredentialError;

    struct NoCredentials;

    impl CredentialStore for NoCredentials {
        fn get_credential(&self, kind: ProviderKind) -> Result<Secret, CredentialError> {
            Err(CredentialError::NotConfigured(kind.to_string()))
        }
    }

    struct AllCredentials;

    impl CredentialStore for AllCredentials {
        fn get_credential(&self, _kind: ProviderKind) -> Result<Secret, CredentialError> {
            Ok(Secret::new("test-key"))
        }
    }

    #[test]
    fn missing_cloud_credentials_still_yield_local_adapter() {
        let config = Config::default();
        let set = build_adapter_set(&config, &NoCredentials).unwrap();
        assert!(set.get(ProviderKind::Ollama).is_some());
        assert!(set.get(ProviderKind::Anthropic).is_none());
        assert!(set.get(ProviderKind::Gemini).is_none());
    }

    #[test]
    fn full_credentials_yield_all_adapters() {
        let config = Config::default();
        let set = build_adapter_set(&config, &AllCredentials).unwrap();
        assert_eq!(set.kinds().len(), 3);
    }

    #[test]
    fn catalog_without_local_models_and_no_credentials_fails() {
        let mut config = Config::default();
        config.models.retain(|m| m.provider != ProviderKind::Ollama);
        config
            .models
            .iter_mut()
            .for_each(|m| m.fallback.retain(|f| f != "llama3.1:8b"));
        let err = build_adapter_set(&config, &NoCredentials).unwrap_err();
        assert!(err.to_string().contains("no provider adapter"));
    }
}
