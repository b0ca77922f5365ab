//! Builds one `ProviderAdapter` per enabled provider from config + vault
//! credentials, and caches `listModels` results per provider so repeated
//! lookups (e.g. a model picker) don't re-hit every backend's API on every
//! call. The cache has no TTL — the only way to clear it is
//! [`ProviderRegistry::invalidate_model_caches`], called on a data
//! directory switch.

use std::collections::HashMap;

use otui_config::UserConfig;
use otui_providers::{AnthropicAdapter, ModelInfo, OllamaAdapter, OpenAiAdapter, OpenRouterAdapter, ProviderAdapter};
use otui_vault::CredentialStore;
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::{Error, Result};

const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";

pub struct ProviderRegistry {
    adapters: HashMap<String, Box<dyn ProviderAdapter>>,
    model_cache: Mutex<HashMap<String, Vec<ModelInfo>>>,
}

impl ProviderRegistry {
    /// Builds an adapter for every provider `config` marks enabled.
    /// Missing credentials for a backend that needs one are a warning, not
    /// a fatal error — the rest of the providers still come up, matching
    /// the policy that a failed provider model fetch never blocks
    /// aggregation across the others.
    pub fn build(config: &UserConfig, credentials: &CredentialStore) -> Result<Self> {
        let mut adapters: HashMap<String, Box<dyn ProviderAdapter>> = HashMap::new();

        for (name, provider_config) in &config.providers {
            if !provider_config.enabled {
                continue;
            }
            let model = provider_config
                .default_model
                .clone()
                .or_else(|| config.default_model.clone())
                .unwrap_or_else(|| default_model_for(name).to_string());

            let adapter: Box<dyn ProviderAdapter> = match name.as_str() {
                "ollama" => {
                    let base_url = provider_config.base_url.clone().unwrap_or_else(|| DEFAULT_OLLAMA_BASE_URL.to_string());
                    Box::new(OllamaAdapter::new(base_url, model))
                },
                "openai" => match credentials.get("openai")? {
                    Some(key) => Box::new(OpenAiAdapter::new(key, model)),
                    None => {
                        warn!(provider = "openai", "enabled but no credential found, skipping");
                        continue;
                    },
                },
                "openrouter" => match credentials.get("openrouter")? {
                    Some(key) => Box::new(OpenRouterAdapter::new(key, model)),
                    None => {
                        warn!(provider = "openrouter", "enabled but no credential found, skipping");
                        continue;
                    },
                },
                "anthropic" => match credentials.get("anthropic")? {
                    Some(key) => Box::new(AnthropicAdapter::new(key, model)),
                    None => {
                        warn!(provider = "anthropic", "enabled but no credential found, skipping");
                        continue;
                    },
                },
                other => {
                    warn!(provider = other, "unknown provider name in config, skipping");
                    continue;
                },
            };
            adapters.insert(name.clone(), adapter);
        }

        Ok(Self { adapters, model_cache: Mutex::new(HashMap::new()) })
    }

    pub fn get(&self, name: &str) -> Result<&dyn ProviderAdapter> {
        self.adapters.get(name).map(Box::as_ref).ok_or_else(|| Error::UnknownProvider(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.adapters.keys().map(String::as_str)
    }

    /// Cached `listModels`: the first call per provider hits the backend,
    /// later calls return the cached list until the cache is invalidated.
    pub async fn list_models_cached(&self, name: &str) -> Result<Vec<ModelInfo>> {
        if let Some(cached) = self.model_cache.lock().await.get(name) {
            return Ok(cached.clone());
        }
        let adapter = self.get(name)?;
        let models = adapter.list_models().await?;
        self.model_cache.lock().await.insert(name.to_string(), models.clone());
        Ok(models)
    }

    /// Drops every cached `listModels` result. Called when the data
    /// directory is switched, since the new directory's config may enable
    /// different providers or point the same provider at a different base
    /// URL.
    pub async fn invalidate_model_caches(&self) {
        self.model_cache.lock().await.clear();
    }
}

fn default_model_for(provider: &str) -> &'static str {
    match provider {
        "ollama" => "llama3.1",
        "openai" => "gpt-4o",
        "openrouter" => "openai/gpt-4o",
        "anthropic" => "claude-opus-4-5-20251101",
        _ => "default",
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use otui_config::ProviderConfig;
    use otui_vault::KeyVault;
    use std::sync::Arc;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn ollama_enabled_with_no_credential_still_builds() {
        let dir = tempdir().unwrap();
        let vault = Arc::new(KeyVault::plaintext());
        let credentials = CredentialStore::new(dir.path(), vault);

        let mut config = UserConfig::default();
        config.providers.insert("ollama".to_string(), ProviderConfig { enabled: true, ..Default::default() });

        let registry = ProviderRegistry::build(&config, &credentials).unwrap();
        assert!(registry.get("ollama").is_ok());
    }

    #[test]
    fn provider_missing_credential_is_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        let vault = Arc::new(KeyVault::plaintext());
        let credentials = CredentialStore::new(dir.path(), vault);

        let mut config = UserConfig::default();
        config.providers.insert("anthropic".to_string(), ProviderConfig { enabled: true, ..Default::default() });

        let registry = ProviderRegistry::build(&config, &credentials).unwrap();
        assert!(matches!(registry.get("anthropic"), Err(Error::UnknownProvider(_))));
    }

    #[tokio::test]
    async fn invalidate_clears_cache() {
        let dir = tempdir().unwrap();
        let vault = Arc::new(KeyVault::plaintext());
        let credentials = CredentialStore::new(dir.path(), vault);

        let mut config = UserConfig::default();
        config.providers.insert("ollama".to_string(), ProviderConfig { enabled: true, ..Default::default() });
        let registry = ProviderRegistry::build(&config, &credentials).unwrap();

        registry.model_cache.lock().await.insert("ollama".to_string(), vec![]);
        assert!(registry.model_cache.lock().await.contains_key("ollama"));
        registry.invalidate_model_caches().await;
        assert!(registry.model_cache.lock().await.is_empty());
    }
}
