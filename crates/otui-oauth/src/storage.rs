use std::{collections::HashMap, path::PathBuf};

use tracing::{debug, info, warn};

use crate::{
    error::Result,
    types::OAuthTokens,
};

/// File-based token storage, one JSON file per data directory holding all
/// plugins' tokens keyed by plugin id.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { path: data_dir.into().join("oauth_tokens.json") }
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn load(&self, plugin_id: &str) -> Option<OAuthTokens> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), plugin_id, "token file not found");
                return None;
            },
            Err(e) => {
                warn!(path = %self.path.display(), plugin_id, error = %e, "token file read failed");
                return None;
            },
        };

        let map: HashMap<String, OAuthTokens> = match serde_json::from_str(&data) {
            Ok(m) => m,
            Err(e) => {
                warn!(path = %self.path.display(), plugin_id, error = %e, "token file parse failed");
                return None;
            },
        };

        map.get(plugin_id).cloned()
    }

    pub fn save(&self, plugin_id: &str, tokens: &OAuthTokens) -> Result<()> {
        info!(path = %self.path.display(), plugin_id, "saving OAuth tokens");
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut map: HashMap<String, OAuthTokens> = std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|d| serde_json::from_str(&d).ok())
            .unwrap_or_default();
        map.insert(plugin_id.to_string(), tokens.clone());

        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, serde_json::to_string_pretty(&map)?)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))?;
        }
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    pub fn delete(&self, plugin_id: &str) -> Result<()> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(_) => return Ok(()),
        };
        let mut map: HashMap<String, OAuthTokens> = serde_json::from_str(&data)?;
        map.remove(plugin_id);
        std::fs::write(&self.path, serde_json::to_string_pretty(&map)?)?;
        Ok(())
    }

    pub fn list(&self) -> Vec<String> {
        std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|d| serde_json::from_str::<HashMap<String, OAuthTokens>>(&d).ok())
            .map(|m| m.into_keys().collect())
            .unwrap_or_default()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use secrecy::Secret;
    use tempfile::tempdir;

    use super::*;

    fn sample_tokens() -> OAuthTokens {
        OAuthTokens {
            access_token: Secret::new("abc".to_string()),
            refresh_token: Some(Secret::new("def".to_string())),
            id_token: None,
            account_id: Some("user-1".to_string()),
            expires_at: Some(1_700_000_000),
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = TokenStore::new(dir.path());
        store.save("weather-mcp", &sample_tokens()).unwrap();

        let loaded = store.load("weather-mcp").unwrap();
        assert_eq!(loaded.account_id.as_deref(), Some("user-1"));
    }

    #[test]
    fn load_missing_plugin_is_none() {
        let dir = tempdir().unwrap();
        let store = TokenStore::new(dir.path());
        assert!(store.load("nonexistent").is_none());
    }

    #[test]
    fn delete_removes_entry_but_keeps_others() {
        let dir = tempdir().unwrap();
        let store = TokenStore::new(dir.path());
        store.save("a", &sample_tokens()).unwrap();
        store.save("b", &sample_tokens()).unwrap();
        store.delete("a").unwrap();

        assert!(store.load("a").is_none());
        assert!(store.load("b").is_some());
    }

    #[test]
    fn list_returns_all_plugin_ids() {
        let dir = tempdir().unwrap();
        let store = TokenStore::new(dir.path());
        store.save("a", &sample_tokens()).unwrap();
        store.save("b", &sample_tokens()).unwrap();
        let mut ids = store.list();
        ids.sort();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }
}
