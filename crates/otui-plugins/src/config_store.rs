//! `plugins.toml`: per-plugin enabled flag and free-form config values.
//! This is the "Plugin Manager state" the second policy-gate layer reads
//! (`otui-mcp` owns enforcement; this crate only owns persistence).

use std::{collections::HashMap, path::{Path, PathBuf}};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PluginEntryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub config: HashMap<String, String>,
}

fn default_true() -> bool {
    true
}

impl Default for PluginEntryConfig {
    fn default() -> Self {
        Self { enabled: true, config: HashMap::new() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PluginConfigFile {
    #[serde(default)]
    plugins: HashMap<String, PluginEntryConfig>,
}

/// Loaded, mutable view over `plugins.toml`.
pub struct PluginConfigStore {
    path: PathBuf,
    file: PluginConfigFile,
}

impl PluginConfigStore {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = if path.exists() {
            toml::from_str(&std::fs::read_to_string(&path)?)?
        } else {
            PluginConfigFile::default()
        };
        Ok(Self { path, file })
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.file.plugins.get(id).is_none_or(|e| e.enabled)
    }

    pub fn entry(&self, id: &str) -> Option<&PluginEntryConfig> {
        self.file.plugins.get(id)
    }

    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> Result<()> {
        self.file.plugins.entry(id.to_string()).or_default().enabled = enabled;
        self.save()
    }

    pub fn set_config_value(&mut self, id: &str, key: &str, value: &str) -> Result<()> {
        self.file
            .plugins
            .entry(id.to_string())
            .or_default()
            .config
            .insert(key.to_string(), value.to_string());
        self.save()
    }

    pub fn remove(&mut self, id: &str) -> Result<()> {
        self.file.plugins.remove(id);
        self.save()
    }

    fn save(&self) -> Result<()> {
        info!(path = %self.path.display(), "saving plugin config");
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = toml::to_string_pretty(&self.file)?;
        let tmp_path = self.path.with_extension("toml.tmp");
        std::fs::write(&tmp_path, data)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))?;
        }
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn unknown_plugin_defaults_to_enabled() {
        let dir = tempdir().unwrap();
        let store = PluginConfigStore::load(dir.path().join("plugins.toml")).unwrap();
        assert!(store.is_enabled("fs"));
    }

    #[test]
    fn disable_persists_across_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plugins.toml");
        let mut store = PluginConfigStore::load(&path).unwrap();
        store.set_enabled("fs", false).unwrap();

        let reloaded = PluginConfigStore::load(&path).unwrap();
        assert!(!reloaded.is_enabled("fs"));
    }

    #[test]
    fn config_values_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plugins.toml");
        let mut store = PluginConfigStore::load(&path).unwrap();
        store.set_config_value("fs", "root", "/tmp").unwrap();

        let reloaded = PluginConfigStore::load(&path).unwrap();
        assert_eq!(reloaded.entry("fs").unwrap().config.get("root").map(String::as_str), Some("/tmp"));
    }
}
