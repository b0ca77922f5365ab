//! Persisted catalog of available [`Plugin`] records: a curated set loaded
//! from `registry/plugin_registry.json` plus user-declared entries in
//! `registry/custom_plugins.json`. Add/remove/enable/disable operations
//! mirror the persisted-config shape used for MCP server configuration
//! elsewhere in this workspace, generalized from a single file to the
//! curated/custom split this catalog needs.

use std::{collections::HashMap, path::{Path, PathBuf}};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{error::Result, types::Plugin};

const CURATED_FILENAME: &str = "plugin_registry.json";
const CUSTOM_FILENAME: &str = "custom_plugins.json";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PluginSet {
    #[serde(default)]
    plugins: HashMap<String, Plugin>,
}

/// Catalog of known plugins, split into a curated (read-mostly) set and a
/// custom (user-declared) set. Lookups merge both; custom entries win on id
/// collision since they represent an explicit user override.
#[derive(Debug, Clone)]
pub struct PluginRegistry {
    curated: PluginSet,
    custom: PluginSet,
    curated_path: PathBuf,
    custom_path: PathBuf,
}

impl PluginRegistry {
    /// Load both catalog files from `registry_dir`, treating missing files
    /// as empty.
    pub fn load(registry_dir: &Path) -> Result<Self> {
        let curated_path = registry_dir.join(CURATED_FILENAME);
        let custom_path = registry_dir.join(CUSTOM_FILENAME);
        Ok(Self {
            curated: read_set(&curated_path)?,
            custom: read_set(&custom_path)?,
            curated_path,
            custom_path,
        })
    }

    /// All plugin ids, custom entries shadowing curated ones of the same
    /// id.
    pub fn list(&self) -> Vec<&Plugin> {
        let mut merged: HashMap<&str, &Plugin> =
            self.curated.plugins.iter().map(|(id, p)| (id.as_str(), p)).collect();
        merged.extend(self.custom.plugins.iter().map(|(id, p)| (id.as_str(), p)));
        merged.into_values().collect()
    }

    pub fn get(&self, id: &str) -> Option<&Plugin> {
        self.custom.plugins.get(id).or_else(|| self.curated.plugins.get(id))
    }

    /// Add or replace a custom plugin record.
    pub fn add_custom(&mut self, plugin: Plugin) -> Result<()> {
        info!(id = %plugin.id, "adding custom plugin");
        self.custom.plugins.insert(plugin.id.clone(), plugin);
        self.save_custom()
    }

    /// Remove a custom plugin record. No-op (returns `false`) for curated
    /// entries or unknown ids.
    pub fn remove_custom(&mut self, id: &str) -> Result<bool> {
        let removed = self.custom.plugins.remove(id).is_some();
        if removed {
            self.save_custom()?;
        }
        Ok(removed)
    }

    /// Replace the curated catalog wholesale (e.g. after a registry
    /// refresh) and persist it.
    pub fn replace_curated(&mut self, plugins: Vec<Plugin>) -> Result<()> {
        self.curated.plugins = plugins.into_iter().map(|p| (p.id.clone(), p)).collect();
        self.save_curated()
    }

    fn save_curated(&self) -> Result<()> {
        write_set(&self.curated_path, &self.curated)
    }

    fn save_custom(&self) -> Result<()> {
        write_set(&self.custom_path, &self.custom)
    }
}

fn read_set(path: &Path) -> Result<PluginSet> {
    if !path.exists() {
        debug!(path = %path.display(), "plugin catalog file not found, using empty");
        return Ok(PluginSet::default());
    }
    let data = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

fn write_set(path: &Path, set: &PluginSet) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_string_pretty(set)?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, data)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::collections::HashMap as Map;

    use tempfile::tempdir;

    use super::*;
    use crate::types::{AuthType, InstallType};

    fn sample(id: &str) -> Plugin {
        Plugin {
            id: id.to_string(),
            name: format!("org/{id}"),
            install_type: InstallType::Npm,
            package: Some(format!("@org/{id}")),
            command: None,
            args: vec![],
            environment: Map::new(),
            config_schema: serde_json::json!({}),
            server_url: None,
            auth_type: AuthType::None,
            transport: None,
            custom: false,
        }
    }

    #[test]
    fn missing_files_yield_empty_registry() {
        let dir = tempdir().unwrap();
        let reg = PluginRegistry::load(dir.path()).unwrap();
        assert!(reg.list().is_empty());
    }

    #[test]
    fn custom_add_persists_and_shadows_curated() {
        let dir = tempdir().unwrap();
        let mut reg = PluginRegistry::load(dir.path()).unwrap();
        reg.replace_curated(vec![sample("fs")]).unwrap();

        let mut custom_fs = sample("fs");
        custom_fs.custom = true;
        custom_fs.command = Some("./local-fs-server".to_string());
        reg.add_custom(custom_fs).unwrap();

        let reloaded = PluginRegistry::load(dir.path()).unwrap();
        assert_eq!(reloaded.list().len(), 1);
        assert_eq!(reloaded.get("fs").unwrap().command.as_deref(), Some("./local-fs-server"));
    }

    #[test]
    fn remove_custom_does_not_touch_curated() {
        let dir = tempdir().unwrap();
        let mut reg = PluginRegistry::load(dir.path()).unwrap();
        reg.replace_curated(vec![sample("fs")]).unwrap();
        assert!(!reg.remove_custom("fs").unwrap());
        assert!(reg.get("fs").is_some());
    }
}
