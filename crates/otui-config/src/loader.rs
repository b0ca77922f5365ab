use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{
    env_subst::substitute_env,
    error::Result,
    migrate::migrate,
    schema::{SystemConfig, UserConfig},
};

/// Returns the platform-specific system config directory (`~/.config/otui/`
/// on Linux).
pub fn system_config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "otui").map(|d| d.config_dir().to_path_buf())
}

pub fn system_config_path() -> PathBuf {
    system_config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("settings.toml")
}

/// Load the system config (just `data_directory`), defaulting to an empty
/// config (meaning "use the default data directory") if the file is
/// missing.
pub fn load_system_config() -> Result<SystemConfig> {
    let path = system_config_path();
    if !path.exists() {
        return Ok(SystemConfig::default());
    }
    let raw = std::fs::read_to_string(&path)?;
    Ok(toml::from_str(&raw)?)
}

pub fn save_system_config(config: &SystemConfig) -> Result<()> {
    let path = system_config_path();
    write_atomic_0600(&path, &toml::to_string_pretty(config)?)
}

/// Load the user config file (`<dataDir>/config.toml`), applying
/// `${VAR}` environment substitution and all migration rules. A missing
/// file yields a fully-migrated default config.
pub fn load_user_config(data_dir: &Path) -> Result<UserConfig> {
    let path = data_dir.join("config.toml");
    let mut config = if path.exists() {
        let raw = std::fs::read_to_string(&path)?;
        let raw = substitute_env(&raw);
        toml::from_str(&raw)?
    } else {
        debug!(path = %path.display(), "no user config found, using defaults");
        UserConfig::default()
    };
    migrate(&mut config);
    Ok(config)
}

pub fn save_user_config(data_dir: &Path, config: &UserConfig) -> Result<()> {
    let path = data_dir.join("config.toml");
    write_atomic_0600(&path, &toml::to_string_pretty(config)?)
}

/// Write `contents` to `path` atomically (temp file + rename) with mode
/// 0600.
fn write_atomic_0600(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, contents)?;
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
    use tempfile::tempdir;

    use super::*;
    use crate::schema::ProviderConfig;

    #[test]
    fn missing_user_config_yields_migrated_defaults() {
        let dir = tempdir().unwrap();
        let config = load_user_config(dir.path()).unwrap();
        assert_eq!(config.default_provider.as_deref(), Some("ollama"));
        assert_eq!(config.max_iterations_resolved(), 10);
        assert!(config.multi_step_enabled());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let mut config = UserConfig::default();
        config.providers.insert("anthropic".to_string(), ProviderConfig {
            enabled: true,
            ..Default::default()
        });
        save_user_config(dir.path(), &config).unwrap();

        let loaded = load_user_config(dir.path()).unwrap();
        assert_eq!(loaded.default_provider.as_deref(), Some("anthropic"));
    }

    #[test]
    fn env_substitution_applies_before_parse() {
        let dir = tempdir().unwrap();
        // SAFETY: test-only, single-threaded within this test's scope.
        unsafe {
            std::env::set_var("OTUI_CONFIG_TEST_PROVIDER", "openrouter");
        }
        std::fs::write(
            dir.path().join("config.toml"),
            "default_provider = \"${OTUI_CONFIG_TEST_PROVIDER}\"\n",
        )
        .unwrap();
        let config = load_user_config(dir.path()).unwrap();
        assert_eq!(config.default_provider.as_deref(), Some("openrouter"));
        unsafe {
            std::env::remove_var("OTUI_CONFIG_TEST_PROVIDER");
        }
    }
}
