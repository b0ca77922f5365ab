//! Typed configuration schema: system config (`settings.toml`) and user
//! config (`config.toml`).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// System config at `~/.config/otui/settings.toml`: just the data directory
/// pointer, read before anything else can be unlocked.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub data_directory: Option<String>,
}

/// Per-provider settings (credentials are stored separately, via the
/// vault; this only carries non-secret provider configuration).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub enabled: bool,
    pub base_url: Option<String>,
    pub default_model: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub vault_mode: VaultModeConfig,
    /// Path to the OpenSSH private key used to derive the vault's
    /// symmetric key in `ssh_key` mode. Defaults to `~/.ssh/id_ed25519`
    /// when unset.
    pub ssh_key_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VaultModeConfig {
    #[default]
    Plaintext,
    SshKey,
}

/// Legacy, pre-migration shape of the ollama-specific block. Only
/// `default_model` is migrated; the rest is read-and-discarded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyOllamaConfig {
    pub default_model: Option<String>,
}

/// User config at `<dataDir>/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    pub providers: HashMap<String, ProviderConfig>,

    pub default_provider: Option<String>,
    pub default_model: Option<String>,
    pub last_used_provider: Option<String>,

    pub security: SecurityConfig,

    pub plugins_enabled: bool,

    pub enable_multi_step: Option<bool>,
    pub max_iterations: Option<u32>,

    /// Pre-migration legacy field; cleared by `migrate()` once its value
    /// has been promoted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ollama: Option<LegacyOllamaConfig>,
}

impl UserConfig {
    /// Resolved multi-step toggle, defaulting to `true`.
    pub fn multi_step_enabled(&self) -> bool {
        self.enable_multi_step.unwrap_or(true)
    }

    /// Resolved iteration cap, defaulting to `10`.
    pub fn max_iterations_resolved(&self) -> u32 {
        self.max_iterations.unwrap_or(10)
    }
}
