//! Composition root: bootstraps config, vault, sessions, plugins and MCP
//! in the order each needs the last, and owns the data-directory-switch
//! sequence.

use std::{collections::HashSet, path::PathBuf, sync::Arc};

use otui_chat::ChatOrchestrator;
use otui_config::{SecurityConfig, UserConfig, VaultModeConfig, loader, logging};
use otui_mcp::{ConnectSpec, McpManager, PolicyContext};
use otui_oauth::TokenStore;
use otui_plugins::{AuthType, Plugin, PluginConfigStore, PluginRegistry};
use otui_sessions::{LockGuard, Session, SessionStore};
use otui_vault::{CredentialStore, FileSshSigner, KeyVault, SshSigner};
use secrecy::SecretString;
use tracing::{info, warn};

use crate::{
    error::{Error, Result},
    providers::ProviderRegistry,
};

const DEFAULT_SSH_KEY_PATH: &str = ".ssh/id_ed25519";

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "otui")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

fn resolve_ssh_key_path(security: &SecurityConfig) -> PathBuf {
    match &security.ssh_key_path {
        Some(path) => PathBuf::from(path),
        None => dirs_next::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(DEFAULT_SSH_KEY_PATH),
    }
}

/// Everything wired up for one running instance: config, vault-backed
/// credential store, the session store (plus whichever session + instance
/// lock are currently held), the plugin catalog, the MCP manager, the
/// provider registry, and the tool-call orchestrator sitting on top.
pub struct AppContext {
    pub data_dir: PathBuf,
    pub user_config: UserConfig,
    pub vault: Arc<KeyVault>,
    pub credentials: CredentialStore,
    pub sessions: SessionStore,
    pub plugins: PluginRegistry,
    pub plugin_config: PluginConfigStore,
    pub mcp: Arc<McpManager>,
    pub providers: ProviderRegistry,
    pub orchestrator: Arc<ChatOrchestrator>,
    pub oauth_tokens: TokenStore,

    instance_lock: Option<LockGuard>,
    session: Option<(Session, LockGuard)>,
}

impl AppContext {
    /// Boots the whole stack against `data_dir_override` (falling back to
    /// the system config's `data_directory`, then the platform default),
    /// prompting for an SSH passphrase via `passphrase` only if the vault
    /// is configured for `ssh_key` mode.
    pub async fn bootstrap(data_dir_override: Option<PathBuf>, passphrase: Option<SecretString>) -> Result<Self> {
        let system_config = loader::load_system_config()?;
        let data_dir = data_dir_override
            .or_else(|| system_config.data_directory.map(PathBuf::from))
            .unwrap_or_else(default_data_dir);
        std::fs::create_dir_all(&data_dir)?;

        logging::point_at(&data_dir, "otui.log")?;

        let user_config = loader::load_user_config(&data_dir)?;
        let vault = Arc::new(build_vault(&user_config.security, passphrase.as_ref())?);
        vault.unseal()?;

        let credentials = CredentialStore::new(&data_dir, vault.clone());
        let sessions = SessionStore::new(&data_dir);
        let instance_lock = Some(sessions.lock_instance()?);

        let registry_dir = data_dir.join("registry");
        let plugins = PluginRegistry::load(&registry_dir)?;
        let plugin_config = PluginConfigStore::load(data_dir.join("plugins.toml"))?;

        let mcp = Arc::new(McpManager::new());
        mcp.refresh_aggregator(plugins.list().into_iter()).await;

        let providers = ProviderRegistry::build(&user_config, &credentials)?;
        let orchestrator = Arc::new(ChatOrchestrator::with_max_iterations(mcp.clone(), user_config.max_iterations_resolved()));
        let oauth_tokens = TokenStore::new(&data_dir);

        info!(data_dir = %data_dir.display(), "otui bootstrapped");

        Ok(Self {
            data_dir,
            user_config,
            vault,
            credentials,
            sessions,
            plugins,
            plugin_config,
            mcp,
            providers,
            orchestrator,
            oauth_tokens,
            instance_lock,
            session: None,
        })
    }

    pub fn set_session(&mut self, session: Session, guard: LockGuard) {
        self.session = Some((session, guard));
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref().map(|(s, _)| s)
    }

    pub fn session_mut(&mut self) -> Option<&mut Session> {
        self.session.as_mut().map(|(s, _)| s)
    }

    /// The policy context for the currently open session. Falls back to an
    /// empty enabled-plugin set with no session open, denying every tool.
    pub fn policy<'a>(&'a self, empty: &'a HashSet<String>) -> PolicyContext<'a> {
        PolicyContext {
            global_plugins_enabled: self.user_config.plugins_enabled,
            plugin_manager_enabled: true,
            session_enabled_plugins: self.session().map(|s| &s.enabled_plugins).unwrap_or(empty),
        }
    }

    /// Starts every plugin the current session has enabled and the plugin
    /// manager has not disabled.
    pub async fn start_session_plugins(&self) -> Result<()> {
        let Some(session) = self.session() else { return Ok(()) };
        for plugin_id in &session.enabled_plugins {
            if !self.plugin_config.is_enabled(plugin_id) {
                continue;
            }
            let Some(plugin) = self.plugins.get(plugin_id) else {
                warn!(plugin = %plugin_id, "session references an unknown plugin, skipping");
                continue;
            };
            let spec = self.connect_spec_for(plugin)?;
            if let Err(e) = self.mcp.start_plugin(plugin_id, spec).await {
                warn!(plugin = %plugin_id, error = %e, "failed to start session plugin");
            }
        }
        Ok(())
    }

    /// Implements the data-directory switch: drop the MCP manager (which
    /// kills every running plugin process), release the current session
    /// and instance locks, reload config from the new directory, take the
    /// new instance lock, clear the in-memory session, and invalidate
    /// every provider's cached model list since the new directory's config
    /// may enable different providers or point them at different hosts.
    pub async fn switch_data_dir(&mut self, new_data_dir: PathBuf, passphrase: Option<SecretString>) -> Result<()> {
        self.mcp.shutdown_all().await;
        self.session = None;
        self.instance_lock = None;

        std::fs::create_dir_all(&new_data_dir)?;
        logging::point_at(&new_data_dir, "otui.log")?;

        let user_config = loader::load_user_config(&new_data_dir)?;
        let vault = Arc::new(build_vault(&user_config.security, passphrase.as_ref())?);
        vault.unseal()?;

        let credentials = CredentialStore::new(&new_data_dir, vault.clone());
        let sessions = SessionStore::new(&new_data_dir);
        let instance_lock = Some(sessions.lock_instance()?);

        let registry_dir = new_data_dir.join("registry");
        let plugins = PluginRegistry::load(&registry_dir)?;
        let plugin_config = PluginConfigStore::load(new_data_dir.join("plugins.toml"))?;
        self.mcp.refresh_aggregator(plugins.list().into_iter()).await;

        let providers = ProviderRegistry::build(&user_config, &credentials)?;
        providers.invalidate_model_caches().await;

        self.data_dir = new_data_dir;
        self.user_config = user_config;
        self.vault = vault;
        self.credentials = credentials;
        self.sessions = sessions;
        self.plugins = plugins;
        self.plugin_config = plugin_config;
        self.providers = providers;
        self.instance_lock = instance_lock;

        self.oauth_tokens = TokenStore::new(&self.data_dir);

        info!(data_dir = %self.data_dir.display(), "switched data directory");
        Ok(())
    }

    /// Resolves how to reach `plugin`, layering in whatever credentials its
    /// `auth_type` calls for: `Headers` pulls static header values out of
    /// the plugin's entry in `plugins.toml`, `OAuth` attaches a bearer token
    /// from the token store if one has been stored for it.
    fn connect_spec_for(&self, plugin: &Plugin) -> Result<ConnectSpec> {
        if plugin.install_type.is_local() {
            let command = plugin
                .command
                .clone()
                .ok_or_else(|| Error::Message(format!("plugin '{}' has no launch command", plugin.id)))?;
            return Ok(ConnectSpec::Stdio { command, args: plugin.args.clone(), env: plugin.environment.clone() });
        }

        let url = plugin
            .server_url
            .clone()
            .ok_or_else(|| Error::Message(format!("plugin '{}' has no server url", plugin.id)))?;
        let headers = self.auth_headers_for(plugin);
        match plugin.transport {
            Some(otui_plugins::PluginTransport::Sse) | None => Ok(ConnectSpec::Sse { url, headers }),
            Some(otui_plugins::PluginTransport::StreamableHttp) => Ok(ConnectSpec::StreamableHttp { url, headers }),
        }
    }

    fn auth_headers_for(&self, plugin: &Plugin) -> otui_mcp::types::Headers {
        match plugin.auth_type {
            AuthType::None => Default::default(),
            AuthType::Headers => self.plugin_config.entry(&plugin.id).map(|e| e.config.clone()).unwrap_or_default(),
            AuthType::OAuth => match self.oauth_tokens.load(&plugin.id) {
                Some(tokens) => {
                    use secrecy::ExposeSecret as _;
                    let mut headers = otui_mcp::types::Headers::new();
                    headers.insert("Authorization".to_string(), format!("Bearer {}", tokens.access_token.expose_secret()));
                    headers
                },
                None => {
                    warn!(plugin = %plugin.id, "oauth plugin has no stored tokens, connecting unauthenticated");
                    Default::default()
                },
            },
        }
    }
}

fn build_vault(security: &SecurityConfig, passphrase: Option<&SecretString>) -> Result<KeyVault> {
    match security.vault_mode {
        VaultModeConfig::Plaintext => Ok(KeyVault::plaintext()),
        VaultModeConfig::SshKey => {
            let path = resolve_ssh_key_path(security);
            let signer: Arc<dyn SshSigner> = Arc::new(FileSshSigner::load(&path, passphrase)?);
            Ok(KeyVault::ssh_key(signer))
        },
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[tokio::test]
    async fn bootstrap_against_fresh_dir_uses_plaintext_vault() {
        let dir = tempdir().unwrap();
        let ctx = AppContext::bootstrap(Some(dir.path().to_path_buf()), None).await.unwrap();
        assert_eq!(ctx.vault.status(), otui_vault::VaultStatus::Unsealed);
        assert!(ctx.vault.is_plaintext());
    }

    #[tokio::test]
    async fn switch_data_dir_moves_instance_lock() {
        let dir_a = tempdir().unwrap();
        let dir_b = tempdir().unwrap();
        let mut ctx = AppContext::bootstrap(Some(dir_a.path().to_path_buf()), None).await.unwrap();

        ctx.switch_data_dir(dir_b.path().to_path_buf(), None).await.unwrap();
        assert_eq!(ctx.data_dir, dir_b.path());

        // The old directory's instance lock was released, so a fresh
        // context can now be bootstrapped against it.
        let _reopened = AppContext::bootstrap(Some(dir_a.path().to_path_buf()), None).await.unwrap();
    }
}
