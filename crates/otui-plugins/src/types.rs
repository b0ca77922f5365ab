//! Plugin catalog data model: the declarative `Plugin` record (how to
//! install/launch/connect to a plugin) and `InstalledPlugin` (its runtime
//! install record, one-to-one with a `Plugin` at a point in time).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallType {
    Npm,
    Pip,
    Go,
    Binary,
    Manual,
    Remote,
    Docker,
}

impl InstallType {
    /// Local plugins are launched as a child process speaking stdio;
    /// remote plugins are reached over HTTP.
    pub fn is_local(self) -> bool {
        !matches!(self, Self::Remote | Self::Docker)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    None,
    Headers,
    OAuth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PluginTransport {
    Sse,
    StreamableHttp,
}

/// A plugin catalog record: everything needed to install or connect to it.
/// `args` and `environment` values may embed template slots — see
/// [`crate::template`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plugin {
    pub id: String,
    pub name: String,
    pub install_type: InstallType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub environment: HashMap<String, String>,
    #[serde(default)]
    pub config_schema: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
    #[serde(default = "default_auth_none")]
    pub auth_type: AuthType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<PluginTransport>,
    /// True if this record was added by the user rather than sourced from
    /// the curated registry.
    #[serde(default)]
    pub custom: bool,
}

fn default_auth_none() -> AuthType {
    AuthType::None
}

impl Plugin {
    /// The public tool-namespace prefix: last `/`-delimited segment of
    /// `name`.
    pub fn short_name(&self) -> &str {
        otui_common::types::short_plugin_name(&self.name)
    }
}

/// Install-time record of a `Plugin`, persisted in the tabular catalog
/// (`plugins.db`).
#[derive(Debug, Clone, PartialEq)]
pub struct InstalledPlugin {
    pub id: String,
    pub version: String,
    pub install_path: String,
    pub install_method: InstallType,
    pub server_url: Option<String>,
    pub auth_type: Option<AuthType>,
    pub transport: Option<PluginTransport>,
    pub installed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Coarse trust signal surfaced to the user before a plugin is enabled.
/// Not a security boundary — advisory only, the policy gate in `otui-mcp`
/// is what actually prevents tool execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustLevel {
    /// Curated registry entry, installed through a package manager.
    Verified,
    /// Curated registry entry using a raw binary/manual/remote launch, or a
    /// user-declared custom entry.
    Unverified,
}

/// Score a plugin's trust level from its provenance and install mechanism.
/// Custom (user-added) entries are always `Unverified`: nothing vouches for
/// them. Curated entries installed via a package manager (npm/pip/go) are
/// `Verified`; curated entries launched as a raw binary, a manual command,
/// or a remote endpoint stay `Unverified` since there is no package-registry
/// provenance to check.
pub fn trust_level(plugin: &Plugin) -> TrustLevel {
    if plugin.custom {
        return TrustLevel::Unverified;
    }
    match plugin.install_type {
        InstallType::Npm | InstallType::Pip | InstallType::Go => TrustLevel::Verified,
        InstallType::Binary | InstallType::Manual | InstallType::Remote | InstallType::Docker => {
            TrustLevel::Unverified
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(install_type: InstallType, custom: bool) -> Plugin {
        Plugin {
            id: "fs".into(),
            name: "org/fs-server".into(),
            install_type,
            package: None,
            command: None,
            args: vec![],
            environment: HashMap::new(),
            config_schema: serde_json::json!({}),
            server_url: None,
            auth_type: AuthType::None,
            transport: None,
            custom,
        }
    }

    #[test]
    fn short_name_strips_namespace() {
        assert_eq!(sample(InstallType::Npm, false).short_name(), "fs-server");
    }

    #[test]
    fn npm_curated_is_verified() {
        assert_eq!(trust_level(&sample(InstallType::Npm, false)), TrustLevel::Verified);
    }

    #[test]
    fn custom_is_always_unverified() {
        assert_eq!(trust_level(&sample(InstallType::Npm, true)), TrustLevel::Unverified);
    }

    #[test]
    fn binary_curated_is_unverified() {
        assert_eq!(trust_level(&sample(InstallType::Binary, false)), TrustLevel::Unverified);
    }
}
