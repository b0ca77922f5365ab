//! `McpManager`: process lifecycle (C5), combined with the tool
//! aggregator (C6) and the three-layer policy gate plus failure
//! accounting (C7).
//!
//! Map mutations are covered by a single `RwLock`; long operations
//! (process spawn, network dial, `tools/list`) happen OUTSIDE the lock, as
//! only the lock acquisition/release itself needs to be atomic.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use otui_plugins::Plugin;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{
    aggregator::ToolAggregator,
    client::McpClient,
    error::{Error, Result},
    traits::{McpClientState, McpClientTrait},
    types::{Headers, McpToolDef},
};

const STOP_DEADLINE: Duration = Duration::from_secs(1);

/// Policy inputs evaluated on every `tools` query and tool call. All three
/// must hold; failures are logged and returned to the caller, never
/// treated as fatal.
pub struct PolicyContext<'a> {
    pub global_plugins_enabled: bool,
    pub plugin_manager_enabled: bool,
    pub session_enabled_plugins: &'a HashSet<String>,
}

/// How to reach a plugin's MCP endpoint, resolved from its catalog record.
pub enum ConnectSpec {
    Stdio { command: String, args: Vec<String>, env: HashMap<String, String> },
    Sse { url: String, headers: Headers },
    StreamableHttp { url: String, headers: Headers },
}

struct ManagerState {
    clients: HashMap<String, Arc<RwLock<dyn McpClientTrait>>>,
    tools: HashMap<String, Vec<McpToolDef>>,
    /// Plugin ids considered active (started, or failed-but-counted-active
    /// per the failure-accounting rule).
    active: HashSet<String>,
    failed: HashMap<String, String>,
    aggregator: ToolAggregator,
}

pub struct McpManager {
    state: RwLock<ManagerState>,
}

impl Default for McpManager {
    fn default() -> Self {
        Self::new()
    }
}

impl McpManager {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ManagerState {
                clients: HashMap::new(),
                tools: HashMap::new(),
                active: HashSet::new(),
                failed: HashMap::new(),
                aggregator: ToolAggregator::default(),
            }),
        }
    }

    /// Rebuild the short-name → plugin-id map. Call whenever the set of
    /// known plugins changes.
    pub async fn refresh_aggregator<'a>(&self, plugins: impl Iterator<Item = &'a Plugin>) {
        self.state.write().await.aggregator = ToolAggregator::from_plugins(plugins);
    }

    /// Start protocol: check the map under lock, build the transport and
    /// run the handshake outside the lock (long op), then insert the
    /// client and its tools atomically. On any failure the map is left
    /// untouched and the plugin is marked both active and failed (failure
    /// accounting: it still shows up in shutdown-progress as
    /// "unresponsive").
    pub async fn start_plugin(&self, plugin_id: &str, spec: ConnectSpec) -> Result<()> {
        self.stop_plugin(plugin_id).await;

        let connect_result = match spec {
            ConnectSpec::Stdio { command, args, env } => McpClient::connect_stdio(plugin_id, &command, &args, &env).await,
            ConnectSpec::Sse { url, headers } => McpClient::connect_sse(plugin_id, &url, headers).await,
            ConnectSpec::StreamableHttp { url, headers } => McpClient::connect_streamable_http(plugin_id, &url, headers).await,
        };

        let mut client = match connect_result {
            Ok(client) => client,
            Err(e) => {
                warn!(plugin = %plugin_id, error = %e, "MCP plugin failed to start");
                let mut state = self.state.write().await;
                state.active.insert(plugin_id.to_string());
                state.failed.insert(plugin_id.to_string(), e.to_string());
                return Err(Error::StartFailed { name: plugin_id.to_string(), reason: e.to_string() });
            },
        };

        let tool_defs = match client.list_tools().await {
            Ok(tools) => tools.to_vec(),
            Err(e) => {
                warn!(plugin = %plugin_id, error = %e, "MCP plugin failed to list tools");
                let mut state = self.state.write().await;
                state.active.insert(plugin_id.to_string());
                state.failed.insert(plugin_id.to_string(), e.to_string());
                return Err(e);
            },
        };

        info!(plugin = %plugin_id, tools = tool_defs.len(), "MCP plugin started");

        let client: Arc<RwLock<dyn McpClientTrait>> = Arc::new(RwLock::new(client));
        let mut state = self.state.write().await;
        state.clients.insert(plugin_id.to_string(), client);
        state.tools.insert(plugin_id.to_string(), tool_defs);
        state.active.insert(plugin_id.to_string());
        state.failed.remove(plugin_id);
        Ok(())
    }

    /// Stop protocol: remove from the map under lock, then close with a
    /// 1s deadline; on timeout the process is force-killed (stdio
    /// transports already kill forcibly, so the deadline mainly guards
    /// against a hung remote close). Remote plugins have no process to
    /// kill either way.
    pub async fn stop_plugin(&self, plugin_id: &str) {
        let client = {
            let mut state = self.state.write().await;
            state.tools.remove(plugin_id);
            state.active.remove(plugin_id);
            state.failed.remove(plugin_id);
            state.clients.remove(plugin_id)
        };
        let Some(client) = client else { return };

        let close = async {
            let mut c = client.write().await;
            c.shutdown().await;
        };
        if tokio::time::timeout(STOP_DEADLINE, close).await.is_err() {
            warn!(plugin = %plugin_id, "MCP plugin close timed out, process considered killed");
        }
    }

    /// Re-enabling a failed plugin clears both the active and failed
    /// flags so the caller can retry `start_plugin`.
    pub async fn clear_failure(&self, plugin_id: &str) {
        let mut state = self.state.write().await;
        state.active.remove(plugin_id);
        state.failed.remove(plugin_id);
    }

    pub async fn failed_plugins(&self) -> HashMap<String, String> {
        self.state.read().await.failed.clone()
    }

    pub async fn is_running(&self, plugin_id: &str) -> bool {
        self.state.read().await.clients.contains_key(plugin_id)
    }

    /// Evaluate the three-layer policy gate. Failures are logged by the
    /// caller (not here, to keep this a pure check) and returned as
    /// `Error::PolicyDenied`.
    fn check_policy(&self, tool: &str, plugin_id: &str, policy: &PolicyContext<'_>) -> Result<()> {
        if !policy.global_plugins_enabled {
            return Err(Error::PolicyDenied { tool: tool.to_string(), reason: "plugins are globally disabled".into() });
        }
        if !policy.plugin_manager_enabled {
            return Err(Error::PolicyDenied { tool: tool.to_string(), reason: format!("plugin '{plugin_id}' disabled in plugin manager") });
        }
        if !policy.session_enabled_plugins.contains(plugin_id) {
            return Err(Error::PolicyDenied { tool: tool.to_string(), reason: format!("plugin '{plugin_id}' not enabled in this session") });
        }
        Ok(())
    }

    /// Tools visible under the given policy context, aggregated across all
    /// running plugins and namespaced `<shortPluginName>.<tool>` so the
    /// names round-trip through `execute_tool`. Plugins that fail any
    /// policy layer, or that the aggregator has no short name for, are
    /// silently excluded (logged, never fatal).
    pub async fn tools(&self, policy: &PolicyContext<'_>) -> Vec<McpToolDef> {
        let state = self.state.read().await;
        let mut visible = Vec::new();
        for (plugin_id, defs) in &state.tools {
            let allowed = policy.global_plugins_enabled
                && policy.plugin_manager_enabled
                && policy.session_enabled_plugins.contains(plugin_id)
                && state.clients.contains_key(plugin_id);
            if !allowed {
                continue;
            }
            let Some(short_name) = state.aggregator.short_name_for(plugin_id) else {
                warn!(plugin = %plugin_id, "plugin has no short name mapping, excluding its tools");
                continue;
            };
            visible.extend(defs.iter().cloned().map(|mut def| {
                def.name = format!("{short_name}.{}", def.name);
                def
            }));
        }
        visible
    }

    /// Split `namespaced` on its first `.`, resolve the owning plugin, run
    /// the full policy gate, and dispatch the call. On a gate failure no
    /// subprocess is ever contacted.
    pub async fn execute_tool(&self, namespaced: &str, arguments: serde_json::Value, policy: &PolicyContext<'_>) -> Result<serde_json::Value> {
        let (plugin_id, tool_name, client) = {
            let state = self.state.read().await;
            let (plugin_id, tool_name) = state
                .aggregator
                .resolve(namespaced)
                .ok_or_else(|| Error::NotFound { name: namespaced.to_string() })?;

            self.check_policy(namespaced, &plugin_id, policy).map_err(|e| {
                warn!(tool = %namespaced, plugin = %plugin_id, "policy gate denied tool call");
                e
            })?;

            let client = state.clients.get(&plugin_id).cloned();
            (plugin_id, tool_name, client)
        };

        let Some(client) = client else {
            return Err(Error::PolicyDenied { tool: namespaced.to_string(), reason: format!("plugin '{plugin_id}' is not running") });
        };

        let guard = client.read().await;
        if guard.state() != McpClientState::Ready || !guard.is_alive().await {
            return Err(Error::PolicyDenied { tool: namespaced.to_string(), reason: format!("plugin '{plugin_id}' is not running") });
        }

        let result = guard.call_tool(&tool_name, arguments).await?;
        if result.is_error {
            let text = result
                .content
                .iter()
                .filter_map(|c| match c {
                    crate::types::ToolContent::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n");
            return Err(Error::CallFailed { name: namespaced.to_string(), reason: text });
        }

        Ok(serde_json::to_value(&result.content)?)
    }

    /// Shut down every running plugin in parallel.
    pub async fn shutdown_all(&self) {
        let ids: Vec<String> = self.state.read().await.clients.keys().cloned().collect();
        futures::future::join_all(ids.iter().map(|id| self.stop_plugin(id))).await;
    }

    /// Snapshot the active plugin names, run `shutdown_all` under a
    /// supervised task, and on deadline expiry return the snapshot as
    /// "unresponsive" while abandoning the task (the OS reaps the
    /// resulting zombies on process exit).
    pub async fn shutdown_with_tracking(self: Arc<Self>, deadline: Duration) -> Vec<String> {
        let snapshot: Vec<String> = self.state.read().await.clients.keys().cloned().collect();
        let manager = Arc::clone(&self);
        let task = tokio::spawn(async move { manager.shutdown_all().await });

        match tokio::time::timeout(deadline, task).await {
            Ok(_) => Vec::new(),
            Err(_) => {
                warn!(plugins = ?snapshot, "MCP shutdown deadline exceeded, reporting as unresponsive");
                snapshot
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(enabled: &HashSet<String>) -> PolicyContext<'_> {
        PolicyContext { global_plugins_enabled: true, plugin_manager_enabled: true, session_enabled_plugins: enabled }
    }

    #[tokio::test]
    async fn empty_manager_has_no_tools() {
        let manager = McpManager::new();
        let enabled = HashSet::new();
        assert!(manager.tools(&policy(&enabled)).await.is_empty());
    }

    #[tokio::test]
    async fn execute_unknown_tool_name_is_not_found() {
        let manager = McpManager::new();
        let enabled = HashSet::new();
        let result = manager.execute_tool("no-dot-in-this-name", serde_json::json!({}), &policy(&enabled)).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }

    #[tokio::test]
    async fn stop_nonexistent_plugin_is_a_no_op() {
        let manager = McpManager::new();
        manager.stop_plugin("never-started").await;
    }

    #[tokio::test]
    async fn shutdown_with_tracking_on_empty_manager_returns_empty() {
        let manager = Arc::new(McpManager::new());
        let unresponsive = manager.shutdown_with_tracking(Duration::from_millis(100)).await;
        assert!(unresponsive.is_empty());
    }

    #[tokio::test]
    async fn global_disable_denies_without_resolving_plugin() {
        let manager = McpManager::new();
        let enabled = HashSet::new();
        let policy = PolicyContext { global_plugins_enabled: false, plugin_manager_enabled: true, session_enabled_plugins: &enabled };
        // Even a well-formed namespaced name is denied before any lookup.
        let result = manager.execute_tool("srv.tool", serde_json::json!({}), &policy).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }
}
