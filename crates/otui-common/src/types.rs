//! Data types shared across crates: the wire-level `Message`/`ToolCall`
//! shapes exchanged between the orchestrator, the provider adapters, and
//! the MCP subsystem.

use serde::{Deserialize, Serialize};

/// One message in a conversation, as appended to a session or sent to a
/// provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: i64,
    /// Streaming assistant messages are not yet final; everything else is
    /// immutable once appended.
    #[serde(default = "default_true")]
    pub persistent: bool,
}

fn default_true() -> bool {
    true
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>, timestamp: i64) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp,
            persistent: true,
        }
    }
}

/// A provider-agnostic tool call. `name` uses dotted namespacing
/// `<plugin-short-name>.<tool>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// One step of the tool-call orchestration loop, recorded regardless of
/// whether it involved a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationStep {
    pub n: u32,
    pub purpose: String,
    pub start: i64,
    pub end: i64,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_msg: Option<String>,
}

/// Splits a namespaced tool name `<shortPluginName>.<tool>` on the FIRST
/// `.`, matching the aggregator's resolution rule.
pub fn split_tool_name(namespaced: &str) -> Option<(&str, &str)> {
    namespaced.split_once('.')
}

/// Last `/`-delimited segment of a plugin's name; the public namespace
/// prefix for its tools.
pub fn short_plugin_name(plugin_name: &str) -> &str {
    plugin_name.rsplit('/').next().unwrap_or(plugin_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_first_dot_only() {
        assert_eq!(split_tool_name("fs.read.file"), Some(("fs", "read.file")));
        assert_eq!(split_tool_name("fs.read"), Some(("fs", "read")));
        assert_eq!(split_tool_name("fsread"), None);
    }

    #[test]
    fn short_name_is_last_segment() {
        assert_eq!(short_plugin_name("org/fs-server"), "fs-server");
        assert_eq!(short_plugin_name("fs-server"), "fs-server");
    }
}
