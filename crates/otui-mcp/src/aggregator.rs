//! Tool name aggregation: maps `<shortPluginName>.<tool>` namespaced tool
//! calls back to the owning plugin id, using each plugin's short name
//! (last `/`-delimited segment of its registry name) as the public prefix.

use std::collections::HashMap;

use otui_common::types::{short_plugin_name, split_tool_name};
use otui_plugins::Plugin;

/// Maps a plugin's short (public) name to its registry id. Built fresh
/// whenever the set of known plugins changes.
#[derive(Debug, Clone, Default)]
pub struct ToolAggregator {
    short_name_to_id: HashMap<String, String>,
    id_to_short_name: HashMap<String, String>,
}

impl ToolAggregator {
    pub fn from_plugins<'a>(plugins: impl Iterator<Item = &'a Plugin>) -> Self {
        let mut short_name_to_id = HashMap::new();
        let mut id_to_short_name = HashMap::new();
        for p in plugins {
            let short = short_plugin_name(&p.name).to_string();
            short_name_to_id.insert(short.clone(), p.id.clone());
            id_to_short_name.insert(p.id.clone(), short);
        }
        Self { short_name_to_id, id_to_short_name }
    }

    /// Resolve a namespaced tool call into `(plugin_id, tool_name)`.
    pub fn resolve(&self, namespaced: &str) -> Option<(String, String)> {
        let (short_name, tool_name) = split_tool_name(namespaced)?;
        let plugin_id = self.short_name_to_id.get(short_name)?;
        Some((plugin_id.clone(), tool_name.to_string()))
    }

    /// The public namespace prefix for a plugin's tools, if known.
    pub fn short_name_for(&self, plugin_id: &str) -> Option<&str> {
        self.id_to_short_name.get(plugin_id).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap as Map;

    use otui_plugins::{AuthType, InstallType};

    use super::*;

    fn plugin(id: &str, name: &str) -> Plugin {
        Plugin {
            id: id.to_string(),
            name: name.to_string(),
            install_type: InstallType::Npm,
            package: None,
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
    fn resolves_namespaced_call_to_plugin_id() {
        let plugins = vec![plugin("fs-plugin-id", "org/fs-server")];
        let aggregator = ToolAggregator::from_plugins(plugins.iter());
        assert_eq!(aggregator.resolve("fs-server.read_file"), Some(("fs-plugin-id".to_string(), "read_file".to_string())));
    }

    #[test]
    fn unknown_prefix_resolves_to_none() {
        let aggregator = ToolAggregator::from_plugins(std::iter::empty());
        assert_eq!(aggregator.resolve("unknown.tool"), None);
    }

    #[test]
    fn splits_on_first_dot_only() {
        let plugins = vec![plugin("fs-plugin-id", "fs")];
        let aggregator = ToolAggregator::from_plugins(plugins.iter());
        assert_eq!(aggregator.resolve("fs.read.file"), Some(("fs-plugin-id".to_string(), "read.file".to_string())));
    }
}
