use std::collections::HashSet;

use chrono::{DateTime, Utc};
use otui_common::types::Message;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A chat session: one ordered message history plus the provider/model
/// binding and plugin scoping active for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub name: String,
    pub model: String,
    pub provider: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub enabled_plugins: HashSet<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(name: impl Into<String>, provider: impl Into<String>, model: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            model: model.into(),
            provider: provider.into(),
            system_prompt: None,
            enabled_plugins: HashSet::new(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    /// Enforces the invariant that a session's enabled plugins are always a
    /// subset of whatever set is globally enabled at the time of the check.
    pub fn enabled_plugins_within(&self, globally_enabled: &HashSet<String>) -> bool {
        self.enabled_plugins.is_subset(globally_enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enabled_plugins_subset_invariant_holds_for_fresh_session() {
        let session = Session::new("test", "ollama", "llama3.1");
        let global = HashSet::from(["weather".to_string()]);
        assert!(session.enabled_plugins_within(&global));
    }

    #[test]
    fn enabled_plugins_subset_invariant_detects_violation() {
        let mut session = Session::new("test", "ollama", "llama3.1");
        session.enabled_plugins.insert("rogue-plugin".to_string());
        let global = HashSet::from(["weather".to_string()]);
        assert!(!session.enabled_plugins_within(&global));
    }
}
