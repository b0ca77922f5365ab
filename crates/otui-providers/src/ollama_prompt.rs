//! Ollama's chat endpoint wants a flat message array; tool-calling models
//! need their instructions spelled out in a plain system message rather
//! than relying on the schema alone, and a long-standing Ollama bug mangles
//! unescaped quotes in that message.

use serde_json::{Value, json};

use crate::types::{Message, role_str};

/// Layer 1 (only when tools are present): tool names plus two binary
/// decision rules. Layer 2: the caller's system prompt, quote-escaped.
/// Layer 3: the conversation, unmodified.
pub fn build_ollama_messages(system_prompt: &str, tool_names: &[String], conversation: &[Message]) -> Vec<Value> {
    let mut out = Vec::with_capacity(conversation.len() + 2);

    if !tool_names.is_empty() {
        out.push(json!({ "role": "system", "content": tool_instruction_layer(tool_names) }));
    }
    out.push(json!({ "role": "system", "content": escape_ollama_quotes(system_prompt) }));

    for message in conversation {
        out.push(json!({ "role": role_str(&message.role), "content": message.content }));
    }
    out
}

fn tool_instruction_layer(tool_names: &[String]) -> String {
    format!(
        "You have access to the following tools: {}.\n\
         1. If the user's request requires one of these tools, call it through the tool-calling interface.\n\
         2. If it does not, respond normally in plain text without attempting to call a tool.",
        tool_names.join(", ")
    )
}

/// Ollama's tool-calling path breaks on unescaped `"` and `'` in the system
/// prompt; escape both before sending.
fn escape_ollama_quotes(s: &str) -> String {
    s.replace('"', "\\\"").replace('\'', "\\'")
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use otui_common::types::Role;

    use super::*;

    #[test]
    fn omits_tool_layer_when_no_tools() {
        let messages = build_ollama_messages("be nice", &[], &[]);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["content"], "be nice");
    }

    #[test]
    fn adds_tool_layer_listing_names_when_tools_present() {
        let tools = vec!["fs.read".to_string(), "shell.run".to_string()];
        let messages = build_ollama_messages("be nice", &tools, &[]);
        assert_eq!(messages.len(), 2);
        let layer = messages[0]["content"].as_str().unwrap();
        assert!(layer.contains("fs.read"));
        assert!(layer.contains("shell.run"));
    }

    #[test]
    fn escapes_double_and_single_quotes_in_system_prompt() {
        let messages = build_ollama_messages(r#"say "hi" and 'bye'"#, &[], &[]);
        assert_eq!(messages[0]["content"], r#"say \"hi\" and \'bye\'"#);
    }

    #[test]
    fn conversation_follows_the_instruction_layers() {
        let conversation = vec![Message::new(Role::User, "hello", 0)];
        let messages = build_ollama_messages("sys", &[], &conversation);
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[1]["content"], "hello");
    }
}
