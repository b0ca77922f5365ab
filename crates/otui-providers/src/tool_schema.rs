//! Translates an MCP `InputSchema` (already reduced to `{name, description,
//! input_schema}` by the caller) into the wire shape each backend expects.

use serde_json::{Value, json};

use crate::types::ToolSchema;

/// Chat Completions `tools` array shape, shared by ollama/openai/openrouter.
pub fn to_openai_tools(tools: &[ToolSchema]) -> Vec<Value> {
    tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.input_schema,
                },
            })
        })
        .collect()
}

/// Same shape, but with every `.`-namespaced tool name rewritten with the
/// `mangle` callback (OpenRouter only allows `[A-Za-z0-9_-]`).
pub fn to_openai_tools_mangled(tools: &[ToolSchema], mangle: impl Fn(&str) -> String) -> Vec<Value> {
    tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": mangle(&t.name),
                    "description": t.description,
                    "parameters": t.input_schema,
                },
            })
        })
        .collect()
}

/// Anthropic's flat `tools` array shape.
pub fn to_anthropic_tools(tools: &[ToolSchema]) -> Vec<Value> {
    tools
        .iter()
        .map(|t| {
            json!({
                "name": t.name,
                "description": t.description,
                "input_schema": t.input_schema,
            })
        })
        .collect()
}
