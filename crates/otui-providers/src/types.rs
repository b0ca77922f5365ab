//! Wire-agnostic types shared across adapters.

pub use otui_common::types::{Message, Role, ToolCall};
use serde::{Deserialize, Serialize};

/// One model offered by a provider, as surfaced to the UI's model picker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub display_name: String,
    pub internal_name: String,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// A tool definition translated from the MCP `InputSchema` shape into
/// whatever an adapter hands its wire format builder.
#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// One event out of `ProviderAdapter::chat_stream`. Coarser than a
/// token-by-token delta feed: `TextDelta` fragments accumulate into the
/// visible turn, `ToolCalls` is emitted at most once per turn (either from
/// the adapter's native channel or from a leak parser running over the
/// finalized text), and `Done` closes the stream.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    TextDelta(String),
    ToolCalls(Vec<ToolCall>),
    Done,
}

pub(crate) fn role_str(role: &Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}
