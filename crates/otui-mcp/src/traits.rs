//! Transport and client abstractions, shared by every transport kind
//! (stdio, SSE, streamable-HTTP, OAuth-backed SSE) and by the manager.

use async_trait::async_trait;

use crate::{
    error::Result,
    types::{JsonRpcResponse, McpToolDef, ToolsCallResult},
};

/// Wire-level transport for one MCP server connection.
#[async_trait]
pub trait McpTransport: Send + Sync {
    async fn request(&self, method: &str, params: Option<serde_json::Value>) -> Result<JsonRpcResponse>;
    async fn notify(&self, method: &str, params: Option<serde_json::Value>) -> Result<()>;
    async fn is_alive(&self) -> bool;
    async fn kill(&self);
}

/// State of an MCP client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McpClientState {
    Connected,
    Ready,
    Closed,
}

/// Protocol-level client: handshake, tool listing, and tool calls over
/// whatever transport it was constructed with.
#[async_trait]
pub trait McpClientTrait: Send + Sync {
    fn server_name(&self) -> &str;
    fn state(&self) -> McpClientState;
    fn tools(&self) -> &[McpToolDef];
    async fn list_tools(&mut self) -> Result<&[McpToolDef]>;
    async fn call_tool(&self, name: &str, arguments: serde_json::Value) -> Result<ToolsCallResult>;
    async fn is_alive(&self) -> bool;
    async fn shutdown(&mut self);
}
