//! `McpClient`: drives the protocol handshake (`initialize` +
//! `notifications/initialized`) and tool interactions over whichever
//! transport it was constructed with.

use std::{collections::HashMap, sync::Arc};

use tracing::{debug, info, warn};

use crate::{
    error::{Error, Result},
    traits::{McpClientState, McpClientTrait, McpTransport},
    transport::{http::HttpTransport, stdio::StdioTransport},
    types::{
        ClientCapabilities, ClientInfo, Headers, InitializeParams, InitializeResult, McpToolDef, PROTOCOL_VERSION,
        ToolsCallParams, ToolsCallResult, ToolsListResult,
    },
};

/// An MCP client connected to a single plugin, over any transport.
pub struct McpClient {
    server_name: String,
    transport: Arc<dyn McpTransport>,
    state: McpClientState,
    server_info: Option<InitializeResult>,
    tools: Vec<McpToolDef>,
}

impl McpClient {
    /// Spawn a local plugin process and perform the handshake.
    pub async fn connect_stdio(server_name: &str, command: &str, args: &[String], env: &HashMap<String, String>) -> Result<Self> {
        info!(server = %server_name, command = %command, "connecting to local MCP plugin");
        let transport = StdioTransport::spawn(command, args, env).await?;
        Self::handshake(server_name, transport).await
    }

    /// Connect to a remote plugin over SSE.
    pub async fn connect_sse(server_name: &str, url: &str, headers: Headers) -> Result<Self> {
        info!(server = %server_name, url = %url, "connecting to remote MCP plugin via SSE");
        let transport = HttpTransport::new_sse(url, headers)?;
        Self::handshake(server_name, transport).await
    }

    /// Connect to a remote plugin over streamable HTTP.
    pub async fn connect_streamable_http(server_name: &str, url: &str, headers: Headers) -> Result<Self> {
        info!(server = %server_name, url = %url, "connecting to remote MCP plugin via streamable HTTP");
        let transport = HttpTransport::new_streamable_http(url, headers)?;
        Self::handshake(server_name, transport).await
    }

    async fn handshake(server_name: &str, transport: Arc<dyn McpTransport>) -> Result<Self> {
        let mut client =
            Self { server_name: server_name.into(), transport, state: McpClientState::Connected, server_info: None, tools: Vec::new() };

        if let Err(e) = client.initialize().await {
            warn!(server = %server_name, error = %e, "MCP initialize handshake failed");
            return Err(e);
        }
        Ok(client)
    }

    async fn initialize(&mut self) -> Result<()> {
        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.into(),
            capabilities: ClientCapabilities::default(),
            client_info: ClientInfo { name: "OTUI".into(), version: "1.0.0".into() },
        };

        let resp = self.transport.request("initialize", Some(serde_json::to_value(&params)?)).await?;
        let result: InitializeResult = serde_json::from_value(
            resp.result.ok_or_else(|| Error::Message("initialize returned no result".into()))?,
        )?;

        info!(
            server = %self.server_name,
            protocol = %result.protocol_version,
            server_name = %result.server_info.name,
            "MCP plugin initialized"
        );

        self.server_info = Some(result);
        self.transport.notify("notifications/initialized", None).await?;
        self.state = McpClientState::Ready;
        Ok(())
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.state != McpClientState::Ready {
            return Err(Error::Message(format!("MCP client for '{}' is not ready (state: {:?})", self.server_name, self.state)));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl McpClientTrait for McpClient {
    fn server_name(&self) -> &str {
        &self.server_name
    }

    fn state(&self) -> McpClientState {
        self.state
    }

    fn tools(&self) -> &[McpToolDef] {
        &self.tools
    }

    async fn list_tools(&mut self) -> Result<&[McpToolDef]> {
        self.ensure_ready()?;
        let resp = self.transport.request("tools/list", None).await?;
        let result: ToolsListResult =
            serde_json::from_value(resp.result.ok_or_else(|| Error::Message("tools/list returned no result".into()))?)?;

        debug!(server = %self.server_name, count = result.tools.len(), "fetched MCP tools");
        self.tools = result.tools;
        Ok(&self.tools)
    }

    async fn call_tool(&self, name: &str, arguments: serde_json::Value) -> Result<ToolsCallResult> {
        self.ensure_ready()?;
        let params = ToolsCallParams { name: name.into(), arguments };
        let resp = self.transport.request("tools/call", Some(serde_json::to_value(&params)?)).await?;
        let result: ToolsCallResult =
            serde_json::from_value(resp.result.ok_or_else(|| Error::Message("tools/call returned no result".into()))?)?;
        Ok(result)
    }

    async fn is_alive(&self) -> bool {
        self.transport.is_alive().await
    }

    async fn shutdown(&mut self) {
        self.state = McpClientState::Closed;
        self.transport.kill().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_state_variants_are_distinct() {
        assert_ne!(McpClientState::Connected, McpClientState::Ready);
        assert_ne!(McpClientState::Ready, McpClientState::Closed);
    }
}
