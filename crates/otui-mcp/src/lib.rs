//! MCP plugin process supervision: transports, the protocol client, tool
//! namespace aggregation, and the manager that enforces the policy gate
//! around every tool call.

pub mod aggregator;
pub mod client;
pub mod error;
pub mod manager;
pub mod template;
pub mod traits;
pub mod transport;
pub mod types;

pub use aggregator::ToolAggregator;
pub use client::McpClient;
pub use error::{Error, Result};
pub use manager::{ConnectSpec, McpManager, PolicyContext};
pub use template::SubstitutionContext;
pub use traits::{McpClientState, McpClientTrait, McpTransport};
pub use types::{McpToolDef, PROTOCOL_VERSION};
