//! MCP tool-server connectors
//!
//! `client` speaks JSON-RPC 2.0 over child-process stdio; `connect` knows
//! which servers exist and when each one applies.

pub mod client;
pub mod connect;

pub use client::{ContentSegment, McpClient, McpToolInfo, flatten_content};
pub use connect::{ConnectorWarning, McpConnection, connect_all};
