//! Model Context Protocol (MCP) integration.
//!
//! This module provides the MCP client, transport layers (Stdio, HTTP,
//! SSE), tool filtering for connecting to external MCP servers, and the
//! `server` submodule that exposes this agent's own capabilities as MCP
//! tools to callers.
//!
//! MCP allows agents to discover and invoke tools exposed by external
//! servers using a standardized protocol with different transport mechanisms.

pub mod client;
pub mod filters;
pub mod server;
pub mod transports;

// Re-export main types.
pub use client::MCPClient;
pub use filters::{StaticToolFilter, ToolFilterContext};
pub use server::McpServerState;
pub use transports::{BaseTransport, TransportType};
