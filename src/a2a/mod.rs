//! A2A (Agent-to-Agent) protocol module: the task/message/event model
//! (`task`), the JSON-RPC envelope and method set (`jsonrpc`), error codes
//! (`errors`), and a client for delegating to a remote A2A agent
//! (`client`, with its `auth` and `updates` configuration types).

pub mod auth;
pub mod client;
pub mod errors;
pub mod jsonrpc;
pub mod task;
pub mod types;
pub mod updates;
