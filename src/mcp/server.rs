//! The server half of MCP: exposes this agent's own routable capabilities
//! as MCP tools over a JSON-RPC surface, so another agent's `mcp::client`
//! can discover and call them. The client half lives in `mcp::client`.
//!
//! A tool call is serviced the same way direct A2A routing services a
//! request: a synthetic, single-turn task is created so the capability's
//! wrapped handler (auth injector included) sees the same `HandlerContext`
//! shape it always does. This module holds no scope logic of its own —
//! the capability's own `required_scopes` and the `AuthInjector` already
//! wrapped around its handler are what enforce authorization here, same
//! as for routed requests.

use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use serde_json::{json, Value};

use crate::a2a::task::{Message, Part, Role, TaskStore};
use crate::capabilities::{CapabilityRegistry, HandlerContext};
use crate::error::AgentError;

/// Protocol versions this server understands in the `MCP-Protocol-Version`
/// request header. A recognized-but-unsupported value is a hard `400`;
/// an absent header is accepted (the caller didn't negotiate one).
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2024-11-05", "2025-03-26"];

pub fn is_supported_protocol_version(version: &str) -> bool {
    SUPPORTED_PROTOCOL_VERSIONS.contains(&version)
}

/// Everything the `/mcp` route needs to service a JSON-RPC call.
pub struct McpServerState {
    registry: Arc<CapabilityRegistry>,
    task_store: Arc<TaskStore>,
    expose_handlers: bool,
    agent_name: String,
}

impl McpServerState {
    pub fn new(registry: Arc<CapabilityRegistry>, task_store: Arc<TaskStore>, expose_handlers: bool, agent_name: String) -> Self {
        Self {
            registry,
            task_store,
            expose_handlers,
            agent_name,
        }
    }

    /// Dispatches one MCP method. The caller is responsible for the
    /// notification/HTTP-202 distinction — this always computes a result.
    pub async fn handle_method(&self, method: &str, params: &Value) -> Result<Value, AgentError> {
        match method {
            "initialize" => Ok(self.initialize_result()),
            "tools/list" => Ok(self.tools_list()),
            "tools/call" => self.tools_call(params).await,
            "resources/list" => Ok(json!({ "resources": [] })),
            "resources/read" => Err(AgentError::UnsupportedOperation(
                "this agent exposes no readable resources".into(),
            )),
            other => Err(AgentError::Routing(format!("unknown MCP method: {other}"))),
        }
    }

    fn initialize_result(&self) -> Value {
        json!({
            "protocolVersion": SUPPORTED_PROTOCOL_VERSIONS[0],
            "capabilities": { "tools": { "listChanged": false } },
            "serverInfo": {
                "name": self.agent_name,
                "version": env!("CARGO_PKG_VERSION"),
            },
        })
    }

    /// Non-MCP, locally-registered capabilities only, and only when
    /// `mcp.expose_handlers` is on — a plugin is exposed as a tool, not
    /// the MCP tools this agent itself consumes as a client.
    fn tools_list(&self) -> Value {
        if !self.expose_handlers {
            return json!({ "tools": [] });
        }
        let tools: Vec<Value> = self
            .registry
            .list_routable()
            .into_iter()
            .map(|info| {
                json!({
                    "name": info.id,
                    "description": info.name,
                    "inputSchema": info
                        .config_schema
                        .clone()
                        .unwrap_or_else(|| json!({ "type": "object" })),
                })
            })
            .collect();
        json!({ "tools": tools })
    }

    async fn tools_call(&self, params: &Value) -> Result<Value, AgentError> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::Routing("tools/call requires a 'name'".into()))?;
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

        if !self.expose_handlers || !self.registry.is_routable(name) {
            return Err(AgentError::Routing(format!("no such tool: {name}")));
        }
        let handler = self
            .registry
            .get_handler(name)
            .ok_or_else(|| AgentError::Routing(format!("no such tool: {name}")))?;

        let input_text = arguments
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| arguments.to_string());

        let task = self.task_store.create(None);
        self.task_store
            .append_message(&task.task_id, Message::new(Role::User, vec![Part::text(input_text.clone())]))?;

        let ctx = HandlerContext {
            context_id: task.context_id.clone(),
            task,
            auth: None,
            input_text,
        };
        let output = handler.handle(&ctx).await?;
        let text = match &output {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Ok(json!({ "content": [{ "type": "text", "text": text }] }))
    }
}

/// One `notifications/initialized` frame followed by a heartbeat comment
/// every 30s, for a client that opens `GET /mcp` to hold a long-lived SSE
/// connection rather than polling.
pub fn notification_stream() -> impl Stream<Item = Result<String, std::convert::Infallible>> {
    let initial = futures::stream::once(async {
        Ok(format!(
            "data: {}\n\n",
            json!({ "jsonrpc": "2.0", "method": "notifications/initialized" })
        ))
    });
    let heartbeat = futures::stream::unfold((), |_| async {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Some((Ok(": heartbeat\n\n".to_string()), ()))
    });
    futures::StreamExt::chain(initial, heartbeat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ScopeHierarchy;
    use std::collections::HashSet;

    fn state(expose: bool) -> McpServerState {
        let hierarchy = Arc::new(ScopeHierarchy::new(Default::default()));
        let registry = Arc::new(CapabilityRegistry::new(hierarchy, HashSet::new()));
        McpServerState::new(registry, Arc::new(TaskStore::new()), expose, "test-agent".into())
    }

    #[tokio::test]
    async fn tools_list_is_empty_when_not_exposed() {
        let state = state(false);
        let result = state.handle_method("tools/list", &Value::Null).await.unwrap();
        assert_eq!(result["tools"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn unknown_method_is_an_error() {
        let state = state(true);
        let result = state.handle_method("not/a/method", &Value::Null).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn tools_call_rejects_unregistered_tool() {
        let state = state(true);
        let params = json!({ "name": "nonexistent", "arguments": {} });
        let result = state.handle_method("tools/call", &params).await;
        assert!(result.is_err());
    }

    #[test]
    fn protocol_version_check() {
        assert!(is_supported_protocol_version("2024-11-05"));
        assert!(!is_supported_protocol_version("1999-01-01"));
    }
}
