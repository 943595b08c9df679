//! Wires `Plugin`s and MCP tools into a `FunctionRegistry` so AI-mode
//! dispatch can call them, without bypassing the authorization each kind
//! already enforces elsewhere.
//!
//! A capability function goes back through `CapabilityRegistry::get_handler`
//! — the same auth-injector/middleware/state chain direct-mode routing
//! uses — rather than calling `Plugin::execute_capability` directly, so an
//! AI-mode tool call is held to the same scope requirements as a routed
//! request. An MCP tool is registered only if its `"server:tool"` key has
//! an entry in the configured `tool_scopes` map; an unconfigured tool is
//! invisible to the dispatcher rather than callable with no scope check.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;

use crate::a2a::task::TaskStore;
use crate::auth::{AuthContext, ScopeHierarchy};
use crate::capabilities::CapabilityRegistry;
use crate::error::AgentError;
use crate::mcp::MCPClient;

use super::function_registry::{FunctionHandler, FunctionRegistry, FunctionSchema};

/// Adapts a registered capability into a callable AI function: builds a
/// fresh, single-turn `HandlerContext` from the tool-call arguments and
/// runs it through the capability's wrapped handler (auth injector included).
struct CapabilityFunctionHandler {
    capability_id: String,
    registry: Arc<CapabilityRegistry>,
    task_store: Arc<TaskStore>,
}

#[async_trait]
impl FunctionHandler for CapabilityFunctionHandler {
    async fn call(&self, arguments: Value, auth: Option<&AuthContext>) -> Result<Value, AgentError> {
        let handler = self
            .registry
            .get_handler(&self.capability_id)
            .ok_or_else(|| AgentError::Routing(format!("no such capability: {}", self.capability_id)))?;

        let input_text = arguments
            .get("text")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| arguments.to_string());

        let task = self.task_store.create(None);
        let ctx = crate::capabilities::HandlerContext {
            context_id: task.context_id.clone(),
            task,
            auth: auth.cloned(),
            input_text,
        };
        handler.handle(&ctx).await
    }
}

/// Adapts a single MCP tool into a callable AI function, enforcing the
/// scopes configured for it before placing the call.
struct McpToolHandler {
    server: String,
    tool: String,
    client: Arc<AsyncMutex<MCPClient>>,
    required_scopes: Vec<String>,
    hierarchy: Arc<ScopeHierarchy>,
}

#[async_trait]
impl FunctionHandler for McpToolHandler {
    async fn call(&self, arguments: Value, auth: Option<&AuthContext>) -> Result<Value, AgentError> {
        if !self.required_scopes.is_empty() {
            match auth {
                Some(auth) => {
                    let missing = auth.missing_scopes(&self.required_scopes, &self.hierarchy);
                    if !missing.is_empty() {
                        return Err(AgentError::Authorization {
                            subject: auth.subject.clone(),
                            missing,
                        });
                    }
                }
                None => {
                    return Err(AgentError::Authorization {
                        subject: "anonymous".into(),
                        missing: self.required_scopes.clone(),
                    });
                }
            }
        }

        let args = match arguments {
            Value::Object(map) => map.into_iter().collect::<HashMap<_, _>>(),
            Value::Null => HashMap::new(),
            other => {
                let mut map = HashMap::new();
                map.insert("value".to_string(), other);
                map
            }
        };

        let mut client = self.client.lock().await;
        let result = client
            .call_tool(&self.tool, Some(args))
            .await
            .map_err(|e| AgentError::Dispatch(format!("mcp tool '{}:{}' failed: {e}", self.server, self.tool)))?;
        Ok(Value::String(result))
    }
}

/// Registers every routable plugin's AI functions into `functions`.
/// Capability functions aren't gated here on scopes — the wrapped handler
/// (`AuthInjector`) already enforces the capability's `required_scopes`
/// when the function is actually invoked.
pub fn register_capability_functions(functions: &mut FunctionRegistry, registry: &Arc<CapabilityRegistry>, task_store: &Arc<TaskStore>) {
    for info in registry.list_routable() {
        let schemas = registry.ai_functions_for(&info.id);
        for schema in schemas {
            let Some(name) = schema.get("name").and_then(Value::as_str).map(str::to_string) else {
                continue;
            };
            let description = schema.get("description").and_then(Value::as_str).unwrap_or("").to_string();
            let input_schema = schema.get("inputSchema").cloned().unwrap_or_else(|| serde_json::json!({}));
            let handler = Arc::new(CapabilityFunctionHandler {
                capability_id: info.id.clone(),
                registry: Arc::clone(registry),
                task_store: Arc::clone(task_store),
            });
            functions.register_capability_function(
                FunctionSchema {
                    name,
                    description,
                    input_schema,
                },
                handler,
            );
        }
    }
}

/// Discovers and registers an MCP server's tools, fail-closed: a tool
/// whose `"server:tool"` key has no entry in `tool_scopes` is skipped
/// entirely and logged, never registered with an empty scope set.
pub async fn register_mcp_server_tools(
    functions: &mut FunctionRegistry,
    server_name: &str,
    client: Arc<AsyncMutex<MCPClient>>,
    tool_scopes: &HashMap<String, Vec<String>>,
    hierarchy: &Arc<ScopeHierarchy>,
) -> Result<(), anyhow::Error> {
    let tools = {
        let mut guard = client.lock().await;
        guard.list_tools(None).await?
    };

    for tool in tools {
        let Some(name) = tool.get("name").and_then(Value::as_str) else {
            continue;
        };
        let key = format!("{server_name}:{name}");
        let Some(required_scopes) = tool_scopes.get(&key) else {
            tracing::warn!("mcp tool '{key}' has no configured scope entry, skipping registration");
            continue;
        };
        let description = tool.get("description").and_then(Value::as_str).unwrap_or("").to_string();
        let input_schema = tool.get("inputSchema").cloned().unwrap_or_else(|| serde_json::json!({}));

        let handler = Arc::new(McpToolHandler {
            server: server_name.to_string(),
            tool: name.to_string(),
            client: Arc::clone(&client),
            required_scopes: required_scopes.clone(),
            hierarchy: Arc::clone(hierarchy),
        });

        functions.register_mcp_tool(server_name, name, description, input_schema, handler);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mcp_tool_requires_configured_scope_entry() {
        let mut tool_scopes = HashMap::new();
        tool_scopes.insert("fs:read_file".to_string(), vec!["files:read".to_string()]);
        assert!(tool_scopes.contains_key("fs:read_file"));
        assert!(!tool_scopes.contains_key("fs:delete_file"));
    }
}
