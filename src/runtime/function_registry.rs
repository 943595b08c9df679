//! Provider-agnostic registry of callable functions: both capability-backed
//! AI functions and MCP tools exposed to the LLM dispatcher.
//!
//! MCP tools are stored once under a sanitized `"<server>_<tool>"` name,
//! since some providers' function-name grammar rejects colons; the
//! canonical `"<server>:<tool>"` form is kept only as an alias resolving
//! back to that same entry, so the LLM never sees the tool listed twice.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::auth::AuthContext;
use crate::error::AgentError;

/// A function definition in the shape an `LlmProvider` expects for
/// function-calling tool declarations: `name`, `description`,
/// `inputSchema`.
#[derive(Debug, Clone)]
pub struct FunctionSchema {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl FunctionSchema {
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema,
        })
    }
}

#[async_trait]
pub trait FunctionHandler: Send + Sync {
    /// `auth` carries the caller's authenticated identity, if any — a
    /// capability-backed handler forwards it into the same
    /// `HandlerContext`/`AuthInjector` path direct-mode routing uses; an
    /// MCP tool handler checks it against the tool's configured scopes
    /// fail-closed before placing the call.
    async fn call(&self, arguments: Value, auth: Option<&AuthContext>) -> Result<Value, AgentError>;
}

struct RegisteredFunction {
    schema: FunctionSchema,
    handler: Arc<dyn FunctionHandler>,
    is_mcp: bool,
    origin_server: Option<String>,
}

#[derive(Default)]
pub struct FunctionRegistry {
    /// Owns exactly one `RegisteredFunction` per underlying tool, keyed by
    /// its AI-facing name (the sanitized name for MCP tools, the plain
    /// name for capability functions).
    functions: HashMap<String, RegisteredFunction>,
    /// Maps every other callable alias (an MCP tool's canonical
    /// `"server:tool"` name) back to the key it's registered under in
    /// `functions`, so lookups by either name resolve to the same entry
    /// without `all_schemas` ever seeing it twice.
    aliases: HashMap<String, String>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_capability_function(&mut self, schema: FunctionSchema, handler: Arc<dyn FunctionHandler>) {
        let name = schema.name.clone();
        self.functions.insert(
            name,
            RegisteredFunction {
                schema,
                handler,
                is_mcp: false,
                origin_server: None,
            },
        );
    }

    /// Registers an MCP tool under a single `RegisteredFunction`, keyed by
    /// its sanitized `"server_tool"` name (most function-calling grammars
    /// reject colons); the canonical `"server:tool"` name is kept only as
    /// an alias resolving to the same entry, so the schema is listed to
    /// the LLM exactly once.
    pub fn register_mcp_tool(&mut self, server: &str, tool: &str, description: String, input_schema: Value, handler: Arc<dyn FunctionHandler>) {
        let canonical = format!("{server}:{tool}");
        let sanitized = sanitize_function_name(&canonical);

        self.functions.insert(
            sanitized.clone(),
            RegisteredFunction {
                schema: FunctionSchema {
                    name: sanitized.clone(),
                    description,
                    input_schema,
                },
                handler,
                is_mcp: true,
                origin_server: Some(server.to_string()),
            },
        );

        if canonical != sanitized {
            self.aliases.insert(canonical, sanitized);
        }
    }

    fn resolve<'a>(&'a self, name: &str) -> Option<&'a RegisteredFunction> {
        if let Some(f) = self.functions.get(name) {
            return Some(f);
        }
        let target = self.aliases.get(name)?;
        self.functions.get(target)
    }

    pub fn get_schema(&self, name: &str) -> Option<&FunctionSchema> {
        self.resolve(name).map(|f| &f.schema)
    }

    pub fn is_mcp(&self, name: &str) -> bool {
        self.resolve(name).map(|f| f.is_mcp).unwrap_or(false)
    }

    pub fn origin_server(&self, name: &str) -> Option<&str> {
        self.resolve(name).and_then(|f| f.origin_server.as_deref())
    }

    pub async fn call(&self, name: &str, arguments: Value, auth: Option<&AuthContext>) -> Result<Value, AgentError> {
        let function = self
            .resolve(name)
            .ok_or_else(|| AgentError::Dispatch(format!("no such function: {name}")))?;
        function.handler.call(arguments, auth).await
    }

    /// One schema per registered tool; MCP tools are never duplicated under
    /// their canonical alias since aliases aren't stored in `functions`.
    pub fn all_schemas(&self) -> Vec<Value> {
        self.functions.values().map(|f| f.schema.to_value()).collect()
    }
}

/// Replaces characters most function-calling grammars reject in a name
/// (colons and hyphens) with underscores.
pub fn sanitize_function_name(name: &str) -> String {
    name.chars()
        .map(|c| if c == ':' || c == '-' { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoHandler;

    #[async_trait]
    impl FunctionHandler for EchoHandler {
        async fn call(&self, arguments: Value, _auth: Option<&AuthContext>) -> Result<Value, AgentError> {
            Ok(arguments)
        }
    }

    #[test]
    fn sanitize_replaces_colons_and_hyphens() {
        assert_eq!(sanitize_function_name("fs:read-file"), "fs_read_file");
    }

    #[tokio::test]
    async fn mcp_tool_is_reachable_by_both_names() {
        let mut registry = FunctionRegistry::new();
        registry.register_mcp_tool(
            "fs",
            "read-file",
            "reads a file".into(),
            serde_json::json!({}),
            Arc::new(EchoHandler),
        );
        assert!(registry.get_schema("fs:read-file").is_some());
        assert!(registry.get_schema("fs_read_file").is_some());
        assert!(registry.is_mcp("fs:read-file"));
        assert_eq!(registry.origin_server("fs:read-file"), Some("fs"));
    }

    #[tokio::test]
    async fn mcp_tool_is_listed_exactly_once_despite_two_names() {
        let mut registry = FunctionRegistry::new();
        registry.register_mcp_tool(
            "fs",
            "read-file",
            "reads a file".into(),
            serde_json::json!({}),
            Arc::new(EchoHandler),
        );
        registry.register_capability_function(
            FunctionSchema {
                name: "echo".into(),
                description: "echoes".into(),
                input_schema: serde_json::json!({}),
            },
            Arc::new(EchoHandler),
        );

        let schemas = registry.all_schemas();
        assert_eq!(schemas.len(), 2);
        let names: Vec<&str> = schemas.iter().map(|s| s["name"].as_str().unwrap()).collect();
        assert!(names.contains(&"fs_read_file"));
        assert!(names.contains(&"echo"));
        assert!(!names.contains(&"fs:read-file"));
    }

    #[tokio::test]
    async fn calling_by_canonical_alias_dispatches_same_handler() {
        let mut registry = FunctionRegistry::new();
        registry.register_mcp_tool(
            "fs",
            "read-file",
            "reads a file".into(),
            serde_json::json!({}),
            Arc::new(EchoHandler),
        );
        let result = registry
            .call("fs:read-file", serde_json::json!({"path": "a.txt"}), None)
            .await
            .unwrap();
        assert_eq!(result, serde_json::json!({"path": "a.txt"}));
    }

    #[tokio::test]
    async fn unknown_function_call_errors() {
        let registry = FunctionRegistry::new();
        let result = registry.call("missing", Value::Null, None).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn call_dispatches_to_registered_handler() {
        let mut registry = FunctionRegistry::new();
        registry.register_capability_function(
            FunctionSchema {
                name: "echo".into(),
                description: "echoes".into(),
                input_schema: serde_json::json!({}),
            },
            Arc::new(EchoHandler),
        );
        let result = registry.call("echo", serde_json::json!({"a": 1}), None).await.unwrap();
        assert_eq!(result, serde_json::json!({"a": 1}));
    }
}
