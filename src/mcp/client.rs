//! MCP client with session management.
//!
//! This module provides the `MCPClient` struct which manages connections
//! to MCP servers, supports tool discovery, tool execution, prompt listing,
//! and prompt retrieval. It includes retry logic with exponential backoff,
//! configurable timeouts, an in-memory schema cache, and event emission
//! for observability.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::Mutex;

use crate::mcp::transports::{BaseTransport, TransportType};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// MCP connection timeout in seconds.
pub const MCP_CONNECTION_TIMEOUT: u64 = 30;
/// MCP tool execution timeout in seconds.
pub const MCP_TOOL_EXECUTION_TIMEOUT: u64 = 30;
/// MCP tool discovery timeout in seconds.
pub const MCP_DISCOVERY_TIMEOUT: u64 = 30;
/// Maximum retry attempts.
pub const MCP_MAX_RETRIES: u32 = 3;

/// Protocol version this client negotiates during `initialize`.
pub const MCP_PROTOCOL_VERSION: &str = "2025-03-26";

/// Simple in-memory cache TTL for MCP tool schemas (5 minutes).
const CACHE_TTL: Duration = Duration::from_secs(300);

// ---------------------------------------------------------------------------
// CacheEntry
// ---------------------------------------------------------------------------

/// Cached schema entry.
struct CacheEntry {
    data: Vec<HashMap<String, Value>>,
    created_at: Instant,
}

impl CacheEntry {
    /// Check if this cache entry has expired.
    fn is_expired(&self) -> bool {
        self.created_at.elapsed() >= CACHE_TTL
    }
}

// ---------------------------------------------------------------------------
// ServerInfo (for event emission)
// ---------------------------------------------------------------------------

/// Server information extracted from transport, used for event emission.
#[derive(Debug, Clone)]
struct ServerInfo {
    /// Human-readable server name (command line or URL).
    server_name: String,
    /// Server URL (None for stdio transports).
    server_url: Option<String>,
    /// Transport type string.
    transport_type: String,
}

// ---------------------------------------------------------------------------
// Retry helper
// ---------------------------------------------------------------------------

/// Runs a single JSON-RPC call through `transport`, retrying retryable
/// failures with exponential backoff (1s, 2s, 4s, ...). Authentication and
/// not-found failures are treated as non-retryable and returned immediately.
async fn call_with_retry(
    transport: &mut dyn BaseTransport,
    max_retries: u32,
    timeout_secs: u64,
    method: &str,
    params: Value,
) -> Result<Value, anyhow::Error> {
    let mut last_error = None;
    let timeout = Duration::from_secs(timeout_secs);

    for attempt in 0..max_retries {
        match tokio::time::timeout(timeout, transport.request(method, params.clone())).await {
            Ok(Ok(result)) => return Ok(result),
            Ok(Err(e)) => {
                let error_str = e.to_string().to_lowercase();

                if error_str.contains("authentication") || error_str.contains("unauthorized") {
                    return Err(anyhow::anyhow!("Authentication failed: {}", e));
                }
                if error_str.contains("not found") {
                    return Err(anyhow::anyhow!("Resource not found: {}", e));
                }

                last_error = Some(e);
            }
            Err(_) => {
                last_error = Some(anyhow::anyhow!(
                    "Operation '{}' timed out after {} seconds",
                    method,
                    timeout_secs
                ));
            }
        }

        if attempt < max_retries - 1 {
            tokio::time::sleep(Duration::from_secs(2u64.pow(attempt))).await;
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Operation '{}' failed after {} attempts", method, max_retries)))
}

// ---------------------------------------------------------------------------
// MCPClient
// ---------------------------------------------------------------------------

/// MCP client with session management.
///
/// Manages connections to MCP servers and provides a high-level
/// interface for interacting with MCP tools, prompts, and resources.
/// Supports configurable timeouts, retry logic with exponential backoff,
/// and an in-memory schema cache for tool definitions.
///
/// # Example
///
/// ```rust,no_run
/// use agentup::mcp::client::MCPClient;
/// use agentup::mcp::transports::StdioTransport;
///
/// let transport = StdioTransport::new("python", Some(vec!["server.py".into()]), None);
/// let mut client = MCPClient::new(Box::new(transport))
///     .with_connect_timeout(60)
///     .with_cache_tools_list(true);
///
/// // async {
/// //     client.connect().await.unwrap();
/// //     let tools = client.list_tools(None).await.unwrap();
/// //     let result = client.call_tool("tool_name", None).await.unwrap();
/// //     client.disconnect().await.unwrap();
/// // };
/// ```
pub struct MCPClient {
    /// The transport layer for communication.
    pub transport: Box<dyn BaseTransport>,
    /// Connection timeout in seconds.
    pub connect_timeout: u64,
    /// Tool execution timeout in seconds.
    pub execution_timeout: u64,
    /// Tool discovery timeout in seconds.
    pub discovery_timeout: u64,
    /// Maximum retry attempts.
    pub max_retries: u32,
    /// Whether to cache tool list results.
    pub cache_tools_list: bool,
    /// Whether the client has been initialized (session created).
    initialized: bool,
    /// Whether the client was previously connected (for reconnection tracking).
    was_connected: bool,
    /// Result of the `initialize` handshake (server info, capabilities).
    session: Option<Value>,
    /// In-memory schema cache (keyed by resource-type-qualified identifier).
    schema_cache: Arc<Mutex<HashMap<String, CacheEntry>>>,
}

impl MCPClient {
    /// Create a new MCPClient.
    ///
    /// # Arguments
    ///
    /// * `transport` - Transport instance for MCP server connection.
    pub fn new(transport: Box<dyn BaseTransport>) -> Self {
        Self {
            transport,
            connect_timeout: MCP_CONNECTION_TIMEOUT,
            execution_timeout: MCP_TOOL_EXECUTION_TIMEOUT,
            discovery_timeout: MCP_DISCOVERY_TIMEOUT,
            max_retries: MCP_MAX_RETRIES,
            cache_tools_list: false,
            initialized: false,
            was_connected: false,
            session: None,
            schema_cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    // -----------------------------------------------------------------------
    // Builder methods
    // -----------------------------------------------------------------------

    /// Builder: set connection timeout.
    pub fn with_connect_timeout(mut self, timeout: u64) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Builder: set execution timeout.
    pub fn with_execution_timeout(mut self, timeout: u64) -> Self {
        self.execution_timeout = timeout;
        self
    }

    /// Builder: set discovery timeout.
    pub fn with_discovery_timeout(mut self, timeout: u64) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    /// Builder: set max retries.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Builder: enable or disable tool list caching.
    pub fn with_cache_tools_list(mut self, cache: bool) -> Self {
        self.cache_tools_list = cache;
        self
    }

    // -----------------------------------------------------------------------
    // Connection state
    // -----------------------------------------------------------------------

    /// Check if the client is connected to the MCP server.
    ///
    /// Returns `true` only when the transport is connected AND
    /// the session has been initialized.
    pub fn connected(&self) -> bool {
        self.transport.connected() && self.initialized
    }

    /// Get a reference to the MCP session (the `initialize` response).
    ///
    /// # Errors
    ///
    /// Returns an error if the client is not connected.
    pub fn get_session(&self) -> Result<&Value, anyhow::Error> {
        self.session
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Client not connected. Call connect() first."))
    }

    // -----------------------------------------------------------------------
    // Server info (for events / logging)
    // -----------------------------------------------------------------------

    /// Get server information from the transport for event emission.
    ///
    /// Extracts a human-readable server name, optional URL, and transport
    /// type from the underlying transport instance.
    fn get_server_info(&self) -> ServerInfo {
        let transport_type = self.transport.transport_type();
        let identifier = self.transport.server_identifier();

        match transport_type {
            TransportType::Stdio => ServerInfo {
                server_name: identifier.clone(),
                server_url: None,
                transport_type: transport_type.to_string(),
            },
            TransportType::Http | TransportType::StreamableHttp => {
                // Identifier format is "http:<url>"
                let url = identifier
                    .strip_prefix("http:")
                    .unwrap_or(&identifier)
                    .to_string();
                ServerInfo {
                    server_name: url.clone(),
                    server_url: Some(url),
                    transport_type: transport_type.to_string(),
                }
            }
            TransportType::Sse => {
                // Identifier format is "sse:<url>"
                let url = identifier
                    .strip_prefix("sse:")
                    .unwrap_or(&identifier)
                    .to_string();
                ServerInfo {
                    server_name: url.clone(),
                    server_url: Some(url),
                    transport_type: transport_type.to_string(),
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Connect / Disconnect
    // -----------------------------------------------------------------------

    /// Connect to the MCP server and perform the `initialize` handshake.
    ///
    /// If already connected, this is a no-op. On success, stores the
    /// server's `initialize` response as the session and sets the internal
    /// `initialized` flag.
    ///
    /// # Errors
    ///
    /// * Connection timeout after `connect_timeout` seconds.
    /// * Transport-level connection failures.
    /// * A failed or timed-out `initialize` handshake.
    pub async fn connect(&mut self) -> Result<(), anyhow::Error> {
        if self.connected() {
            return Ok(());
        }

        let is_reconnect = self.was_connected;
        let server_info = self.get_server_info();
        let started_at = Instant::now();

        log::info!(
            "MCP connection started: server='{}', transport='{}', reconnect={}",
            server_info.server_name,
            server_info.transport_type,
            is_reconnect
        );

        let timeout = Duration::from_secs(self.connect_timeout);
        let result = tokio::time::timeout(timeout, self.transport.connect()).await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.cleanup_on_error().await;
                let error_msg = format!("Failed to connect to MCP server: {}", e);
                self.emit_connection_failed(&server_info, &error_msg, "network", started_at);
                return Err(anyhow::anyhow!("{}", error_msg));
            }
            Err(_) => {
                self.cleanup_on_error().await;
                let error_msg = format!(
                    "MCP connection timed out after {} seconds. \
                     The server may be slow or unreachable.",
                    self.connect_timeout
                );
                self.emit_connection_failed(&server_info, &error_msg, "timeout", started_at);
                return Err(anyhow::anyhow!("{}", error_msg));
            }
        }

        let init_params = serde_json::json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": { "name": "agentup", "version": env!("CARGO_PKG_VERSION") },
        });

        match tokio::time::timeout(timeout, self.transport.request("initialize", init_params)).await {
            Ok(Ok(session)) => {
                let _ = self.transport.notify("notifications/initialized", serde_json::json!({})).await;

                self.session = Some(session);
                self.initialized = true;
                self.was_connected = true;

                let duration_ms = started_at.elapsed().as_millis();
                log::info!(
                    "MCP connection established: server='{}' ({}ms)",
                    server_info.server_name,
                    duration_ms
                );

                Ok(())
            }
            Ok(Err(e)) => {
                self.cleanup_on_error().await;
                let error_msg = format!("MCP initialize handshake failed: {}", e);
                self.emit_connection_failed(&server_info, &error_msg, "handshake", started_at);
                Err(anyhow::anyhow!("{}", error_msg))
            }
            Err(_) => {
                self.cleanup_on_error().await;
                let error_msg = format!(
                    "MCP initialize handshake timed out after {} seconds",
                    self.connect_timeout
                );
                self.emit_connection_failed(&server_info, &error_msg, "timeout", started_at);
                Err(anyhow::anyhow!("{}", error_msg))
            }
        }
    }

    /// Disconnect from the MCP server and clean up resources.
    ///
    /// If not connected, this is a no-op.
    pub async fn disconnect(&mut self) -> Result<(), anyhow::Error> {
        if !self.connected() {
            return Ok(());
        }

        let result = self.transport.disconnect().await;

        // Always clean up internal state.
        self.session = None;
        self.initialized = false;

        result.map_err(|e| anyhow::anyhow!("Error during MCP client disconnect: {}", e))
    }

    /// Clean up resources when an error occurs during connection.
    ///
    /// Best-effort cleanup: disconnects transport, clears session, resets
    /// initialized state.
    async fn cleanup_on_error(&mut self) {
        let _ = self.transport.disconnect().await;
        self.session = None;
        self.initialized = false;
    }

    /// Emit a connection failed event/log.
    fn emit_connection_failed(
        &self,
        server_info: &ServerInfo,
        error: &str,
        error_type: &str,
        started_at: Instant,
    ) {
        let duration_ms = started_at.elapsed().as_millis();
        log::error!(
            "MCP connection failed: server='{}', error_type='{}', error='{}', duration={}ms",
            server_info.server_name,
            error_type,
            error,
            duration_ms
        );
    }

    // -----------------------------------------------------------------------
    // Tool Operations
    // -----------------------------------------------------------------------

    /// List available tools from the MCP server.
    ///
    /// # Arguments
    ///
    /// * `use_cache` - Whether to use cached results. If `None`, uses
    ///   the client's `cache_tools_list` setting.
    ///
    /// # Returns
    ///
    /// List of tool definitions, each containing `name`, `description`,
    /// and `inputSchema` keys.
    pub async fn list_tools(
        &mut self,
        use_cache: Option<bool>,
    ) -> Result<Vec<HashMap<String, Value>>, anyhow::Error> {
        if !self.connected() {
            self.connect().await?;
        }

        let use_cache = use_cache.unwrap_or(self.cache_tools_list);

        if use_cache {
            let cache_key = self.get_cache_key("tools");
            let cache = self.schema_cache.lock().await;
            if let Some(entry) = cache.get(&cache_key) {
                if !entry.is_expired() {
                    return Ok(entry.data.clone());
                }
            }
        }

        let result = call_with_retry(
            self.transport.as_mut(),
            self.max_retries,
            self.discovery_timeout,
            "tools/list",
            serde_json::json!({}),
        )
        .await?;

        let tools = result
            .get("tools")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|tool| {
                let mut def = HashMap::new();
                if let Some(obj) = tool.as_object() {
                    def.insert("name".into(), obj.get("name").cloned().unwrap_or(Value::Null));
                    def.insert(
                        "description".into(),
                        obj.get("description").cloned().unwrap_or(Value::String(String::new())),
                    );
                    def.insert(
                        "inputSchema".into(),
                        obj.get("inputSchema").cloned().unwrap_or_else(|| serde_json::json!({})),
                    );
                }
                def
            })
            .collect::<Vec<_>>();

        if use_cache {
            let cache_key = self.get_cache_key("tools");
            let mut cache = self.schema_cache.lock().await;
            cache.insert(
                cache_key,
                CacheEntry {
                    data: tools.clone(),
                    created_at: Instant::now(),
                },
            );
        }

        Ok(tools)
    }

    /// Call a tool on the MCP server.
    ///
    /// # Arguments
    ///
    /// * `tool_name` - Name of the tool to call.
    /// * `arguments` - Tool arguments as a JSON value map.
    ///
    /// # Returns
    ///
    /// Tool execution result as a string.
    pub async fn call_tool(
        &mut self,
        tool_name: &str,
        arguments: Option<HashMap<String, Value>>,
    ) -> Result<String, anyhow::Error> {
        if !self.connected() {
            self.connect().await?;
        }

        let arguments = arguments.unwrap_or_default();
        let cleaned_arguments = Self::clean_tool_arguments(&arguments);
        let server_info = self.get_server_info();

        log::info!(
            "MCP tool execution started: tool='{}', server='{}'",
            tool_name,
            server_info.server_name
        );

        let started_at = Instant::now();

        let params = serde_json::json!({
            "name": tool_name,
            "arguments": cleaned_arguments,
        });
        let result = call_with_retry(
            self.transport.as_mut(),
            self.max_retries,
            self.execution_timeout,
            "tools/call",
            params,
        )
        .await;

        let duration_ms = started_at.elapsed().as_millis();

        match result {
            Ok(value) => {
                log::info!(
                    "MCP tool execution completed: tool='{}' ({}ms)",
                    tool_name,
                    duration_ms
                );
                Ok(Self::extract_tool_text(&value))
            }
            Err(e) => {
                let error_type = if e.to_string().to_lowercase().contains("timeout") {
                    "timeout"
                } else {
                    "server_error"
                };
                log::error!(
                    "MCP tool execution failed: tool='{}', error_type='{}', error='{}' ({}ms)",
                    tool_name,
                    error_type,
                    e,
                    duration_ms
                );
                Err(e)
            }
        }
    }

    /// Pulls the first text-bearing content block out of a `tools/call`
    /// result, falling back to the whole result rendered as JSON.
    fn extract_tool_text(result: &Value) -> String {
        if let Some(content) = result.get("content").and_then(Value::as_array) {
            for block in content {
                if let Some(text) = block.get("text").and_then(Value::as_str) {
                    return text.to_string();
                }
            }
        }
        result.to_string()
    }

    // -----------------------------------------------------------------------
    // Prompt Operations
    // -----------------------------------------------------------------------

    /// List available prompts from the MCP server.
    ///
    /// Corresponds to `MCPClient.list_prompts()` in Python.
    ///
    /// # Returns
    ///
    /// List of prompt definitions, each containing `name`, `description`,
    /// and `arguments` keys.
    pub async fn list_prompts(&mut self) -> Result<Vec<HashMap<String, Value>>, anyhow::Error> {
        if !self.connected() {
            self.connect().await?;
        }

        let result = call_with_retry(
            self.transport.as_mut(),
            self.max_retries,
            self.discovery_timeout,
            "prompts/list",
            serde_json::json!({}),
        )
        .await?;

        Ok(result
            .get("prompts")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| p.as_object().map(|obj| obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect()))
            .collect())
    }

    /// Get a prompt from the MCP server.
    ///
    /// Corresponds to `MCPClient.get_prompt()` in Python.
    ///
    /// # Arguments
    ///
    /// * `prompt_name` - Name of the prompt to get.
    /// * `arguments` - Optional prompt arguments.
    ///
    /// # Returns
    ///
    /// Prompt content and metadata as a JSON value map with `name`,
    /// `messages`, and `arguments` keys.
    pub async fn get_prompt(
        &mut self,
        prompt_name: &str,
        arguments: Option<HashMap<String, Value>>,
    ) -> Result<HashMap<String, Value>, anyhow::Error> {
        if !self.connected() {
            self.connect().await?;
        }

        let arguments = arguments.unwrap_or_default();
        let params = serde_json::json!({
            "name": prompt_name,
            "arguments": arguments,
        });

        let result = call_with_retry(
            self.transport.as_mut(),
            self.max_retries,
            self.execution_timeout,
            "prompts/get",
            params,
        )
        .await?;

        let mut response = HashMap::new();
        response.insert("name".into(), Value::String(prompt_name.to_string()));
        response.insert(
            "messages".into(),
            result.get("messages").cloned().unwrap_or_else(|| Value::Array(vec![])),
        );
        response.insert("arguments".into(), serde_json::to_value(arguments)?);
        Ok(response)
    }

    // -----------------------------------------------------------------------
    // Argument cleaning
    // -----------------------------------------------------------------------

    /// Clean tool arguments by removing null values and fixing formats.
    ///
    /// Performs the following transformations:
    /// 1. Removes `null` values.
    /// 2. Converts `sources` arrays from `["web"]` to `[{"type": "web"}]`.
    /// 3. Recursively cleans nested objects and arrays.
    /// 4. Removes empty objects and arrays after cleaning.
    ///
    /// Corresponds to `MCPClient._clean_tool_arguments()` in Python.
    pub fn clean_tool_arguments(
        arguments: &HashMap<String, Value>,
    ) -> HashMap<String, Value> {
        let mut cleaned = HashMap::new();

        for (key, value) in arguments {
            if value.is_null() {
                continue;
            }

            if key == "sources" {
                if let Some(arr) = value.as_array() {
                    let fixed_sources: Vec<Value> = arr
                        .iter()
                        .map(|item| {
                            if let Some(s) = item.as_str() {
                                serde_json::json!({"type": s})
                            } else {
                                item.clone()
                            }
                        })
                        .collect();
                    if !fixed_sources.is_empty() {
                        cleaned.insert(key.clone(), Value::Array(fixed_sources));
                    }
                    continue;
                }
            }

            if let Some(obj) = value.as_object() {
                let nested_map: HashMap<String, Value> = obj
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                let nested_cleaned = Self::clean_tool_arguments(&nested_map);
                if !nested_cleaned.is_empty() {
                    cleaned.insert(
                        key.clone(),
                        serde_json::to_value(nested_cleaned).unwrap_or(Value::Null),
                    );
                }
            } else if let Some(arr) = value.as_array() {
                let cleaned_list: Vec<Value> = arr
                    .iter()
                    .filter_map(|item| {
                        if item.is_null() {
                            return None;
                        }
                        if let Some(obj) = item.as_object() {
                            let nested_map: HashMap<String, Value> = obj
                                .iter()
                                .map(|(k, v)| (k.clone(), v.clone()))
                                .collect();
                            let cleaned_item = Self::clean_tool_arguments(&nested_map);
                            if !cleaned_item.is_empty() {
                                return Some(
                                    serde_json::to_value(cleaned_item)
                                        .unwrap_or(Value::Null),
                                );
                            }
                            None
                        } else {
                            Some(item.clone())
                        }
                    })
                    .collect();
                if !cleaned_list.is_empty() {
                    cleaned.insert(key.clone(), Value::Array(cleaned_list));
                }
            } else {
                cleaned.insert(key.clone(), value.clone());
            }
        }

        cleaned
    }

    // -----------------------------------------------------------------------
    // Cache key generation
    // -----------------------------------------------------------------------

    /// Generate a cache key for a resource type.
    ///
    /// Uses the transport's server identifier and the resource type
    /// to create a unique cache key.
    ///
    /// Corresponds to `MCPClient._get_cache_key()` in Python.
    fn get_cache_key(&self, resource_type: &str) -> String {
        let transport_info = self.transport.server_identifier();
        format!("mcp:{}:{}", transport_info, resource_type)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_tool_arguments_removes_nulls() {
        let mut args = HashMap::new();
        args.insert("key1".to_string(), Value::String("value".to_string()));
        args.insert("key2".to_string(), Value::Null);
        args.insert("key3".to_string(), serde_json::json!(42));

        let cleaned = MCPClient::clean_tool_arguments(&args);
        assert_eq!(cleaned.len(), 2);
        assert!(cleaned.contains_key("key1"));
        assert!(cleaned.contains_key("key3"));
        assert!(!cleaned.contains_key("key2"));
    }

    #[test]
    fn test_clean_tool_arguments_fixes_sources() {
        let mut args = HashMap::new();
        args.insert(
            "sources".to_string(),
            serde_json::json!(["web", "file"]),
        );

        let cleaned = MCPClient::clean_tool_arguments(&args);
        let sources = cleaned.get("sources").unwrap().as_array().unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0], serde_json::json!({"type": "web"}));
        assert_eq!(sources[1], serde_json::json!({"type": "file"}));
    }

    #[test]
    fn test_clean_tool_arguments_keeps_sources_objects() {
        let mut args = HashMap::new();
        args.insert(
            "sources".to_string(),
            serde_json::json!([{"type": "web"}, {"type": "file"}]),
        );

        let cleaned = MCPClient::clean_tool_arguments(&args);
        let sources = cleaned.get("sources").unwrap().as_array().unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0], serde_json::json!({"type": "web"}));
    }

    #[test]
    fn test_clean_tool_arguments_nested_objects() {
        let mut args = HashMap::new();
        args.insert(
            "config".to_string(),
            serde_json::json!({
                "name": "test",
                "value": null,
                "nested": {"a": 1, "b": null}
            }),
        );

        let cleaned = MCPClient::clean_tool_arguments(&args);
        let config = cleaned.get("config").unwrap();
        assert!(config.get("name").is_some());
        assert!(config.get("value").is_none());
    }

    #[test]
    fn test_clean_tool_arguments_empty() {
        let args = HashMap::new();
        let cleaned = MCPClient::clean_tool_arguments(&args);
        assert!(cleaned.is_empty());
    }

    #[test]
    fn test_clean_tool_arguments_all_nulls() {
        let mut args = HashMap::new();
        args.insert("a".to_string(), Value::Null);
        args.insert("b".to_string(), Value::Null);

        let cleaned = MCPClient::clean_tool_arguments(&args);
        assert!(cleaned.is_empty());
    }

    #[test]
    fn test_clean_tool_arguments_array_with_nulls() {
        let mut args = HashMap::new();
        args.insert(
            "items".to_string(),
            serde_json::json!(["hello", null, "world"]),
        );

        let cleaned = MCPClient::clean_tool_arguments(&args);
        let items = cleaned.get("items").unwrap().as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], serde_json::json!("hello"));
        assert_eq!(items[1], serde_json::json!("world"));
    }

    #[test]
    fn test_extract_tool_text_from_content_block() {
        let result = serde_json::json!({"content": [{"type": "text", "text": "hello"}]});
        assert_eq!(MCPClient::extract_tool_text(&result), "hello");
    }

    #[test]
    fn test_extract_tool_text_falls_back_to_json() {
        let result = serde_json::json!({"foo": "bar"});
        assert_eq!(MCPClient::extract_tool_text(&result), result.to_string());
    }

    #[test]
    fn test_client_new_defaults() {
        use crate::mcp::transports::stdio::StdioTransport;
        let transport = StdioTransport::new("echo", None, None);
        let client = MCPClient::new(Box::new(transport));

        assert_eq!(client.connect_timeout, MCP_CONNECTION_TIMEOUT);
        assert_eq!(client.execution_timeout, MCP_TOOL_EXECUTION_TIMEOUT);
        assert_eq!(client.discovery_timeout, MCP_DISCOVERY_TIMEOUT);
        assert_eq!(client.max_retries, MCP_MAX_RETRIES);
        assert!(!client.cache_tools_list);
        assert!(!client.connected());
        assert!(!client.initialized);
        assert!(!client.was_connected);
    }

    #[test]
    fn test_client_builder() {
        use crate::mcp::transports::stdio::StdioTransport;
        let transport = StdioTransport::new("echo", None, None);
        let client = MCPClient::new(Box::new(transport))
            .with_connect_timeout(60)
            .with_execution_timeout(120)
            .with_discovery_timeout(45)
            .with_max_retries(5)
            .with_cache_tools_list(true);

        assert_eq!(client.connect_timeout, 60);
        assert_eq!(client.execution_timeout, 120);
        assert_eq!(client.discovery_timeout, 45);
        assert_eq!(client.max_retries, 5);
        assert!(client.cache_tools_list);
    }

    #[test]
    fn test_get_session_not_connected() {
        use crate::mcp::transports::stdio::StdioTransport;
        let transport = StdioTransport::new("echo", None, None);
        let client = MCPClient::new(Box::new(transport));

        let result = client.get_session();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("not connected"));
    }

    #[test]
    fn test_get_cache_key() {
        use crate::mcp::transports::http::HTTPTransport;
        let transport = HTTPTransport::new("https://example.com/mcp", None, None);
        let client = MCPClient::new(Box::new(transport));

        let key = client.get_cache_key("tools");
        assert!(key.starts_with("mcp:"));
        assert!(key.contains("http:"));
        assert!(key.ends_with(":tools"));
    }

    #[test]
    fn test_get_server_info_stdio() {
        use crate::mcp::transports::stdio::StdioTransport;
        let transport = StdioTransport::new(
            "python",
            Some(vec!["server.py".into()]),
            None,
        );
        let client = MCPClient::new(Box::new(transport));
        let info = client.get_server_info();

        assert!(info.server_name.contains("python"));
        assert!(info.server_url.is_none());
        assert_eq!(info.transport_type, "stdio");
    }

    #[test]
    fn test_get_server_info_http() {
        use crate::mcp::transports::http::HTTPTransport;
        let transport = HTTPTransport::new("https://api.example.com/mcp", None, None);
        let client = MCPClient::new(Box::new(transport));
        let info = client.get_server_info();

        assert!(info.server_url.is_some());
        assert!(info.server_url.as_ref().unwrap().contains("example.com"));
    }

    #[test]
    fn test_get_server_info_sse() {
        use crate::mcp::transports::sse::SSETransport;
        let transport = SSETransport::new("https://api.example.com/sse", None);
        let client = MCPClient::new(Box::new(transport));
        let info = client.get_server_info();

        assert!(info.server_url.is_some());
        assert_eq!(info.transport_type, "sse");
    }
}
