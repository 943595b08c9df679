//! Server-Sent Events (SSE) transport for MCP servers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use crate::mcp::transports::{BaseTransport, TransportType};

/// SSE transport for connecting to remote MCP servers.
///
/// Legacy MCP transport: requests are `POST`ed as JSON-RPC envelopes and
/// the matching response is read back from the same request/response
/// cycle, same as `HTTPTransport`. Server-initiated notifications over
/// the SSE stream itself are not consumed by this client; it only needs
/// request/response semantics for `initialize`/`tools/list`/`tools/call`.
pub struct SSETransport {
    /// Server URL (e.g., "https://api.example.com/mcp/sse").
    pub url: String,
    /// Optional HTTP headers.
    pub headers: HashMap<String, String>,
    /// Whether the transport is currently connected.
    is_connected: bool,
    client: reqwest::Client,
    next_id: AtomicI64,
}

impl SSETransport {
    /// Create a new SSETransport.
    ///
    /// # Arguments
    /// * `url` - Server URL (e.g., "https://api.example.com/mcp/sse").
    /// * `headers` - Optional HTTP headers.
    pub fn new(url: &str, headers: Option<HashMap<String, String>>) -> Self {
        Self {
            url: url.to_string(),
            headers: headers.unwrap_or_default(),
            is_connected: false,
            client: reqwest::Client::new(),
            next_id: AtomicI64::new(1),
        }
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response, anyhow::Error> {
        let mut req = self.client.post(&self.url).json(body);
        for (key, value) in &self.headers {
            req = req.header(key.as_str(), value.as_str());
        }
        Ok(req.send().await?)
    }
}

#[async_trait]
impl BaseTransport for SSETransport {
    fn transport_type(&self) -> TransportType {
        TransportType::Sse
    }

    fn connected(&self) -> bool {
        self.is_connected
    }

    async fn connect(&mut self) -> Result<(), anyhow::Error> {
        if self.is_connected {
            return Ok(());
        }

        log::info!("SSE transport connecting to: {}", self.url);

        self.is_connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), anyhow::Error> {
        if !self.is_connected {
            return Ok(());
        }

        log::info!("SSE transport disconnecting from: {}", self.url);

        self.is_connected = false;
        Ok(())
    }

    fn server_identifier(&self) -> String {
        format!("sse:{}", self.url)
    }

    async fn request(&mut self, method: &str, params: Value) -> Result<Value, anyhow::Error> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self.post(&body).await?;
        let status = response.status();
        let value: Value = response.json().await?;

        if !status.is_success() {
            return Err(anyhow::anyhow!(
                "MCP SSE server returned {status} for '{method}': {value}"
            ));
        }
        if let Some(error) = value.get("error") {
            return Err(anyhow::anyhow!("MCP server returned an error for '{method}': {error}"));
        }
        Ok(value.get("result").cloned().unwrap_or(Value::Null))
    }

    async fn notify(&mut self, method: &str, params: Value) -> Result<(), anyhow::Error> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });
        let response = self.post(&body).await?;
        let status = response.status();
        if !status.is_success() && status.as_u16() != 202 {
            return Err(anyhow::anyhow!("MCP SSE server returned {status} for notification '{method}'"));
        }
        Ok(())
    }
}
