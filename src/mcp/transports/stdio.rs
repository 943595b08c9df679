//! Stdio transport for MCP servers running as local processes.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

use crate::mcp::transports::{BaseTransport, TransportType};

type PendingRequests = Arc<AsyncMutex<HashMap<i64, oneshot::Sender<Value>>>>;

/// Stdio transport for connecting to local MCP servers.
///
/// Connects to MCP servers running as local processes, communicating
/// via newline-delimited JSON-RPC over standard input/output. A
/// background task reads response lines from the child's stdout and
/// routes each one to the oneshot channel registered for its `id`, so
/// concurrent in-flight requests don't need to take turns.
pub struct StdioTransport {
    /// Command to execute (e.g., "python", "node", "npx").
    pub command: String,
    /// Command arguments (e.g., vec!["server.py"] or vec!["-y", "@mcp/server"]).
    pub args: Vec<String>,
    /// Environment variables to pass to the process.
    pub env: HashMap<String, String>,
    /// Whether the transport is currently connected.
    is_connected: bool,
    /// The child process handle.
    process: Option<Child>,
    /// Write half of the child's stdin, held open across requests.
    stdin: Option<ChildStdin>,
    /// Requests awaiting a response, keyed by JSON-RPC id.
    pending: PendingRequests,
    /// Monotonically increasing request id.
    next_id: AtomicI64,
    /// Handle to the background stdout-reading task.
    reader_task: Option<JoinHandle<()>>,
}

impl StdioTransport {
    /// Create a new StdioTransport.
    ///
    /// # Arguments
    /// * `command` - Command to execute.
    /// * `args` - Command arguments.
    /// * `env` - Environment variables.
    pub fn new(
        command: &str,
        args: Option<Vec<String>>,
        env: Option<HashMap<String, String>>,
    ) -> Self {
        Self {
            command: command.to_string(),
            args: args.unwrap_or_default(),
            env: env.unwrap_or_default(),
            is_connected: false,
            process: None,
            stdin: None,
            pending: Arc::new(AsyncMutex::new(HashMap::new())),
            next_id: AtomicI64::new(1),
            reader_task: None,
        }
    }
}

#[async_trait]
impl BaseTransport for StdioTransport {
    fn transport_type(&self) -> TransportType {
        TransportType::Stdio
    }

    fn connected(&self) -> bool {
        self.is_connected
    }

    async fn connect(&mut self) -> Result<(), anyhow::Error> {
        if self.is_connected {
            return Ok(());
        }

        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Merge environment variables
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|e| {
            anyhow::anyhow!(
                "Failed to start MCP server process '{}': {}",
                self.command,
                e
            )
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow::anyhow!("child stdin was not piped"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow::anyhow!("child stdout was not piped"))?;

        let pending = Arc::clone(&self.pending);
        let reader_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        let Ok(value) = serde_json::from_str::<Value>(&line) else {
                            log::warn!("MCP stdio server emitted a non-JSON line, dropping it");
                            continue;
                        };
                        let Some(id) = value.get("id").and_then(Value::as_i64) else {
                            // A server-initiated notification; no request is waiting on it.
                            continue;
                        };
                        let mut pending = pending.lock().await;
                        if let Some(tx) = pending.remove(&id) {
                            let _ = tx.send(value);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        log::warn!("MCP stdio server stdout read failed: {e}");
                        break;
                    }
                }
            }
        });

        self.process = Some(child);
        self.stdin = Some(stdin);
        self.reader_task = Some(reader_task);
        self.is_connected = true;

        log::info!(
            "Stdio transport connected: {} {}",
            self.command,
            self.args.join(" ")
        );

        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), anyhow::Error> {
        if !self.is_connected {
            return Ok(());
        }

        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        self.stdin = None;
        if let Some(ref mut process) = self.process {
            let _ = process.kill().await;
        }
        self.process = None;
        self.is_connected = false;
        self.pending.lock().await.clear();

        log::info!(
            "Stdio transport disconnected: {} {}",
            self.command,
            self.args.join(" ")
        );

        Ok(())
    }

    fn server_identifier(&self) -> String {
        format!("stdio:{}:{}", self.command, self.args.join(":"))
    }

    async fn request(&mut self, method: &str, params: Value) -> Result<Value, anyhow::Error> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let envelope = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let result = self.write_line(&envelope).await;
        if let Err(e) = result {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        let response = rx
            .await
            .map_err(|_| anyhow::anyhow!("MCP server '{}' closed the connection before responding", self.command))?;

        if let Some(error) = response.get("error") {
            return Err(anyhow::anyhow!("MCP server returned an error for '{method}': {error}"));
        }
        Ok(response.get("result").cloned().unwrap_or(Value::Null))
    }

    async fn notify(&mut self, method: &str, params: Value) -> Result<(), anyhow::Error> {
        let envelope = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });
        self.write_line(&envelope).await
    }
}

impl StdioTransport {
    async fn write_line(&mut self, value: &Value) -> Result<(), anyhow::Error> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("stdio transport is not connected"))?;
        let mut line = serde_json::to_string(value)?;
        line.push('\n');
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        if let Some(ref mut process) = self.process {
            // Best-effort kill on drop
            let _ = process.start_kill();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_transport_is_disconnected() {
        let transport = StdioTransport::new("echo", None, None);
        assert!(!transport.connected());
        assert_eq!(transport.server_identifier(), "stdio:echo:");
    }

    #[tokio::test]
    async fn request_before_connect_errors() {
        let mut transport = StdioTransport::new("echo", None, None);
        let result = transport.request("tools/list", serde_json::json!({})).await;
        assert!(result.is_err());
    }
}
