//! JSON-RPC 2.0 envelope types and the A2A method-name surface.
//!
//! Reuses the error-code constants already defined in `a2a::errors` rather
//! than duplicating them; adds the envelope shapes (request/response/
//! notification) and SSE framing the server needs to speak JSON-RPC over
//! both a plain `POST /` and a `text/event-stream` connection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::A2AError;

/// The six JSON-RPC methods this agent exposes.
pub mod methods {
    pub const MESSAGE_SEND: &str = "message/send";
    pub const MESSAGE_STREAM: &str = "message/stream";
    pub const TASKS_GET: &str = "tasks/get";
    pub const TASKS_CANCEL: &str = "tasks/cancel";
    pub const TASKS_RESUBSCRIBE: &str = "tasks/resubscribe";
    pub const TASKS_PUSH_NOTIFICATION_CONFIG_SET: &str = "tasks/pushNotificationConfig/set";
    pub const TASKS_PUSH_NOTIFICATION_CONFIG_GET: &str = "tasks/pushNotificationConfig/get";
    pub const TASKS_PUSH_NOTIFICATION_CONFIG_LIST: &str = "tasks/pushNotificationConfig/list";
    pub const TASKS_PUSH_NOTIFICATION_CONFIG_DELETE: &str = "tasks/pushNotificationConfig/delete";

    /// Every method this agent will route to a handler; anything else is
    /// `-32601 Method not found`.
    pub const ALL: &[&str] = &[
        MESSAGE_SEND,
        MESSAGE_STREAM,
        TASKS_GET,
        TASKS_CANCEL,
        TASKS_RESUBSCRIBE,
        TASKS_PUSH_NOTIFICATION_CONFIG_SET,
        TASKS_PUSH_NOTIFICATION_CONFIG_GET,
        TASKS_PUSH_NOTIFICATION_CONFIG_LIST,
        TASKS_PUSH_NOTIFICATION_CONFIG_DELETE,
    ];

    /// Whether a method streams its response as SSE rather than returning
    /// a single JSON-RPC response object.
    pub fn is_streaming(method: &str) -> bool {
        method == MESSAGE_STREAM || method == TASKS_RESUBSCRIBE
    }
}

/// A parsed JSON-RPC 2.0 request.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    /// Absent on a notification; notifications get no response body, only
    /// an HTTP 202.
    #[serde(default)]
    pub id: Option<Value>,
}

impl JsonRpcRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// A successful JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub result: Value,
    pub id: Value,
}

impl JsonRpcResponse {
    pub fn new(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            result,
            id,
        }
    }
}

/// An error JSON-RPC 2.0 response, built directly from an `A2AError`.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcErrorResponse {
    pub jsonrpc: &'static str,
    pub error: Value,
    pub id: Value,
}

impl JsonRpcErrorResponse {
    pub fn from_error(id: Option<Value>, error: &A2AError) -> Self {
        Self {
            jsonrpc: "2.0",
            error: error.to_dict(),
            id: id.unwrap_or(Value::Null),
        }
    }
}

/// One frame of an SSE stream: a single JSON-RPC response object encoded
/// as a `data: <json>\n\n` event, per the streaming contract.
pub fn format_sse_event(payload: &Value) -> String {
    format!("data: {}\n\n", payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::a2a::errors::A2AErrorCode;

    #[test]
    fn notification_has_no_id() {
        let req: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"message/send","params":{}}"#)
                .unwrap();
        assert!(req.is_notification());
    }

    #[test]
    fn request_with_id_is_not_notification() {
        let req: JsonRpcRequest = serde_json::from_str(
            r#"{"jsonrpc":"2.0","method":"tasks/get","params":{},"id":1}"#,
        )
        .unwrap();
        assert!(!req.is_notification());
    }

    #[test]
    fn streaming_methods_are_recognized() {
        assert!(methods::is_streaming(methods::MESSAGE_STREAM));
        assert!(methods::is_streaming(methods::TASKS_RESUBSCRIBE));
        assert!(!methods::is_streaming(methods::MESSAGE_SEND));
    }

    #[test]
    fn error_response_carries_code_and_message() {
        let err = A2AError::new(A2AErrorCode::MethodNotFound, "no such method");
        let resp = JsonRpcErrorResponse::from_error(Some(Value::from(1)), &err);
        assert_eq!(resp.error["code"], Value::from(A2AErrorCode::MethodNotFound as i32));
    }

    #[test]
    fn sse_event_is_data_prefixed_and_blank_line_terminated() {
        let payload = serde_json::json!({"jsonrpc": "2.0", "result": {"ok": true}, "id": 1});
        let frame = format_sse_event(&payload);
        assert!(frame.starts_with("data: "));
        assert!(frame.ends_with("\n\n"));
    }
}
