//! Crate-wide error taxonomy.
//!
//! One variant family per error kind named in the design's error-handling
//! section: configuration, authentication/authorization, routing, dispatch,
//! handler, unsupported-operation, cancellation, and delivery errors.
//! Everything below the executor returns a `Result<_, AgentError>`; the
//! executor is the single place that converts an `AgentError` into a task
//! status transition or a JSON-RPC error response.

use serde_json::Value;
use thiserror::Error;

use crate::a2a::errors::{A2AError, A2AErrorCode};

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Invalid YAML, missing required field, an MCP tool with no scope
    /// mapping — anything that should fail startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Missing credentials, invalid credentials, or a missing scope.
    #[error("authentication error: {0}")]
    Auth(String),

    /// A capability or MCP tool was invoked without the scopes it requires.
    #[error("authorization error: missing scope(s) {missing:?} for {subject}")]
    Authorization {
        subject: String,
        missing: Vec<String>,
    },

    /// No capability matched and no fallback was configured.
    #[error("routing error: {0}")]
    Routing(String),

    /// LLM provider error, max-iterations exceeded, function-argument
    /// decode failure.
    #[error("dispatch error: {0}")]
    Dispatch(String),

    /// Uncaught error from a capability's `execute_capability`.
    #[error("handler error: {0}")]
    Handler(String),

    /// Detected by an `"unsupported"` marker in the underlying error.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// An explicit cancellation request.
    #[error("task canceled: {0}")]
    Cancellation(String),

    /// Push-notification delivery failure. Never surfaced to the task;
    /// logged and retried by the caller.
    #[error("delivery error: {0}")]
    Delivery(String),
}

impl AgentError {
    /// Whether this error should cause the task to transition to `rejected`
    /// rather than `failed`, per the executor's exception-to-status mapping.
    pub fn is_rejection(&self) -> bool {
        match self {
            AgentError::UnsupportedOperation(_) => true,
            AgentError::Handler(msg) | AgentError::Dispatch(msg) => {
                msg.to_lowercase().contains("unsupported")
            }
            _ => false,
        }
    }

    /// Convert to the external JSON-RPC error envelope (`-32603` family),
    /// reusing the A2A error-code constants directly rather than
    /// duplicating them.
    pub fn to_rpc_error(&self) -> A2AError {
        match self {
            AgentError::Config(msg) => A2AError::new(A2AErrorCode::InvalidParams, msg.clone()),
            AgentError::Auth(msg) => {
                A2AError::new(A2AErrorCode::AuthenticationRequired, msg.clone())
            }
            AgentError::Authorization { subject, missing } => A2AError::with_data(
                A2AErrorCode::AuthorizationFailed,
                format!("missing required scope(s) for {subject}"),
                Value::Array(missing.iter().cloned().map(Value::String).collect()),
            ),
            AgentError::Routing(msg) => A2AError::new(A2AErrorCode::SkillNotFound, msg.clone()),
            AgentError::Dispatch(msg) => A2AError::new(A2AErrorCode::InternalError, msg.clone()),
            AgentError::Handler(msg) => A2AError::new(A2AErrorCode::InternalError, msg.clone()),
            AgentError::UnsupportedOperation(msg) => {
                A2AError::new(A2AErrorCode::UnsupportedOperation, msg.clone())
            }
            AgentError::Cancellation(msg) => {
                A2AError::new(A2AErrorCode::TaskNotCancelable, msg.clone())
            }
            AgentError::Delivery(msg) => A2AError::new(A2AErrorCode::InternalError, msg.clone()),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Dispatch(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_operation_is_rejection() {
        let err = AgentError::UnsupportedOperation("streaming not supported".into());
        assert!(err.is_rejection());
    }

    #[test]
    fn handler_error_with_unsupported_marker_is_rejection() {
        let err = AgentError::Handler("operation unsupported for this capability".into());
        assert!(err.is_rejection());
    }

    #[test]
    fn plain_handler_error_is_not_rejection() {
        let err = AgentError::Handler("division by zero".into());
        assert!(!err.is_rejection());
    }

    #[test]
    fn authorization_error_carries_missing_scopes_as_data() {
        let err = AgentError::Authorization {
            subject: "delete_file".into(),
            missing: vec!["files:write".into()],
        };
        let rpc = err.to_rpc_error();
        assert_eq!(rpc.code, A2AErrorCode::AuthorizationFailed as i32);
        assert!(rpc.data.is_some());
    }
}
