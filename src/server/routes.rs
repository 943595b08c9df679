//! The A2A external interface: a single JSON-RPC 2.0 endpoint at `POST /`
//! (plain JSON for most methods, `text/event-stream` for the two
//! streaming ones), the `/.well-known/agent.json` Agent Card, liveness
//! and aggregated-health probes, and the `/mcp` server surface.
//!
//! HTTP status carries only transport-level failure: a well-formed
//! JSON-RPC request always gets `200` back, success or JSON-RPC error
//! alike. `401` is reserved for a request the `AuthManager` couldn't
//! authenticate at all; a notification (no `id`) gets a bodiless `202`.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router as AxumRouter};
use bytes::Bytes;
use dashmap::DashMap;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::a2a::client::{AgentCapabilities, AgentCard, AgentSkill};
use crate::a2a::errors::{A2AError, A2AErrorCode};
use crate::a2a::jsonrpc::{methods, JsonRpcErrorResponse, JsonRpcRequest, JsonRpcResponse};
use crate::a2a::task::{Message, Part, Role, Task, TaskEvent, TaskEventQueue, TaskStatus};
use crate::app::AppContext;
use crate::auth::{AuthContext, Credential};
use crate::config::AuthProviderConfig;
use crate::error::AgentError;
use crate::mcp::McpServerState;
use crate::push::{validate_webhook_url, PushNotificationConfig};

/// Shared state threaded through every route via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<AppContext>,
    /// Live SSE streams, keyed by task id, so `tasks/cancel` can push a
    /// terminal event into a stream that's still being read.
    streams: Arc<DashMap<String, Arc<TaskEventQueue>>>,
    mcp: Arc<McpServerState>,
}

impl AppState {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        let mcp = Arc::new(McpServerState::new(
            Arc::clone(&ctx.capability_registry),
            Arc::clone(&ctx.task_store),
            ctx.config.mcp.expose_handlers,
            ctx.config.agent.name.clone(),
        ));
        Self {
            ctx,
            streams: Arc::new(DashMap::new()),
            mcp,
        }
    }
}

pub fn app_router(state: AppState) -> AxumRouter {
    AxumRouter::new()
        .route("/", post(jsonrpc_handler))
        .route("/.well-known/agent.json", get(agent_card_handler))
        .route("/health", get(health_handler))
        .route("/services/health", get(services_health_handler))
        .route("/mcp", post(mcp_post_handler).get(mcp_sse_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Wire shapes for method params
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct IncomingMessage {
    #[serde(default)]
    role: Option<Role>,
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct MessageSendParams {
    message: IncomingMessage,
    #[serde(default, rename = "contextId")]
    context_id: Option<String>,
    #[serde(default, rename = "taskId")]
    task_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TaskIdParams {
    #[serde(rename = "taskId")]
    task_id: String,
}

#[derive(Debug, Deserialize)]
struct PushConfigWire {
    #[serde(default)]
    id: Option<String>,
    url: String,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    headers: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct PushConfigSetParams {
    #[serde(rename = "taskId")]
    task_id: String,
    #[serde(rename = "pushNotificationConfig")]
    config: PushConfigWire,
}

#[derive(Debug, Deserialize)]
struct PushConfigIdParams {
    #[serde(rename = "taskId")]
    task_id: String,
    id: String,
}

fn bad_params(err: impl std::fmt::Display) -> AgentError {
    AgentError::Config(format!("invalid params: {err}"))
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

fn extract_credential(headers: &HeaderMap) -> Option<Credential> {
    if let Some(value) = headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(token) = value.strip_prefix("Bearer ") {
            return Some(Credential::Bearer(token.to_string()));
        }
    }
    if let Some(value) = headers.get("X-API-Key").and_then(|v| v.to_str().ok()) {
        return Some(Credential::ApiKey {
            header: "X-API-Key".to_string(),
            value: value.to_string(),
        });
    }
    None
}

/// `Ok(None)` means auth is disabled; a capability that still requires
/// scopes will be refused further down by the `AuthInjector`, not here.
async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Option<AuthContext>, Response> {
    if !state.ctx.auth_manager.is_enabled() {
        return Ok(None);
    }
    let credential = extract_credential(headers).ok_or_else(unauthorized_response)?;
    state
        .ctx
        .auth_manager
        .authenticate(&credential)
        .await
        .map(Some)
        .map_err(|_| unauthorized_response())
}

fn unauthorized_response() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "authentication required or credential rejected" })),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// JSON-RPC envelope plumbing
// ---------------------------------------------------------------------------

fn rpc_ok(id: Value, result: Value) -> Response {
    (StatusCode::OK, Json(JsonRpcResponse::new(id, result))).into_response()
}

fn rpc_err(id: Option<Value>, error: A2AError) -> Response {
    (StatusCode::OK, Json(JsonRpcErrorResponse::from_error(id, &error))).into_response()
}

async fn jsonrpc_handler(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let request: JsonRpcRequest = match serde_json::from_slice::<Value>(&body) {
        Ok(value) => match serde_json::from_value(value) {
            Ok(req) => req,
            Err(_) => return rpc_err(None, A2AError::from_code(A2AErrorCode::InvalidRequest)),
        },
        Err(_) => return rpc_err(None, A2AError::from_code(A2AErrorCode::InvalidRequest)),
    };

    if request.jsonrpc.as_deref() != Some("2.0") {
        return rpc_err(request.id.clone(), A2AError::from_code(A2AErrorCode::InvalidRequest));
    }
    if !methods::ALL.contains(&request.method.as_str()) {
        return rpc_err(request.id.clone(), A2AError::from_code(A2AErrorCode::MethodNotFound));
    }

    let auth = match authenticate(&state, &headers).await {
        Ok(auth) => auth,
        Err(resp) => return resp,
    };

    if methods::is_streaming(&request.method) {
        return stream_response(&state, auth, request).await;
    }

    let id = request.id.clone();
    let is_notification = request.is_notification();
    let result = dispatch(&state, &auth, &request.method, request.params).await;

    if is_notification {
        return StatusCode::ACCEPTED.into_response();
    }
    match result {
        Ok(value) => rpc_ok(id.unwrap_or(Value::Null), value),
        Err(err) => rpc_err(id, err.to_rpc_error()),
    }
}

async fn dispatch(state: &AppState, auth: &Option<AuthContext>, method: &str, params: Value) -> Result<Value, AgentError> {
    match method {
        methods::MESSAGE_SEND => handle_message_send(state, auth, params).await,
        methods::TASKS_GET => handle_tasks_get(state, params),
        methods::TASKS_CANCEL => handle_tasks_cancel(state, params),
        methods::TASKS_PUSH_NOTIFICATION_CONFIG_SET => handle_push_set(state, params),
        methods::TASKS_PUSH_NOTIFICATION_CONFIG_GET => handle_push_get(state, params),
        methods::TASKS_PUSH_NOTIFICATION_CONFIG_LIST => handle_push_list(state, params),
        methods::TASKS_PUSH_NOTIFICATION_CONFIG_DELETE => handle_push_delete(state, params),
        other => Err(AgentError::Routing(format!("unhandled method: {other}"))),
    }
}

fn task_to_value(task: Task) -> Value {
    serde_json::to_value(task).expect("Task always serializes")
}

async fn handle_message_send(state: &AppState, auth: &Option<AuthContext>, params: Value) -> Result<Value, AgentError> {
    let parsed: MessageSendParams = serde_json::from_value(params).map_err(bad_params)?;
    let task = resolve_or_create_task(state, parsed.task_id, parsed.context_id)?;
    let role = parsed.message.role.unwrap_or(Role::User);
    state.ctx.task_store.append_message(&task.task_id, Message::new(role, parsed.message.parts))?;
    let updated = state.ctx.executor.execute(&task.task_id, auth.clone()).await?;
    Ok(task_to_value(updated))
}

fn resolve_or_create_task(state: &AppState, task_id: Option<String>, context_id: Option<String>) -> Result<Task, AgentError> {
    match task_id {
        Some(id) => state
            .ctx
            .task_store
            .get(&id)
            .ok_or_else(|| AgentError::Routing(format!("task not found: {id}"))),
        None => Ok(state.ctx.task_store.create(context_id)),
    }
}

fn handle_tasks_get(state: &AppState, params: Value) -> Result<Value, AgentError> {
    let parsed: TaskIdParams = serde_json::from_value(params).map_err(bad_params)?;
    let task = state
        .ctx
        .task_store
        .get(&parsed.task_id)
        .ok_or_else(|| AgentError::Routing(format!("task not found: {}", parsed.task_id)))?;
    Ok(task_to_value(task))
}

fn handle_tasks_cancel(state: &AppState, params: Value) -> Result<Value, AgentError> {
    let parsed: TaskIdParams = serde_json::from_value(params).map_err(bad_params)?;
    state.ctx.task_store.cancel(&parsed.task_id)?;
    if let Some(queue) = state.streams.get(&parsed.task_id) {
        let _ = queue.push(TaskEvent::Status {
            status: TaskStatus::Canceled,
            message: Some("canceled by client request".into()),
        });
    }
    let task = state
        .ctx
        .task_store
        .get(&parsed.task_id)
        .ok_or_else(|| AgentError::Routing(format!("task not found: {}", parsed.task_id)))?;
    Ok(task_to_value(task))
}

fn handle_push_set(state: &AppState, params: Value) -> Result<Value, AgentError> {
    let parsed: PushConfigSetParams = serde_json::from_value(params).map_err(bad_params)?;
    if state.ctx.config.push_notifications.validate_urls {
        validate_webhook_url(&parsed.config.url)?;
    }
    let config = PushNotificationConfig {
        id: parsed.config.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        url: parsed.config.url,
        token: parsed.config.token,
        headers: parsed.config.headers,
    };
    state.ctx.push_configs.set(&parsed.task_id, config.clone());
    Ok(serde_json::to_value(config).expect("PushNotificationConfig always serializes"))
}

fn handle_push_get(state: &AppState, params: Value) -> Result<Value, AgentError> {
    let parsed: PushConfigIdParams = serde_json::from_value(params).map_err(bad_params)?;
    let config = state
        .ctx
        .push_configs
        .get(&parsed.task_id, &parsed.id)
        .ok_or_else(|| AgentError::Routing(format!("no push notification config '{}' for task {}", parsed.id, parsed.task_id)))?;
    Ok(serde_json::to_value(config).expect("PushNotificationConfig always serializes"))
}

fn handle_push_list(state: &AppState, params: Value) -> Result<Value, AgentError> {
    let parsed: TaskIdParams = serde_json::from_value(params).map_err(bad_params)?;
    let configs = state.ctx.push_configs.list(&parsed.task_id);
    Ok(json!({ "configs": configs }))
}

fn handle_push_delete(state: &AppState, params: Value) -> Result<Value, AgentError> {
    let parsed: PushConfigIdParams = serde_json::from_value(params).map_err(bad_params)?;
    let deleted = state.ctx.push_configs.delete(&parsed.task_id, &parsed.id);
    Ok(json!({ "deleted": deleted }))
}

// ---------------------------------------------------------------------------
// Streaming (message/stream, tasks/resubscribe)
// ---------------------------------------------------------------------------

async fn stream_response(state: &AppState, auth: Option<AuthContext>, request: JsonRpcRequest) -> Response {
    let rpc_id = request.id.clone();

    let task_id = if request.method == methods::MESSAGE_STREAM {
        let parsed: MessageSendParams = match serde_json::from_value(request.params) {
            Ok(p) => p,
            Err(e) => return rpc_err(rpc_id, bad_params(e).to_rpc_error()),
        };
        let task = match resolve_or_create_task(state, parsed.task_id, parsed.context_id) {
            Ok(t) => t,
            Err(e) => return rpc_err(rpc_id, e.to_rpc_error()),
        };
        let role = parsed.message.role.unwrap_or(Role::User);
        if let Err(e) = state.ctx.task_store.append_message(&task.task_id, Message::new(role, parsed.message.parts)) {
            return rpc_err(rpc_id, e.to_rpc_error());
        }
        task.task_id
    } else {
        let parsed: TaskIdParams = match serde_json::from_value(request.params) {
            Ok(p) => p,
            Err(e) => return rpc_err(rpc_id, bad_params(e).to_rpc_error()),
        };
        if state.ctx.task_store.get(&parsed.task_id).is_none() {
            return rpc_err(
                rpc_id,
                AgentError::Routing(format!("task not found: {}", parsed.task_id)).to_rpc_error(),
            );
        }
        parsed.task_id
    };

    let queue = Arc::new(TaskEventQueue::new());
    state.streams.insert(task_id.clone(), Arc::clone(&queue));

    if request.method == methods::MESSAGE_STREAM {
        let ctx = Arc::clone(&state.ctx);
        let queue_for_task = Arc::clone(&queue);
        let tid = task_id.clone();
        tokio::spawn(async move {
            let _ = ctx.executor.execute_streaming(&tid, &queue_for_task, auth).await;
        });
    } else if let Some(task) = state.ctx.task_store.get(&task_id) {
        // Resubscribe to a task with no live producer: replay its current
        // status once so the caller sees where it stands, then close.
        let _ = queue.push(TaskEvent::Status {
            status: task.status,
            message: None,
        });
    }

    let body_stream = sse_body(Arc::clone(&state.streams), task_id, queue, rpc_id);
    Sse::new(body_stream).keep_alive(KeepAlive::default()).into_response()
}

struct SseCursor {
    streams: Arc<DashMap<String, Arc<TaskEventQueue>>>,
    task_id: String,
    queue: Arc<TaskEventQueue>,
    rpc_id: Option<Value>,
    done: bool,
}

fn sse_body(
    streams: Arc<DashMap<String, Arc<TaskEventQueue>>>,
    task_id: String,
    queue: Arc<TaskEventQueue>,
    rpc_id: Option<Value>,
) -> impl futures::Stream<Item = Result<Event, Infallible>> {
    let cursor = SseCursor {
        streams,
        task_id,
        queue,
        rpc_id,
        done: false,
    };
    futures::stream::unfold(cursor, |mut cursor| async move {
        if cursor.done {
            return None;
        }
        loop {
            let events = cursor.queue.drain();
            if !events.is_empty() {
                let frames: Vec<Result<Event, Infallible>> = events
                    .into_iter()
                    .map(|event| {
                        let payload = json!({
                            "jsonrpc": "2.0",
                            "result": event,
                            "id": cursor.rpc_id.clone().unwrap_or(Value::Null),
                        });
                        Ok(Event::default().data(payload.to_string()))
                    })
                    .collect();
                if cursor.queue.is_closed() {
                    cursor.done = true;
                    cursor.streams.remove(&cursor.task_id);
                }
                return Some((futures::stream::iter(frames), cursor));
            }
            if cursor.queue.is_closed() {
                cursor.done = true;
                cursor.streams.remove(&cursor.task_id);
                return None;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .flat_map(|s| s)
}

// ---------------------------------------------------------------------------
// Agent Card, health, MCP
// ---------------------------------------------------------------------------

async fn agent_card_handler(State(state): State<AppState>) -> Json<Value> {
    let cfg = &state.ctx.config;
    let bind = cfg.server_bind();

    let skills: Vec<AgentSkill> = state
        .ctx
        .capability_registry
        .list_routable()
        .into_iter()
        .map(|info| AgentSkill {
            id: info.id.clone(),
            name: info.name.clone(),
            description: Some(info.name.clone()),
            input_modes: vec![format!("{:?}", info.input_mode).to_lowercase()],
            output_modes: vec![format!("{:?}", info.output_mode).to_lowercase()],
            tags: Vec::new(),
        })
        .collect();

    let security_schemes: Vec<Value> = cfg
        .security
        .auth
        .iter()
        .map(|provider| match provider {
            AuthProviderConfig::Jwt { .. } => json!({ "type": "http", "scheme": "bearer", "bearerFormat": "JWT" }),
            AuthProviderConfig::Bearer { .. } => json!({ "type": "http", "scheme": "bearer" }),
            AuthProviderConfig::ApiKey { header, .. } => json!({ "type": "apiKey", "in": "header", "name": header }),
        })
        .collect();

    let card = AgentCard {
        name: cfg.agent.name.clone(),
        description: Some(cfg.agent.description.clone()),
        url: format!("http://{}:{}", bind.host, bind.port),
        version: Some(cfg.agent.version.clone()),
        capabilities: AgentCapabilities {
            streaming: true,
            push_notifications: cfg.push_notifications.enabled,
            multi_turn: true,
        },
        skills,
        provider: None,
        default_input_modes: vec!["text".to_string()],
        default_output_modes: vec!["text".to_string()],
        security_schemes,
        extensions: Vec::new(),
    };

    let mut value = serde_json::to_value(&card).expect("AgentCard always serializes");
    value["authenticationRequired"] = json!(state.ctx.auth_manager.is_enabled());
    Json(value)
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn services_health_handler(State(state): State<AppState>) -> Response {
    let mut services = serde_json::Map::new();
    let mut degraded = false;

    for (name, client) in &state.ctx.mcp_clients {
        let connected = client.lock().await.connected();
        if !connected {
            degraded = true;
        }
        services.insert(name.clone(), json!({ "status": if connected { "ok" } else { "degraded" } }));
    }

    let status = if degraded { StatusCode::SERVICE_UNAVAILABLE } else { StatusCode::OK };
    (
        status,
        Json(json!({
            "status": if degraded { "degraded" } else { "ok" },
            "services": services,
        })),
    )
        .into_response()
}

fn is_local_origin(origin: &str) -> bool {
    origin.starts_with("http://localhost") || origin.starts_with("http://127.0.0.1") || origin.starts_with("https://localhost")
}

async fn mcp_post_handler(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    if let Some(version) = headers.get("MCP-Protocol-Version").and_then(|v| v.to_str().ok()) {
        if !crate::mcp::server::is_supported_protocol_version(version) {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("unsupported MCP-Protocol-Version: {version}") })),
            )
                .into_response();
        }
    }
    if let Some(origin) = headers.get(axum::http::header::ORIGIN).and_then(|v| v.to_str().ok()) {
        if !is_local_origin(origin) {
            tracing::warn!(origin, "MCP request from a non-local origin");
        }
    }

    let request: JsonRpcRequest = match serde_json::from_slice::<Value>(&body).and_then(serde_json::from_value) {
        Ok(req) => req,
        Err(_) => return rpc_err(None, A2AError::from_code(A2AErrorCode::InvalidRequest)),
    };

    let is_notification = request.is_notification();
    let result = state.mcp.handle_method(&request.method, &request.params).await;

    if is_notification {
        return StatusCode::ACCEPTED.into_response();
    }
    match result {
        Ok(value) => rpc_ok(request.id.unwrap_or(Value::Null), value),
        Err(err) => rpc_err(request.id, err.to_rpc_error()),
    }
}

async fn mcp_sse_handler() -> Response {
    let stream = crate::mcp::server::notification_stream().map(|item| item.map(|data| Event::default().data(data)));
    Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use tower::ServiceExt;

    async fn test_state() -> AppState {
        let config = AppConfig::parse(
            r#"
agent:
  name: TestAgent
plugins:
  - status
routing:
  default_mode: direct
  fallback_capability: status
security:
  enabled: false
"#,
        )
        .unwrap();
        let ctx = AppContext::build(config).await.unwrap();
        AppState::new(Arc::new(ctx))
    }

    #[tokio::test]
    async fn health_endpoint_reports_ok() {
        let state = test_state().await;
        let app = app_router(state);
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/health")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn agent_card_lists_routable_skills() {
        let state = test_state().await;
        let app = app_router(state);
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/.well-known/agent.json")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        let skill_ids: Vec<&str> = value["skills"].as_array().unwrap().iter().map(|s| s["id"].as_str().unwrap()).collect();
        assert!(skill_ids.contains(&"status"));
    }

    #[tokio::test]
    async fn message_send_echoes_status_capability_result() {
        let state = test_state().await;
        let app = app_router(state);
        let request_body = json!({
            "jsonrpc": "2.0",
            "method": "message/send",
            "params": {
                "message": {
                    "role": "user",
                    "parts": [{ "kind": "text", "text": "status" }]
                }
            },
            "id": 1
        });
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/")
                    .header("content-type", "application/json")
                    .body(axum::body::Body::from(request_body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["result"]["status"], "completed");
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let state = test_state().await;
        let app = app_router(state);
        let request_body = json!({ "jsonrpc": "2.0", "method": "not/a/method", "params": {}, "id": 1 });
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/")
                    .header("content-type", "application/json")
                    .body(axum::body::Body::from(request_body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"]["code"], Value::from(A2AErrorCode::MethodNotFound as i32));
    }

    #[tokio::test]
    async fn notification_gets_bodiless_202() {
        let state = test_state().await;
        let app = app_router(state);
        let request_body = json!({
            "jsonrpc": "2.0",
            "method": "message/send",
            "params": {
                "message": { "role": "user", "parts": [{ "kind": "text", "text": "status" }] }
            }
        });
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/")
                    .header("content-type", "application/json")
                    .body(axum::body::Body::from(request_body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn tasks_get_returns_error_for_unknown_task() {
        let state = test_state().await;
        let app = app_router(state);
        let request_body = json!({ "jsonrpc": "2.0", "method": "tasks/get", "params": { "taskId": "nonexistent" }, "id": 7 });
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/")
                    .header("content-type", "application/json")
                    .body(axum::body::Body::from(request_body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert!(value.get("error").is_some());
    }

    #[tokio::test]
    async fn mcp_tools_list_is_empty_without_expose_handlers() {
        let state = test_state().await;
        let app = app_router(state);
        let request_body = json!({ "jsonrpc": "2.0", "method": "tools/list", "params": {}, "id": 1 });
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/mcp")
                    .header("content-type", "application/json")
                    .body(axum::body::Body::from(request_body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["result"]["tools"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn mcp_unsupported_protocol_version_is_bad_request() {
        let state = test_state().await;
        let app = app_router(state);
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/mcp")
                    .header("content-type", "application/json")
                    .header("MCP-Protocol-Version", "1999-01-01")
                    .body(axum::body::Body::from(json!({"jsonrpc":"2.0","method":"initialize","params":{},"id":1}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
