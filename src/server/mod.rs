//! The agent's HTTP surface: one JSON-RPC 2.0 endpoint speaking the A2A
//! method set, the Agent Card, health probes, and the `/mcp` server route.
//!
//! # Endpoints
//!
//! - `POST /`                       — JSON-RPC 2.0 (`message/send`, `message/stream`,
//!                                     `tasks/get`, `tasks/cancel`, `tasks/resubscribe`,
//!                                     `tasks/pushNotificationConfig/{set,get,list,delete}`)
//! - `GET  /.well-known/agent.json` — Agent Card
//! - `GET  /health`                 — liveness probe
//! - `GET  /services/health`        — aggregated MCP/service health
//! - `POST /mcp`, `GET /mcp`        — this agent's own capabilities, exposed as MCP tools

pub mod routes;

pub use routes::{app_router, AppState};
