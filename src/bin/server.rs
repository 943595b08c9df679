//! `agentup-server` binary: loads the agent's YAML configuration, builds
//! its `AppContext`, and serves the A2A HTTP surface.
//!
//! # Environment Variables
//!
//! - `AGENTUP_CONFIG`    — path to the agent configuration YAML (default: `agentup.yaml`)
//! - `SERVER_HOST`       — bind host override (default from config, falls back to `0.0.0.0`)
//! - `SERVER_PORT`       — bind port override (default from config, falls back to `8000`)
//! - `AGENTUP_LOG_LEVEL` — tracing filter override (default: `logging.level` from config)
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin agentup-server
//! ```

use std::sync::Arc;

use agentup::app::AppContext;
use agentup::config::AppConfig;
use agentup::server::{app_router, AppState};

#[tokio::main]
async fn main() {
    let config_path = std::env::var("AGENTUP_CONFIG").unwrap_or_else(|_| "agentup.yaml".to_string());
    let config = AppConfig::load(&config_path).unwrap_or_else(|e| {
        eprintln!("failed to load configuration from {config_path}: {e}");
        std::process::exit(1);
    });

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level())),
        )
        .init();

    let bind = config.server_bind();
    let agent_name = config.agent.name.clone();

    let ctx = AppContext::build(config)
        .await
        .unwrap_or_else(|e| panic!("failed to build agent context: {e}"));

    let state = AppState::new(Arc::new(ctx));
    let app = app_router(state);

    let bind_addr = format!("{}:{}", bind.host, bind.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {bind_addr}: {e}"));

    tracing::info!(agent = %agent_name, addr = %bind_addr, "agentup server starting");
    tracing::info!("  POST /                       — JSON-RPC 2.0 (A2A)");
    tracing::info!("  GET  /.well-known/agent.json — Agent Card");
    tracing::info!("  GET  /health                 — liveness probe");
    tracing::info!("  GET  /services/health        — aggregated service health");
    tracing::info!("  /mcp                          — MCP server surface");

    axum::serve(listener, app).await.expect("server failed");
}
