//! Explicit application context: every long-lived component built once
//! from `AppConfig` and threaded through the HTTP layer via axum's
//! `State` extractor, replacing the teacher's module-level singletons
//! with ordinary `Arc`s owned by one struct.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;

use crate::a2a::task::TaskStore;
use crate::auth::{AuthManager, ScopeHierarchy};
use crate::capabilities::{CapabilitiesPlugin, CapabilityRegistry, StatusPlugin};
use crate::config::{AppConfig, McpServerConfig};
use crate::error::AgentError;
use crate::mcp::transports::{HTTPTransport, StdioTransport};
use crate::mcp::MCPClient;
use crate::push::{PushConfigStore, PushNotifier};
use crate::runtime::{register_capability_functions, register_mcp_server_tools, Dispatcher, Executor, FunctionRegistry, OpenAiChatProvider, Router};
use crate::state::{FileBackend, MemoryBackend, StateBackend, StateStore};

/// Everything the external interfaces (`server::routes`, the `/mcp`
/// server surface) need, built once at startup.
pub struct AppContext {
    pub config: AppConfig,
    pub auth_manager: Arc<AuthManager>,
    pub task_store: Arc<TaskStore>,
    pub capability_registry: Arc<CapabilityRegistry>,
    pub function_registry: Arc<FunctionRegistry>,
    pub push_notifier: Arc<PushNotifier>,
    pub push_configs: Arc<PushConfigStore>,
    pub state_store: Option<Arc<StateStore>>,
    pub executor: Arc<Executor>,
    pub mcp_clients: HashMap<String, Arc<AsyncMutex<MCPClient>>>,
}

impl AppContext {
    pub async fn build(config: AppConfig) -> Result<Self, AgentError> {
        let auth_manager = Arc::new(AuthManager::from_config(&config.security)?);
        let hierarchy = Arc::new(auth_manager.hierarchy.clone());

        let routable: HashSet<String> = config.plugins.iter().cloned().collect();
        let mut capability_registry = CapabilityRegistry::new(Arc::clone(&hierarchy), routable);

        capability_registry.register(Arc::new(StatusPlugin::new(config.agent.name.clone())));
        let capability_ids = Arc::new(parking_lot::RwLock::new(Vec::new()));
        capability_registry.register(Arc::new(CapabilitiesPlugin::new(Arc::clone(&capability_ids))));
        *capability_ids.write() = capability_registry.list_all().iter().map(|info| info.id.clone()).collect();

        if !config.middleware.is_empty() {
            capability_registry.apply_global_middleware(&config.middleware);
        }

        let state_store = if config.state_management.enabled {
            let backend: Box<dyn StateBackend> = match config.state_management.backend.as_str() {
                "file" => {
                    let root = config
                        .state_management
                        .file_path
                        .clone()
                        .unwrap_or_else(|| "./state".to_string());
                    Box::new(FileBackend::new(root))
                }
                _ => Box::new(MemoryBackend::new()),
            };
            let store = Arc::new(StateStore::new(
                backend,
                config.state_management.max_history_size,
                config.state_management.auto_summarize,
            ));
            capability_registry.apply_global_state(Arc::clone(&store));
            Some(store)
        } else {
            None
        };

        let capability_registry = Arc::new(capability_registry);

        let task_store = Arc::new(TaskStore::new());

        let mut function_registry = FunctionRegistry::new();
        register_capability_functions(&mut function_registry, &capability_registry, &task_store);

        let mut mcp_clients: HashMap<String, Arc<AsyncMutex<MCPClient>>> = HashMap::new();
        for server in &config.mcp.servers {
            let client = Arc::new(AsyncMutex::new(build_mcp_client(server)));
            match register_mcp_server_tools(
                &mut function_registry,
                server.name(),
                Arc::clone(&client),
                &config.mcp.tool_scopes,
                &hierarchy,
            )
            .await
            {
                Ok(()) => {
                    mcp_clients.insert(server.name().to_string(), client);
                }
                Err(e) => {
                    tracing::warn!("failed to connect to mcp server '{}': {e}", server.name());
                }
            }
        }

        let function_registry = Arc::new(function_registry);

        let dispatcher = match &config.ai_provider {
            Some(provider_config) => {
                let provider = Arc::new(OpenAiChatProvider::new(
                    provider_config.model.clone(),
                    provider_config.api_key.clone(),
                    provider_config.base_url.clone(),
                ));
                Some(Arc::new(Dispatcher::new(provider, provider_config.max_iterations)))
            }
            None => None,
        };

        let router = Arc::new(Router::new(&config.routing, dispatcher.is_some()));

        let push_notifier = Arc::new(PushNotifier::new(
            config.push_notifications.signing_secret.clone(),
            config.push_notifications.max_retries,
        ));
        let push_configs = Arc::new(PushConfigStore::new());

        let system_prompt = config.ai_provider.as_ref().and_then(|p| p.system_prompt.clone());

        let executor = Arc::new(Executor::new(
            Arc::clone(&task_store),
            Arc::clone(&capability_registry),
            router,
            dispatcher,
            Arc::clone(&function_registry),
            Arc::clone(&push_notifier),
            Arc::clone(&push_configs),
            config.agent.name.clone(),
            state_store.clone(),
            system_prompt,
        ));

        Ok(Self {
            config,
            auth_manager,
            task_store,
            capability_registry,
            function_registry,
            push_notifier,
            push_configs,
            state_store,
            executor,
            mcp_clients,
        })
    }
}

fn build_mcp_client(server: &McpServerConfig) -> MCPClient {
    match server {
        McpServerConfig::Stdio { command, args, env, .. } => {
            let transport = StdioTransport::new(command, Some(args.clone()), Some(env.clone()));
            MCPClient::new(Box::new(transport))
        }
        McpServerConfig::Http { url, headers, .. } => {
            let transport = HTTPTransport::new(url, Some(headers.clone()), None);
            MCPClient::new(Box::new(transport))
        }
    }
}
