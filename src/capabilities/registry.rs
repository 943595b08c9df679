//! Plugin registry and the handler adapter chain.
//!
//! Discovery and registration are separate from routing: every registered
//! plugin is visible for introspection and MCP tool exposure, but only
//! capability ids named in the configuration's `plugins` list are
//! *routable* — the configured-subset rule. Each handler is wrapped once,
//! at registration, in the fixed chain auth-context-injector -> middleware
//! chain -> state-management wrapper -> `plugin.execute_capability`.
//! `apply_global_middleware`/`apply_global_state` offer an idempotent
//! retroactive re-apply (a plugin registered before the middleware/state
//! config was loaded still gets wrapped once that happens), gated by a
//! per-handler sentinel so a second call is a no-op.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::a2a::task::Task;
use crate::auth::{AuthContext, ScopeHierarchy};
use crate::config::MiddlewareConfig;
use crate::error::AgentError;
use crate::state::{ConversationMessage, ConversationRole, StateStore};

use super::capability::CapabilityInfo;

/// Everything a plugin's `execute_capability` needs to do its work.
pub struct HandlerContext {
    pub task: Task,
    pub auth: Option<AuthContext>,
    pub context_id: String,
    pub input_text: String,
}

/// A capability plugin. `register_capability` is called once, at
/// registration; the rest are invoked per request.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn register_capability(&self) -> CapabilityInfo;

    /// Whether this plugin can service `task`, for AI-mode capability
    /// selection and for introspection. Direct/keyword routing doesn't
    /// consult this — it matches on the router's own keyword/pattern
    /// config — but AI-mode dispatch does.
    async fn can_handle_task(&self, task: &Task) -> bool {
        let _ = task;
        true
    }

    async fn execute_capability(&self, ctx: &HandlerContext) -> Result<Value, AgentError>;

    fn validate_config(&self, _config: &Value) -> Result<(), AgentError> {
        Ok(())
    }

    /// Function-calling schemas this plugin exposes to the AI dispatcher,
    /// in the shape an `LlmProvider` expects for tool declarations.
    fn get_ai_functions(&self) -> Vec<Value> {
        Vec::new()
    }

    fn get_state_schema(&self) -> Option<Value> {
        None
    }

    async fn get_health_status(&self) -> Value {
        serde_json::json!({ "status": "ok" })
    }
}

/// The wrapped, callable form of a registered plugin.
#[async_trait]
pub trait CapabilityHandler: Send + Sync {
    async fn handle(&self, ctx: &HandlerContext) -> Result<Value, AgentError>;
}

/// A middleware hook. `before` can short-circuit the chain by returning an
/// error; `after` may transform the output (e.g. redaction, logging).
#[async_trait]
pub trait Middleware: Send + Sync {
    fn name(&self) -> &str;

    async fn before(&self, _ctx: &HandlerContext) -> Result<(), AgentError> {
        Ok(())
    }

    async fn after(&self, _ctx: &HandlerContext, output: Value) -> Result<Value, AgentError> {
        Ok(output)
    }
}

/// Logs before/after every invocation; always present at the head of the
/// middleware chain, independent of configured middleware.
struct LoggingMiddleware;

#[async_trait]
impl Middleware for LoggingMiddleware {
    fn name(&self) -> &str {
        "logging"
    }

    async fn before(&self, ctx: &HandlerContext) -> Result<(), AgentError> {
        tracing::debug!(context_id = %ctx.context_id, "capability invocation started");
        Ok(())
    }

    async fn after(&self, ctx: &HandlerContext, output: Value) -> Result<Value, AgentError> {
        tracing::debug!(context_id = %ctx.context_id, "capability invocation completed");
        Ok(output)
    }
}

struct ExecuteHandler {
    plugin: Arc<dyn Plugin>,
}

#[async_trait]
impl CapabilityHandler for ExecuteHandler {
    async fn handle(&self, ctx: &HandlerContext) -> Result<Value, AgentError> {
        self.plugin.execute_capability(ctx).await
    }
}

struct StateWrapper {
    inner: Arc<dyn CapabilityHandler>,
    state: Arc<StateStore>,
}

#[async_trait]
impl CapabilityHandler for StateWrapper {
    async fn handle(&self, ctx: &HandlerContext) -> Result<Value, AgentError> {
        self.state
            .add_to_history(
                &ctx.context_id,
                ConversationMessage::new(ConversationRole::User, ctx.input_text.clone()),
            )
            .await?;
        let output = self.inner.handle(ctx).await?;
        let summary = match &output {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        self.state
            .add_to_history(&ctx.context_id, ConversationMessage::new(ConversationRole::Assistant, summary))
            .await?;
        Ok(output)
    }
}

struct MiddlewareChain {
    inner: Arc<dyn CapabilityHandler>,
    chain: Vec<Arc<dyn Middleware>>,
}

#[async_trait]
impl CapabilityHandler for MiddlewareChain {
    async fn handle(&self, ctx: &HandlerContext) -> Result<Value, AgentError> {
        for mw in &self.chain {
            mw.before(ctx).await?;
        }
        let mut output = self.inner.handle(ctx).await?;
        for mw in self.chain.iter().rev() {
            output = mw.after(ctx, output).await?;
        }
        Ok(output)
    }
}

struct AuthInjector {
    inner: Arc<dyn CapabilityHandler>,
    required_scopes: Vec<String>,
    hierarchy: Arc<ScopeHierarchy>,
}

#[async_trait]
impl CapabilityHandler for AuthInjector {
    async fn handle(&self, ctx: &HandlerContext) -> Result<Value, AgentError> {
        if !self.required_scopes.is_empty() {
            match &ctx.auth {
                Some(auth_ctx) => {
                    let missing = auth_ctx.missing_scopes(&self.required_scopes, &self.hierarchy);
                    if !missing.is_empty() {
                        return Err(AgentError::Authorization {
                            subject: auth_ctx.subject.clone(),
                            missing,
                        });
                    }
                }
                None => {
                    return Err(AgentError::Authorization {
                        subject: "anonymous".to_string(),
                        missing: self.required_scopes.clone(),
                    });
                }
            }
        }
        self.inner.handle(ctx).await
    }
}

struct RegisteredCapability {
    info: CapabilityInfo,
    plugin: Arc<dyn Plugin>,
    handler: Arc<dyn CapabilityHandler>,
    middleware_applied: bool,
    state_applied: bool,
}

/// Holds every registered plugin, its wrapped handler, and the routable
/// subset named in config.
pub struct CapabilityRegistry {
    entries: HashMap<String, RegisteredCapability>,
    order: Vec<String>,
    routable: HashSet<String>,
    hierarchy: Arc<ScopeHierarchy>,
    middleware: Vec<Arc<dyn Middleware>>,
    state: Option<Arc<StateStore>>,
}

impl CapabilityRegistry {
    pub fn new(hierarchy: Arc<ScopeHierarchy>, routable: HashSet<String>) -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
            routable,
            hierarchy,
            middleware: Vec::new(),
            state: None,
        }
    }

    /// Registers a plugin and builds its wrapped handler. A second
    /// registration under the same id is ignored: duplicate id = first
    /// wins.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        let info = plugin.register_capability();
        if self.entries.contains_key(&info.id) {
            return;
        }
        let id = info.id.clone();
        let handler = self.build_chain(Arc::clone(&plugin), &info);
        self.entries.insert(
            id.clone(),
            RegisteredCapability {
                info,
                plugin,
                handler,
                middleware_applied: !self.middleware.is_empty(),
                state_applied: self.state.is_some(),
            },
        );
        self.order.push(id);
    }

    fn build_chain(&self, plugin: Arc<dyn Plugin>, info: &CapabilityInfo) -> Arc<dyn CapabilityHandler> {
        let execute: Arc<dyn CapabilityHandler> = Arc::new(ExecuteHandler { plugin });

        let with_state: Arc<dyn CapabilityHandler> = match &self.state {
            Some(state) => Arc::new(StateWrapper {
                inner: execute,
                state: Arc::clone(state),
            }),
            None => execute,
        };

        let mut chain: Vec<Arc<dyn Middleware>> = vec![Arc::new(LoggingMiddleware)];
        chain.extend(self.middleware.iter().cloned());
        let with_middleware: Arc<dyn CapabilityHandler> = Arc::new(MiddlewareChain {
            inner: with_state,
            chain,
        });

        Arc::new(AuthInjector {
            inner: with_middleware,
            required_scopes: info.required_scopes.clone(),
            hierarchy: Arc::clone(&self.hierarchy),
        })
    }

    /// Installs the configured middleware set and retroactively rewraps
    /// every handler not already wrapped with it. Idempotent: a handler
    /// whose `middleware_applied` sentinel is already set is skipped.
    pub fn apply_global_middleware(&mut self, configs: &[MiddlewareConfig]) {
        self.middleware = configs
            .iter()
            .map(|c| Arc::new(NamedMiddleware { name: c.name.clone() }) as Arc<dyn Middleware>)
            .collect();
        let ids: Vec<String> = self.order.clone();
        for id in ids {
            let already_applied = self.entries.get(&id).map(|e| e.middleware_applied).unwrap_or(true);
            if already_applied {
                continue;
            }
            let (plugin, info) = {
                let entry = self.entries.get(&id).expect("just checked");
                (Arc::clone(&entry.plugin), entry.info.clone())
            };
            let handler = self.build_chain(plugin, &info);
            if let Some(entry) = self.entries.get_mut(&id) {
                entry.handler = handler;
                entry.middleware_applied = true;
            }
        }
    }

    /// Installs the configured state store and retroactively rewraps
    /// every handler not already wrapped with it.
    pub fn apply_global_state(&mut self, state: Arc<StateStore>) {
        self.state = Some(state);
        let ids: Vec<String> = self.order.clone();
        for id in ids {
            let already_applied = self.entries.get(&id).map(|e| e.state_applied).unwrap_or(true);
            if already_applied {
                continue;
            }
            let (plugin, info) = {
                let entry = self.entries.get(&id).expect("just checked");
                (Arc::clone(&entry.plugin), entry.info.clone())
            };
            let handler = self.build_chain(plugin, &info);
            if let Some(entry) = self.entries.get_mut(&id) {
                entry.handler = handler;
                entry.state_applied = true;
            }
        }
    }

    pub fn get_handler(&self, id: &str) -> Option<Arc<dyn CapabilityHandler>> {
        self.entries.get(id).map(|e| Arc::clone(&e.handler))
    }

    pub fn get_info(&self, id: &str) -> Option<&CapabilityInfo> {
        self.entries.get(id).map(|e| &e.info)
    }

    /// Every registered capability, in registration order — used for
    /// introspection and MCP tool exposure.
    pub fn list_all(&self) -> Vec<&CapabilityInfo> {
        self.order.iter().filter_map(|id| self.entries.get(id)).map(|e| &e.info).collect()
    }

    /// Only the subset named in the configuration's `plugins` list — the
    /// configured-subset routing rule: everything else stays visible for
    /// introspection but the router will never dispatch to it.
    pub fn list_routable(&self) -> Vec<&CapabilityInfo> {
        self.order
            .iter()
            .filter(|id| self.routable.contains(*id))
            .filter_map(|id| self.entries.get(id))
            .map(|e| &e.info)
            .collect()
    }

    pub fn is_routable(&self, id: &str) -> bool {
        self.routable.contains(id)
    }

    pub fn all_ai_functions(&self) -> Vec<Value> {
        self.order
            .iter()
            .filter(|id| self.routable.contains(*id))
            .filter_map(|id| self.entries.get(id))
            .flat_map(|e| e.plugin.get_ai_functions())
            .collect()
    }

    /// The AI function schemas a single capability exposes, regardless of
    /// routability — used when wiring a specific capability's functions
    /// into a `FunctionRegistry`, where the caller already filtered for
    /// routability via `list_routable`.
    pub fn ai_functions_for(&self, id: &str) -> Vec<Value> {
        self.entries
            .get(id)
            .map(|e| e.plugin.get_ai_functions())
            .unwrap_or_default()
    }
}

struct NamedMiddleware {
    name: String,
}

#[async_trait]
impl Middleware for NamedMiddleware {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Built-in `status` capability: `"{agent name} is operational..."`.
pub struct StatusPlugin {
    agent_name: String,
}

impl StatusPlugin {
    pub fn new(agent_name: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
        }
    }
}

#[async_trait]
impl Plugin for StatusPlugin {
    fn register_capability(&self) -> CapabilityInfo {
        use super::capability::{CapabilityTrait, ContentMode};
        CapabilityInfo {
            id: "status".into(),
            name: "Status".into(),
            version: "1.0.0".into(),
            capabilities: HashSet::from([CapabilityTrait::Text]),
            input_mode: ContentMode::Text,
            output_mode: ContentMode::Text,
            required_scopes: Vec::new(),
            priority: 10,
            config_schema: None,
            plugin_name: "status".into(),
            system_prompt: None,
        }
    }

    async fn execute_capability(&self, _ctx: &HandlerContext) -> Result<Value, AgentError> {
        Ok(Value::String(format!(
            "{} is operational and ready to handle requests.",
            self.agent_name
        )))
    }
}

/// Built-in `capabilities` handler: lists every registered capability id.
pub struct CapabilitiesPlugin {
    ids: Arc<parking_lot::RwLock<Vec<String>>>,
}

impl CapabilitiesPlugin {
    pub fn new(ids: Arc<parking_lot::RwLock<Vec<String>>>) -> Self {
        Self { ids }
    }
}

#[async_trait]
impl Plugin for CapabilitiesPlugin {
    fn register_capability(&self) -> CapabilityInfo {
        use super::capability::{CapabilityTrait, ContentMode};
        CapabilityInfo {
            id: "capabilities".into(),
            name: "Capabilities".into(),
            version: "1.0.0".into(),
            capabilities: HashSet::from([CapabilityTrait::Text]),
            input_mode: ContentMode::Text,
            output_mode: ContentMode::Data,
            required_scopes: Vec::new(),
            priority: 10,
            config_schema: None,
            plugin_name: "capabilities".into(),
            system_prompt: None,
        }
    }

    async fn execute_capability(&self, _ctx: &HandlerContext) -> Result<Value, AgentError> {
        let ids = self.ids.read().clone();
        Ok(serde_json::json!({ "capabilities": ids }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::a2a::task::{Role, TaskStore};

    struct EchoPlugin;

    #[async_trait]
    impl Plugin for EchoPlugin {
        fn register_capability(&self) -> CapabilityInfo {
            use super::super::capability::{CapabilityTrait, ContentMode};
            CapabilityInfo {
                id: "echo".into(),
                name: "Echo".into(),
                version: "1.0.0".into(),
                capabilities: HashSet::from([CapabilityTrait::Text]),
                input_mode: ContentMode::Text,
                output_mode: ContentMode::Text,
                required_scopes: vec!["echo:use".into()],
                priority: 50,
                config_schema: None,
                plugin_name: "echo".into(),
                system_prompt: None,
            }
        }

        async fn execute_capability(&self, ctx: &HandlerContext) -> Result<Value, AgentError> {
            Ok(Value::String(ctx.input_text.clone()))
        }
    }

    fn make_ctx(auth: Option<AuthContext>) -> HandlerContext {
        let store = TaskStore::new();
        let task = store.create(None);
        HandlerContext {
            task,
            auth,
            context_id: "ctx-1".into(),
            input_text: "hello".into(),
        }
    }

    #[tokio::test]
    async fn registered_handler_without_scope_is_rejected() {
        let mut registry = CapabilityRegistry::new(
            Arc::new(ScopeHierarchy::new(Default::default())),
            HashSet::from(["echo".to_string()]),
        );
        registry.register(Arc::new(EchoPlugin));
        let handler = registry.get_handler("echo").unwrap();
        let result = handler.handle(&make_ctx(None)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn registered_handler_with_scope_executes() {
        let mut registry = CapabilityRegistry::new(
            Arc::new(ScopeHierarchy::new(Default::default())),
            HashSet::from(["echo".to_string()]),
        );
        registry.register(Arc::new(EchoPlugin));
        let handler = registry.get_handler("echo").unwrap();
        let auth = AuthContext {
            subject: "alice".into(),
            auth_type: crate::auth::AuthType::Bearer,
            scopes: vec!["echo:use".into()],
        };
        let result = handler.handle(&make_ctx(Some(auth))).await.unwrap();
        assert_eq!(result, Value::String("hello".into()));
    }

    #[test]
    fn duplicate_registration_keeps_first() {
        let mut registry = CapabilityRegistry::new(
            Arc::new(ScopeHierarchy::new(Default::default())),
            HashSet::new(),
        );
        registry.register(Arc::new(EchoPlugin));
        registry.register(Arc::new(EchoPlugin));
        assert_eq!(registry.list_all().len(), 1);
    }

    #[test]
    fn configured_subset_rule_hides_unlisted_capabilities_from_routing() {
        let mut registry = CapabilityRegistry::new(Arc::new(ScopeHierarchy::new(Default::default())), HashSet::new());
        registry.register(Arc::new(EchoPlugin));
        assert_eq!(registry.list_all().len(), 1);
        assert_eq!(registry.list_routable().len(), 0);
        assert!(!registry.is_routable("echo"));
    }

    #[tokio::test]
    async fn apply_global_middleware_is_idempotent() {
        let mut registry = CapabilityRegistry::new(Arc::new(ScopeHierarchy::new(Default::default())), HashSet::new());
        registry.register(Arc::new(EchoPlugin));
        registry.apply_global_middleware(&[MiddlewareConfig {
            name: "trace".into(),
            config: Value::Null,
        }]);
        assert!(registry.entries.get("echo").unwrap().middleware_applied);
        // second call must not panic or double-wrap
        registry.apply_global_middleware(&[MiddlewareConfig {
            name: "trace".into(),
            config: Value::Null,
        }]);
        assert!(registry.entries.get("echo").unwrap().middleware_applied);
    }
}
