//! Task lifecycle orchestration: routes a task to a capability or the AI
//! dispatcher, runs it, shapes the result into artifacts, and drives the
//! task through its status transitions.

use std::sync::Arc;

use serde_json::Value;

use crate::a2a::task::{Artifact, ArtifactUpdate, Part, Task, TaskEvent, TaskEventQueue, TaskStatus, TaskStore};
use crate::auth::AuthContext;
use crate::capabilities::{CapabilityRegistry, HandlerContext};
use crate::error::AgentError;
use crate::push::{PushConfigStore, PushNotifier};
use crate::state::{ConversationRole, StateStore};

use super::dispatcher::Dispatcher;
use super::function_registry::FunctionRegistry;
use super::router::{RouteDecision, Router};

/// Shapes a capability's raw output into the ordered parts an artifact
/// carries, per the result-shaping contract: a bare string becomes a
/// single text part; a map's `summary` key (if present) becomes a
/// leading text part, and the whole map is always additionally attached
/// as a data part; a list becomes a single data part wrapping
/// `{"items": [...]}`; anything else is stringified into a text part.
pub fn shape_result(output: &Value) -> Vec<Part> {
    match output {
        Value::String(text) => vec![Part::text(text.clone())],
        Value::Object(map) => {
            let mut parts = Vec::new();
            if let Some(Value::String(summary)) = map.get("summary") {
                parts.push(Part::text(summary.clone()));
            }
            parts.push(Part::data("application/json", Value::Object(map.clone())));
            parts
        }
        Value::Array(items) => {
            vec![Part::data(
                "application/json",
                serde_json::json!({ "items": items }),
            )]
        }
        other => vec![Part::text(other.to_string())],
    }
}

fn conversation_role_str(role: ConversationRole) -> &'static str {
    match role {
        ConversationRole::User => "user",
        ConversationRole::Assistant => "assistant",
        ConversationRole::System => "system",
        ConversationRole::Function => "function",
        ConversationRole::Tool => "tool",
    }
}

pub struct Executor {
    task_store: Arc<TaskStore>,
    registry: Arc<CapabilityRegistry>,
    router: Arc<Router>,
    dispatcher: Option<Arc<Dispatcher>>,
    functions: Arc<FunctionRegistry>,
    push_notifier: Arc<PushNotifier>,
    push_configs: Arc<PushConfigStore>,
    agent_name: String,
    state_store: Option<Arc<StateStore>>,
    system_prompt: Option<String>,
}

impl Executor {
    pub fn new(
        task_store: Arc<TaskStore>,
        registry: Arc<CapabilityRegistry>,
        router: Arc<Router>,
        dispatcher: Option<Arc<Dispatcher>>,
        functions: Arc<FunctionRegistry>,
        push_notifier: Arc<PushNotifier>,
        push_configs: Arc<PushConfigStore>,
        agent_name: String,
        state_store: Option<Arc<StateStore>>,
        system_prompt: Option<String>,
    ) -> Self {
        Self {
            task_store,
            registry,
            router,
            dispatcher,
            functions,
            push_notifier,
            push_configs,
            agent_name,
            state_store,
            system_prompt,
        }
    }

    /// Runs a task to completion: `submitted -> working -> terminal`. The
    /// caller is expected to have already appended the triggering user
    /// message to the task's history.
    pub async fn execute(&self, task_id: &str, auth: Option<AuthContext>) -> Result<Task, AgentError> {
        self.task_store.transition(task_id, TaskStatus::Working)?;
        self.notify(task_id, "working").await;

        let outcome = self.run_once(task_id, auth.as_ref()).await;

        match outcome {
            Ok(output) => {
                let parts = shape_result(&output);
                self.task_store.apply_artifact_update(
                    task_id,
                    ArtifactUpdate {
                        artifact: Artifact {
                            name: format!("{}-result", self.agent_name),
                            description: None,
                            parts,
                        },
                        append: false,
                        last_chunk: true,
                    },
                )?;
                self.task_store.transition(task_id, TaskStatus::Completed)?;
                self.notify(task_id, "completed").await;
            }
            Err(err) => {
                let status = if err.is_rejection() {
                    TaskStatus::Rejected
                } else if matches!(err, AgentError::Cancellation(_)) {
                    TaskStatus::Canceled
                } else {
                    TaskStatus::Failed
                };
                self.task_store.transition(task_id, status)?;
                self.notify(task_id, "failed").await;
            }
        }

        self.task_store
            .get(task_id)
            .ok_or_else(|| AgentError::Routing(format!("task not found: {task_id}")))
    }

    /// Streams the result as a sequence of artifact-update events on
    /// `queue`, using the unified `"<agent>-stream-<n>"` naming for every
    /// chunk regardless of whether it carries text or structured data.
    pub async fn execute_streaming(
        &self,
        task_id: &str,
        queue: &TaskEventQueue,
        auth: Option<AuthContext>,
    ) -> Result<(), AgentError> {
        self.task_store.transition(task_id, TaskStatus::Working)?;
        queue.push(TaskEvent::Status {
            status: TaskStatus::Working,
            message: None,
        })?;

        let outcome = self.run_once(task_id, auth.as_ref()).await;

        match outcome {
            Ok(output) => {
                let parts = shape_result(&output);
                for (i, part) in parts.into_iter().enumerate() {
                    let update = ArtifactUpdate {
                        artifact: Artifact {
                            name: format!("{}-stream-{}", self.agent_name, i),
                            description: None,
                            parts: vec![part],
                        },
                        append: false,
                        last_chunk: true,
                    };
                    self.task_store.apply_artifact_update(task_id, update.clone())?;
                    queue.push(TaskEvent::ArtifactUpdate(update))?;
                }
                self.task_store.transition(task_id, TaskStatus::Completed)?;
                queue.push(TaskEvent::Status {
                    status: TaskStatus::Completed,
                    message: None,
                })?;
            }
            Err(err) => {
                let status = if err.is_rejection() {
                    TaskStatus::Rejected
                } else if matches!(err, AgentError::Cancellation(_)) {
                    TaskStatus::Canceled
                } else {
                    TaskStatus::Failed
                };
                self.task_store.transition(task_id, status)?;
                queue.push(TaskEvent::Status {
                    status,
                    message: Some(err.to_string()),
                })?;
            }
        }

        self.notify(task_id, "stream-complete").await;
        Ok(())
    }

    async fn run_once(&self, task_id: &str, auth: Option<&AuthContext>) -> Result<Value, AgentError> {
        let task = self
            .task_store
            .get(task_id)
            .ok_or_else(|| AgentError::Routing(format!("task not found: {task_id}")))?;
        let text = task.latest_user_text().unwrap_or_default().to_string();

        match self.router.route(&text) {
            RouteDecision::Capability(id) | RouteDecision::Fallback(id) => {
                self.run_capability(&task, &id, &text, auth).await
            }
            RouteDecision::Ai => match &self.dispatcher {
                Some(dispatcher) => {
                    let messages = self.build_dispatch_messages(&task, &text).await;
                    let answer = dispatcher.dispatch(&self.functions, messages, auth).await?;
                    Ok(Value::String(answer))
                }
                None => Err(AgentError::Routing("AI mode configured but no dispatcher is available".into())),
            },
            RouteDecision::None => Err(AgentError::Routing(
                "no capability matched and no fallback is configured".into(),
            )),
        }
    }

    /// Builds the dispatcher message list per the function-calling loop's
    /// step 1: a leading `system` message combining the configured AI
    /// provider system prompt with every routable capability's own
    /// `system_prompt`, the context's prior conversation history, and
    /// finally the latest user message.
    async fn build_dispatch_messages(&self, task: &Task, text: &str) -> Vec<Value> {
        let mut messages = Vec::new();

        let mut system_sections: Vec<String> = Vec::new();
        if let Some(prompt) = &self.system_prompt {
            if !prompt.trim().is_empty() {
                system_sections.push(prompt.clone());
            }
        }
        for info in self.registry.list_routable() {
            if let Some(prompt) = &info.system_prompt {
                if !prompt.trim().is_empty() {
                    system_sections.push(prompt.clone());
                }
            }
        }
        if !system_sections.is_empty() {
            messages.push(serde_json::json!({
                "role": "system",
                "content": system_sections.join("\n\n"),
            }));
        }

        if let Some(store) = &self.state_store {
            if let Ok(history) = store.get_history(&task.context_id).await {
                for message in history {
                    messages.push(serde_json::json!({
                        "role": conversation_role_str(message.role),
                        "content": message.content,
                    }));
                }
            }
        }

        messages.push(serde_json::json!({ "role": "user", "content": text }));
        messages
    }

    async fn run_capability(
        &self,
        task: &Task,
        capability_id: &str,
        text: &str,
        auth: Option<&AuthContext>,
    ) -> Result<Value, AgentError> {
        if !self.registry.is_routable(capability_id) {
            return Err(AgentError::Routing(format!(
                "capability '{capability_id}' is not in the routable set"
            )));
        }
        let handler = self
            .registry
            .get_handler(capability_id)
            .ok_or_else(|| AgentError::Routing(format!("no such capability: {capability_id}")))?;

        let ctx = HandlerContext {
            task: task.clone(),
            auth: auth.cloned(),
            context_id: task.context_id.clone(),
            input_text: text.to_string(),
        };
        handler.handle(&ctx).await
    }

    async fn notify(&self, task_id: &str, event: &str) {
        let payload = serde_json::json!({ "taskId": task_id, "event": event });
        self.push_notifier.notify(&self.push_configs, task_id, &payload).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use crate::auth::ScopeHierarchy;
    use crate::config::RoutingSection;
    use crate::state::{ConversationMessage, MemoryBackend};

    fn executor(system_prompt: Option<String>, state_store: Option<Arc<StateStore>>) -> Executor {
        let registry = Arc::new(CapabilityRegistry::new(
            Arc::new(ScopeHierarchy::new(Default::default())),
            HashSet::new(),
        ));
        Executor::new(
            Arc::new(TaskStore::new()),
            registry,
            Arc::new(Router::new(&RoutingSection::default(), false)),
            None,
            Arc::new(FunctionRegistry::new()),
            Arc::new(PushNotifier::new(None, 3)),
            Arc::new(PushConfigStore::new()),
            "agent".to_string(),
            state_store,
            system_prompt,
        )
    }

    #[tokio::test]
    async fn build_dispatch_messages_includes_system_prompt_and_history() {
        let backend = Box::new(MemoryBackend::new());
        let state_store = Arc::new(StateStore::new(backend, 100, false));
        state_store
            .add_to_history("ctx-1", ConversationMessage::new(ConversationRole::User, "earlier question".into()))
            .await
            .unwrap();
        state_store
            .add_to_history(
                "ctx-1",
                ConversationMessage::new(ConversationRole::Assistant, "earlier answer".into()),
            )
            .await
            .unwrap();

        let exec = executor(Some("be concise".into()), Some(Arc::clone(&state_store)));
        let task_store = TaskStore::new();
        let task = task_store.create(Some("ctx-1".to_string()));

        let messages = exec.build_dispatch_messages(&task, "latest question").await;

        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], "be concise");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[1]["content"], "earlier question");
        assert_eq!(messages[2]["role"], "assistant");
        assert_eq!(messages[2]["content"], "earlier answer");
        let last = messages.last().unwrap();
        assert_eq!(last["role"], "user");
        assert_eq!(last["content"], "latest question");
    }

    #[tokio::test]
    async fn build_dispatch_messages_without_system_prompt_or_state_omits_system_message() {
        let exec = executor(None, None);
        let task_store = TaskStore::new();
        let task = task_store.create(Some("ctx-2".to_string()));

        let messages = exec.build_dispatch_messages(&task, "hello").await;

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"], "hello");
    }

    #[test]
    fn shape_result_on_string_is_single_text_part() {
        let parts = shape_result(&Value::String("hi".into()));
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].as_text(), Some("hi"));
    }

    #[test]
    fn shape_result_on_map_always_attaches_data_part() {
        let parts = shape_result(&serde_json::json!({"foo": "bar"}));
        assert_eq!(parts.len(), 1);
        assert!(matches!(parts[0], Part::Data { .. }));
    }

    #[test]
    fn shape_result_on_map_with_summary_prepends_text() {
        let parts = shape_result(&serde_json::json!({"summary": "done", "detail": 1}));
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].as_text(), Some("done"));
        assert!(matches!(parts[1], Part::Data { .. }));
    }

    #[test]
    fn shape_result_on_list_wraps_in_items_data_part() {
        let parts = shape_result(&serde_json::json!([1, 2, 3]));
        assert_eq!(parts.len(), 1);
        match &parts[0] {
            Part::Data { data, .. } => assert_eq!(data, &serde_json::json!({"items": [1, 2, 3]})),
            _ => panic!("expected data part"),
        }
    }

    #[test]
    fn shape_result_on_other_stringifies() {
        let parts = shape_result(&Value::Bool(true));
        assert_eq!(parts[0].as_text(), Some("true"));
    }
}
