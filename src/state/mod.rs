//! Conversation state and per-context variable storage.
//!
//! A `ConversationState` is keyed by `context_id` and holds both a bounded
//! message history and a typed variable bag with optional TTLs. Storage is
//! pluggable behind `StateBackend`; only an in-memory and a flat-file
//! backend are wired by default.

mod backend;

pub use backend::{FileBackend, MemoryBackend, StateBackend};

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AgentError;

/// The declared type of a stored variable, carried alongside the value so
/// callers can round-trip without guessing from the JSON shape alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateVariableType {
    String,
    Integer,
    Float,
    Boolean,
    List,
    Dict,
    Json,
    Binary,
}

impl StateVariableType {
    fn infer(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(_) => StateVariableType::String,
            serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => StateVariableType::Integer,
            serde_json::Value::Number(_) => StateVariableType::Float,
            serde_json::Value::Bool(_) => StateVariableType::Boolean,
            serde_json::Value::Array(_) => StateVariableType::List,
            serde_json::Value::Object(_) => StateVariableType::Dict,
            serde_json::Value::Null => StateVariableType::Json,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateVariable {
    pub key: String,
    pub value: serde_json::Value,
    pub type_name: StateVariableType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ttl: Option<i64>,
    pub version: u64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl StateVariable {
    fn new(key: String, value: serde_json::Value, ttl: Option<i64>) -> Self {
        let now = Utc::now();
        Self {
            type_name: StateVariableType::infer(&value),
            key,
            value,
            created_at: now,
            updated_at: now,
            ttl,
            version: 1,
            description: None,
            tags: Vec::new(),
        }
    }

    fn touch(&mut self, value: serde_json::Value) {
        self.type_name = StateVariableType::infer(&value);
        self.value = value;
        self.updated_at = Utc::now();
        self.version += 1;
    }

    pub fn is_expired(&self) -> bool {
        match self.ttl {
            Some(seconds) => Utc::now() > self.updated_at + Duration::seconds(seconds),
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationRole {
    User,
    Assistant,
    System,
    Function,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: String,
    pub role: ConversationRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub function_name: Option<String>,
}

impl ConversationMessage {
    pub fn new(role: ConversationRole, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            timestamp: Utc::now(),
            metadata: Default::default(),
            function_name: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub archived_count: usize,
    pub summary_text: String,
}

/// Everything tracked for one `context_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    pub context_id: String,
    pub variables: HashMap<String, StateVariable>,
    pub history: Vec<ConversationMessage>,
    pub max_history_size: usize,
    pub auto_summarize: bool,
    pub summary: Option<ConversationSummary>,
    pub archived_messages: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationState {
    fn new(context_id: String, max_history_size: usize, auto_summarize: bool) -> Self {
        let now = Utc::now();
        Self {
            context_id,
            variables: HashMap::new(),
            history: Vec::new(),
            max_history_size,
            auto_summarize,
            summary: None,
            archived_messages: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn add_message(&mut self, message: ConversationMessage) {
        self.history.push(message);
        self.updated_at = Utc::now();
        if self.history.len() > self.max_history_size {
            if self.auto_summarize {
                self.archive_old_messages();
            } else {
                self.history.remove(0);
                self.archived_messages += 1;
            }
        }
    }

    /// Keeps the most recent half of `max_history_size`, archiving the
    /// rest into a running summary rather than discarding them outright.
    fn archive_old_messages(&mut self) {
        let keep = (self.max_history_size / 2).max(1);
        if self.history.len() <= keep {
            return;
        }
        let archived: Vec<ConversationMessage> = self.history.drain(0..self.history.len() - keep).collect();
        let summary = self.summary.get_or_insert_with(ConversationSummary::default);
        summary.archived_count += archived.len();
        summary.summary_text = format!(
            "{} earlier message(s) archived from this conversation",
            summary.archived_count
        );
        self.archived_messages += archived.len();
    }

    fn set_variable(&mut self, key: String, value: serde_json::Value, ttl: Option<i64>) {
        self.updated_at = Utc::now();
        match self.variables.get_mut(&key) {
            Some(existing) => existing.touch(value),
            None => {
                self.variables.insert(key.clone(), StateVariable::new(key, value, ttl));
            }
        }
    }

    fn get_variable(&self, key: &str) -> Option<&serde_json::Value> {
        self.variables
            .get(key)
            .filter(|v| !v.is_expired())
            .map(|v| &v.value)
    }

    fn delete_variable(&mut self, key: &str) -> bool {
        self.updated_at = Utc::now();
        self.variables.remove(key).is_some()
    }

    fn cleanup_expired_variables(&mut self) -> usize {
        let before = self.variables.len();
        self.variables.retain(|_, v| !v.is_expired());
        before - self.variables.len()
    }
}

/// Facade over a `StateBackend`, owning the per-context lifecycle and TTL
/// cleanup policy that every backend shares.
pub struct StateStore {
    backend: Box<dyn StateBackend>,
    max_history_size: usize,
    auto_summarize: bool,
}

impl StateStore {
    pub fn new(backend: Box<dyn StateBackend>, max_history_size: usize, auto_summarize: bool) -> Self {
        Self {
            backend,
            max_history_size,
            auto_summarize,
        }
    }

    pub async fn get_or_create(&self, context_id: &str) -> Result<ConversationState, AgentError> {
        if let Some(existing) = self.backend.load(context_id).await? {
            return Ok(existing);
        }
        let created = ConversationState::new(
            context_id.to_string(),
            self.max_history_size,
            self.auto_summarize,
        );
        self.backend.save(&created).await?;
        Ok(created)
    }

    pub async fn add_to_history(&self, context_id: &str, message: ConversationMessage) -> Result<(), AgentError> {
        let mut state = self.get_or_create(context_id).await?;
        state.add_message(message);
        self.backend.save(&state).await
    }

    pub async fn get_history(&self, context_id: &str) -> Result<Vec<ConversationMessage>, AgentError> {
        Ok(self.get_or_create(context_id).await?.history)
    }

    pub async fn set_variable(
        &self,
        context_id: &str,
        key: &str,
        value: serde_json::Value,
        ttl: Option<i64>,
    ) -> Result<(), AgentError> {
        let mut state = self.get_or_create(context_id).await?;
        state.set_variable(key.to_string(), value, ttl);
        self.backend.save(&state).await
    }

    pub async fn get_variable(&self, context_id: &str, key: &str) -> Result<Option<serde_json::Value>, AgentError> {
        Ok(self.get_or_create(context_id).await?.get_variable(key).cloned())
    }

    pub async fn delete_variable(&self, context_id: &str, key: &str) -> Result<bool, AgentError> {
        let mut state = self.get_or_create(context_id).await?;
        let removed = state.delete_variable(key);
        self.backend.save(&state).await?;
        Ok(removed)
    }

    /// Drops contexts untouched for longer than `max_age_hours`, and
    /// sweeps expired variables from everything that remains.
    pub async fn cleanup_old_contexts(&self, max_age_hours: i64) -> Result<usize, AgentError> {
        let cutoff = Utc::now() - Duration::hours(max_age_hours);
        let removed = self.backend.delete_stale(cutoff).await?;
        self.backend.cleanup_expired_variables().await?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backend::MemoryBackend;

    fn store() -> StateStore {
        StateStore::new(Box::new(MemoryBackend::new()), 4, true)
    }

    #[tokio::test]
    async fn variable_round_trips() {
        let store = store();
        store
            .set_variable("ctx-1", "count", serde_json::json!(1), None)
            .await
            .unwrap();
        let value = store.get_variable("ctx-1", "count").await.unwrap();
        assert_eq!(value, Some(serde_json::json!(1)));
    }

    #[tokio::test]
    async fn history_overflow_archives_oldest_half_when_auto_summarize() {
        let store = store();
        for i in 0..6 {
            store
                .add_to_history(
                    "ctx-2",
                    ConversationMessage::new(ConversationRole::User, format!("message {i}")),
                )
                .await
                .unwrap();
        }
        let history = store.get_history("ctx-2").await.unwrap();
        assert!(history.len() <= 4);
        let state = store.get_or_create("ctx-2").await.unwrap();
        assert!(state.summary.is_some());
        assert!(state.archived_messages > 0);
    }

    #[tokio::test]
    async fn history_overflow_drops_without_auto_summarize() {
        let store = StateStore::new(Box::new(MemoryBackend::new()), 2, false);
        for i in 0..4 {
            store
                .add_to_history(
                    "ctx-3",
                    ConversationMessage::new(ConversationRole::User, format!("message {i}")),
                )
                .await
                .unwrap();
        }
        let state = store.get_or_create("ctx-3").await.unwrap();
        assert!(state.summary.is_none());
        assert_eq!(state.archived_messages, 2);
    }

    #[tokio::test]
    async fn delete_variable_reports_whether_it_existed() {
        let store = store();
        store
            .set_variable("ctx-4", "key", serde_json::json!("v"), None)
            .await
            .unwrap();
        assert!(store.delete_variable("ctx-4", "key").await.unwrap());
        assert!(!store.delete_variable("ctx-4", "key").await.unwrap());
    }

    #[test]
    fn expired_variable_is_invisible() {
        let mut state = ConversationState::new("ctx-5".into(), 10, true);
        state.set_variable("ttl-key".into(), serde_json::json!(1), Some(-1));
        assert!(state.get_variable("ttl-key").is_none());
    }

    #[test]
    fn cleanup_expired_variables_removes_only_expired() {
        let mut state = ConversationState::new("ctx-6".into(), 10, true);
        state.set_variable("expired".into(), serde_json::json!(1), Some(-1));
        state.set_variable("fresh".into(), serde_json::json!(2), None);
        let removed = state.cleanup_expired_variables();
        assert_eq!(removed, 1);
        assert!(state.variables.contains_key("fresh"));
    }
}
