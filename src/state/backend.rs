//! Storage backends behind `StateStore`. Only `memory` and `file` are
//! wired up; a Valkey/Redis-compatible backend is modeled in `SPEC_FULL.md`
//! but not implemented since no Redis client crate is part of this
//! dependency stack.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::ConversationState;
use crate::error::AgentError;

#[async_trait]
pub trait StateBackend: Send + Sync {
    async fn load(&self, context_id: &str) -> Result<Option<ConversationState>, AgentError>;
    async fn save(&self, state: &ConversationState) -> Result<(), AgentError>;
    /// Removes every context whose `updated_at` is before `cutoff`; returns
    /// the number removed.
    async fn delete_stale(&self, cutoff: DateTime<Utc>) -> Result<usize, AgentError>;
    /// Sweeps expired variables out of every stored context in place.
    async fn cleanup_expired_variables(&self) -> Result<usize, AgentError>;
}

#[derive(Default)]
pub struct MemoryBackend {
    contexts: DashMap<String, ConversationState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateBackend for MemoryBackend {
    async fn load(&self, context_id: &str) -> Result<Option<ConversationState>, AgentError> {
        Ok(self.contexts.get(context_id).map(|e| e.clone()))
    }

    async fn save(&self, state: &ConversationState) -> Result<(), AgentError> {
        self.contexts.insert(state.context_id.clone(), state.clone());
        Ok(())
    }

    async fn delete_stale(&self, cutoff: DateTime<Utc>) -> Result<usize, AgentError> {
        let before = self.contexts.len();
        self.contexts.retain(|_, state| state.updated_at >= cutoff);
        Ok(before - self.contexts.len())
    }

    async fn cleanup_expired_variables(&self) -> Result<usize, AgentError> {
        let mut total = 0;
        for mut entry in self.contexts.iter_mut() {
            let before = entry.variables.len();
            entry.variables.retain(|_, v| !v.is_expired());
            total += before - entry.variables.len();
        }
        Ok(total)
    }
}

/// One JSON file per context, under `root_dir`. Simple and auditable;
/// adequate for single-process deployments, which is all the `file`
/// backend claims to support.
pub struct FileBackend {
    root_dir: PathBuf,
}

impl FileBackend {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    fn path_for(&self, context_id: &str) -> PathBuf {
        self.root_dir.join(format!("{context_id}.json"))
    }
}

#[async_trait]
impl StateBackend for FileBackend {
    async fn load(&self, context_id: &str) -> Result<Option<ConversationState>, AgentError> {
        let path = self.path_for(context_id);
        let mut file = match tokio::fs::File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AgentError::Config(format!("failed to open {path:?}: {e}"))),
        };
        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .await
            .map_err(|e| AgentError::Config(format!("failed to read {path:?}: {e}")))?;
        let state = serde_json::from_str(&contents)
            .map_err(|e| AgentError::Config(format!("corrupt state file {path:?}: {e}")))?;
        Ok(Some(state))
    }

    async fn save(&self, state: &ConversationState) -> Result<(), AgentError> {
        tokio::fs::create_dir_all(&self.root_dir)
            .await
            .map_err(|e| AgentError::Config(format!("failed to create {:?}: {e}", self.root_dir)))?;
        let path = self.path_for(&state.context_id);
        let contents = serde_json::to_vec_pretty(state)
            .map_err(|e| AgentError::Config(format!("failed to encode state: {e}")))?;
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| AgentError::Config(format!("failed to create {path:?}: {e}")))?;
        file.write_all(&contents)
            .await
            .map_err(|e| AgentError::Config(format!("failed to write {path:?}: {e}")))?;
        Ok(())
    }

    async fn delete_stale(&self, cutoff: DateTime<Utc>) -> Result<usize, AgentError> {
        let mut removed = 0;
        let mut entries = match tokio::fs::read_dir(&self.root_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(AgentError::Config(format!("failed to list {:?}: {e}", self.root_dir))),
        };
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AgentError::Config(format!("failed to iterate {:?}: {e}", self.root_dir)))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| AgentError::Config(format!("failed to read {path:?}: {e}")))?;
            if let Ok(state) = serde_json::from_str::<ConversationState>(&contents) {
                if state.updated_at < cutoff {
                    let _ = tokio::fs::remove_file(&path).await;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    async fn cleanup_expired_variables(&self) -> Result<usize, AgentError> {
        let mut total = 0;
        let mut entries = match tokio::fs::read_dir(&self.root_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(AgentError::Config(format!("failed to list {:?}: {e}", self.root_dir))),
        };
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AgentError::Config(format!("failed to iterate {:?}: {e}", self.root_dir)))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| AgentError::Config(format!("failed to read {path:?}: {e}")))?;
            if let Ok(mut state) = serde_json::from_str::<ConversationState>(&contents) {
                let before = state.variables.len();
                state.variables.retain(|_, v| !v.is_expired());
                total += before - state.variables.len();
                let encoded = serde_json::to_vec_pretty(&state)
                    .map_err(|e| AgentError::Config(format!("failed to encode state: {e}")))?;
                tokio::fs::write(&path, encoded)
                    .await
                    .map_err(|e| AgentError::Config(format!("failed to write {path:?}: {e}")))?;
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ConversationMessage, ConversationRole};

    fn state(context_id: &str) -> ConversationState {
        let mut state = ConversationState {
            context_id: context_id.to_string(),
            variables: Default::default(),
            history: Vec::new(),
            max_history_size: 10,
            auto_summarize: true,
            summary: None,
            archived_messages: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        state.history.push(ConversationMessage::new(ConversationRole::User, "hi".into()));
        state
    }

    #[tokio::test]
    async fn memory_backend_round_trips() {
        let backend = MemoryBackend::new();
        backend.save(&state("ctx-a")).await.unwrap();
        let loaded = backend.load("ctx-a").await.unwrap();
        assert!(loaded.is_some());
    }

    #[tokio::test]
    async fn file_backend_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path());
        backend.save(&state("ctx-b")).await.unwrap();
        let loaded = backend.load("ctx-b").await.unwrap();
        assert_eq!(loaded.unwrap().context_id, "ctx-b");
    }

    #[tokio::test]
    async fn file_backend_missing_context_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path());
        assert!(backend.load("missing").await.unwrap().is_none());
    }
}
