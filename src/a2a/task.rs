//! Server-side A2A task model: `Task`, `Message`, `Part`, `Artifact`, and the
//! `TaskStore` that owns every task's lifecycle.
//!
//! This is the authoritative server-side mirror of the wire shapes already
//! modeled client-side in `a2a::client` (`A2ATask`/`A2ATaskStatus`/
//! `A2ATaskState`); it adds the `Rejected` terminal state the client-side
//! enum omits and the mutation/locking discipline the server needs.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AgentError;

/// A task's lifecycle status. Transitions form a DAG rooted at `Submitted`;
/// `Completed`, `Failed`, `Canceled`, and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Submitted,
    Working,
    InputRequired,
    Completed,
    Failed,
    Canceled,
    Rejected,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Canceled | TaskStatus::Rejected
        )
    }
}

/// A message role, per the data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
    Function,
    Tool,
}

/// A single content part within a message or artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Part {
    Text {
        text: String,
    },
    Data {
        #[serde(rename = "mimeType")]
        mime_type: String,
        data: serde_json::Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn data(mime_type: impl Into<String>, data: serde_json::Value) -> Self {
        Part::Data {
            mime_type: mime_type.into(),
            data,
            name: None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text),
            Part::Data { .. } => None,
        }
    }
}

/// A single immutable message in a task's append-only history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "messageId")]
    pub message_id: String,
    pub role: Role,
    pub parts: Vec<Part>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Message {
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            role,
            parts,
            metadata: Default::default(),
        }
    }

    /// The last TextPart's text, if any — used by the router and dispatcher
    /// to find "the user's most recent text".
    pub fn first_text(&self) -> Option<&str> {
        self.parts.iter().find_map(Part::as_text)
    }
}

/// A named, ordered collection of parts produced by a capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub parts: Vec<Part>,
}

/// One artifact-update streaming event, per the streaming contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactUpdate {
    pub artifact: Artifact,
    pub append: bool,
    #[serde(rename = "lastChunk")]
    pub last_chunk: bool,
}

/// One event emitted for a task: a status transition or an artifact chunk.
/// The per-task event queue enforces that exactly one terminal `Status`
/// event is ever emitted, and that no event follows it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    Status {
        status: TaskStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    ArtifactUpdate(ArtifactUpdate),
}

/// A unit of work with a lifecycle, attached artifacts, and history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "taskId")]
    pub task_id: String,
    #[serde(rename = "contextId")]
    pub context_id: String,
    pub status: TaskStatus,
    pub history: Vec<Message>,
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    fn new(context_id: String) -> Self {
        let now = Utc::now();
        Self {
            task_id: Uuid::new_v4().to_string(),
            context_id,
            status: TaskStatus::Submitted,
            history: Vec::new(),
            artifacts: Vec::new(),
            metadata: Default::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The most recent user text message in history, reverse-scanning.
    /// Used by the router and the dispatcher to find "what the user asked".
    pub fn latest_user_text(&self) -> Option<&str> {
        self.history
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .and_then(Message::first_text)
    }
}

/// Owns every task's lifecycle. All mutation goes through a per-task lock;
/// readers may snapshot a task (clone under the lock) without blocking
/// writers.
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: DashMap<String, Arc<Mutex<Task>>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
        }
    }

    /// Create a brand-new task in a fresh context (or the given one).
    pub fn create(&self, context_id: Option<String>) -> Task {
        let task = Task::new(context_id.unwrap_or_else(|| Uuid::new_v4().to_string()));
        self.tasks
            .insert(task.task_id.clone(), Arc::new(Mutex::new(task.clone())));
        task
    }

    /// Snapshot a task by id.
    pub fn get(&self, task_id: &str) -> Option<Task> {
        self.tasks.get(task_id).map(|t| t.lock().clone())
    }

    /// Append a message to a task's history. Rejected if the task is
    /// already terminal (invariant I2/I3).
    pub fn append_message(&self, task_id: &str, message: Message) -> Result<(), AgentError> {
        let entry = self
            .tasks
            .get(task_id)
            .ok_or_else(|| AgentError::Routing(format!("task not found: {task_id}")))?;
        let mut task = entry.lock();
        if task.status.is_terminal() {
            return Err(AgentError::Cancellation(format!(
                "task {task_id} is already terminal, no further history is accepted"
            )));
        }
        task.history.push(message);
        task.updated_at = Utc::now();
        Ok(())
    }

    /// Apply an artifact-update event. Rejected if the task is terminal.
    pub fn apply_artifact_update(
        &self,
        task_id: &str,
        update: ArtifactUpdate,
    ) -> Result<(), AgentError> {
        let entry = self
            .tasks
            .get(task_id)
            .ok_or_else(|| AgentError::Routing(format!("task not found: {task_id}")))?;
        let mut task = entry.lock();
        if task.status.is_terminal() {
            return Err(AgentError::Cancellation(format!(
                "task {task_id} is already terminal, no further artifacts are accepted"
            )));
        }
        if update.append {
            if let Some(existing) = task
                .artifacts
                .iter_mut()
                .find(|a| a.name == update.artifact.name)
            {
                existing.parts.extend(update.artifact.parts);
            } else {
                task.artifacts.push(update.artifact);
            }
        } else {
            task.artifacts.push(update.artifact);
        }
        task.updated_at = Utc::now();
        Ok(())
    }

    /// Transition a task's status. Rejected if the task is already
    /// terminal (invariant I1/I2): once terminal, no further status
    /// updates are accepted.
    pub fn transition(&self, task_id: &str, status: TaskStatus) -> Result<(), AgentError> {
        let entry = self
            .tasks
            .get(task_id)
            .ok_or_else(|| AgentError::Routing(format!("task not found: {task_id}")))?;
        let mut task = entry.lock();
        if task.status.is_terminal() {
            return Err(AgentError::Cancellation(format!(
                "task {task_id} is already terminal ({:?}), cannot transition to {:?}",
                task.status, status
            )));
        }
        task.status = status;
        task.updated_at = Utc::now();
        Ok(())
    }

    /// Cancel a task. Rejected if the task is already terminal, per §4.1's
    /// cancellation contract.
    pub fn cancel(&self, task_id: &str) -> Result<(), AgentError> {
        let entry = self
            .tasks
            .get(task_id)
            .ok_or_else(|| AgentError::Routing(format!("task not found: {task_id}")))?;
        let mut task = entry.lock();
        if task.status.is_terminal() {
            return Err(AgentError::Cancellation(format!(
                "task {task_id} is already terminal and cannot be canceled"
            )));
        }
        task.status = TaskStatus::Canceled;
        task.updated_at = Utc::now();
        Ok(())
    }
}

/// Per-task event queue with a single drainer, per the concurrency model:
/// all events for a given task appear in emit order and the queue closes
/// once a terminal status event has been pushed.
#[derive(Debug, Default)]
pub struct TaskEventQueue {
    inner: Mutex<VecDeque<TaskEvent>>,
    closed: Mutex<bool>,
}

impl TaskEventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push an event. Returns an error if the queue is already closed
    /// (a terminal status event was already pushed).
    pub fn push(&self, event: TaskEvent) -> Result<(), AgentError> {
        let mut closed = self.closed.lock();
        if *closed {
            return Err(AgentError::Cancellation(
                "event queue already closed by a terminal status event".into(),
            ));
        }
        let is_terminal = matches!(
            &event,
            TaskEvent::Status { status, .. } if status.is_terminal()
        );
        self.inner.lock().push_back(event);
        if is_terminal {
            *closed = true;
        }
        Ok(())
    }

    pub fn drain(&self) -> Vec<TaskEvent> {
        self.inner.lock().drain(..).collect()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_task_starts_submitted() {
        let store = TaskStore::new();
        let task = store.create(None);
        assert_eq!(task.status, TaskStatus::Submitted);
        assert!(task.history.is_empty());
    }

    #[test]
    fn terminal_status_rejects_further_transitions() {
        let store = TaskStore::new();
        let task = store.create(None);
        store.transition(&task.task_id, TaskStatus::Working).unwrap();
        store.transition(&task.task_id, TaskStatus::Completed).unwrap();
        let result = store.transition(&task.task_id, TaskStatus::Working);
        assert!(result.is_err());
    }

    #[test]
    fn terminal_status_rejects_further_history() {
        let store = TaskStore::new();
        let task = store.create(None);
        store.transition(&task.task_id, TaskStatus::Failed).unwrap();
        let result = store.append_message(
            &task.task_id,
            Message::new(Role::User, vec![Part::text("too late")]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn append_only_history_preserves_order() {
        let store = TaskStore::new();
        let task = store.create(None);
        store
            .append_message(&task.task_id, Message::new(Role::User, vec![Part::text("hi")]))
            .unwrap();
        store
            .append_message(
                &task.task_id,
                Message::new(Role::Assistant, vec![Part::text("hello")]),
            )
            .unwrap();
        let snapshot = store.get(&task.task_id).unwrap();
        assert_eq!(snapshot.history.len(), 2);
        assert_eq!(snapshot.history[0].first_text(), Some("hi"));
    }

    #[test]
    fn latest_user_text_reverse_scans() {
        let store = TaskStore::new();
        let task = store.create(None);
        store
            .append_message(&task.task_id, Message::new(Role::User, vec![Part::text("first")]))
            .unwrap();
        store
            .append_message(
                &task.task_id,
                Message::new(Role::Assistant, vec![Part::text("reply")]),
            )
            .unwrap();
        store
            .append_message(&task.task_id, Message::new(Role::User, vec![Part::text("second")]))
            .unwrap();
        let snapshot = store.get(&task.task_id).unwrap();
        assert_eq!(snapshot.latest_user_text(), Some("second"));
    }

    #[test]
    fn cancel_already_terminal_task_errors() {
        let store = TaskStore::new();
        let task = store.create(None);
        store.transition(&task.task_id, TaskStatus::Completed).unwrap();
        assert!(store.cancel(&task.task_id).is_err());
    }

    #[test]
    fn event_queue_closes_after_terminal_status() {
        let queue = TaskEventQueue::new();
        queue
            .push(TaskEvent::Status {
                status: TaskStatus::Working,
                message: None,
            })
            .unwrap();
        queue
            .push(TaskEvent::Status {
                status: TaskStatus::Completed,
                message: None,
            })
            .unwrap();
        assert!(queue.is_closed());
        let result = queue.push(TaskEvent::Status {
            status: TaskStatus::Canceled,
            message: None,
        });
        assert!(result.is_err());
    }

    #[test]
    fn artifact_update_append_extends_existing_artifact() {
        let store = TaskStore::new();
        let task = store.create(None);
        store
            .apply_artifact_update(
                &task.task_id,
                ArtifactUpdate {
                    artifact: Artifact {
                        name: "agent-stream-0".into(),
                        description: None,
                        parts: vec![Part::text("chunk one")],
                    },
                    append: true,
                    last_chunk: false,
                },
            )
            .unwrap();
        store
            .apply_artifact_update(
                &task.task_id,
                ArtifactUpdate {
                    artifact: Artifact {
                        name: "agent-stream-0".into(),
                        description: None,
                        parts: vec![Part::text("chunk two")],
                    },
                    append: true,
                    last_chunk: true,
                },
            )
            .unwrap();
        let snapshot = store.get(&task.task_id).unwrap();
        assert_eq!(snapshot.artifacts.len(), 1);
        assert_eq!(snapshot.artifacts[0].parts.len(), 2);
    }
}
