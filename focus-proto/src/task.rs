//! Task model and task-change events.
//!
//! A [`Task`] always belongs to exactly one owner. The [`SyncEvent`] enum is
//! what the fan-out channel broadcasts after the authoritative store has
//! committed a create, update, or delete.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum allowed task text length in characters.
pub const MAX_TASK_TEXT_LENGTH: usize = 256;

/// Prefix used for ids assigned by the local-mode store.
const LOCAL_PREFIX: &str = "local-";

/// Prefix used for optimistic ids that the store has not confirmed yet.
const PENDING_PREFIX: &str = "pending-";

/// Identifies the principal that owns a set of tasks and sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    /// Creates an owner id from any string-like value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The owner used by local mode, where no identity exists.
    #[must_use]
    pub fn guest() -> Self {
        Self("guest".to_string())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the id is empty after trimming.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque task identifier.
///
/// Server-assigned ids are UUID v7 strings. Local mode uses `local-<n>` and
/// optimistic entries use `pending-<n>`; callers must treat all shapes the
/// same way.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Generates a new time-ordered server id (UUID v7).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Builds a local-mode id from a monotonic counter value.
    #[must_use]
    pub fn local(seq: u64) -> Self {
        Self(format!("{LOCAL_PREFIX}{seq}"))
    }

    /// Builds a temporary id for an optimistic entry.
    #[must_use]
    pub fn pending(seq: u64) -> Self {
        Self(format!("{PENDING_PREFIX}{seq}"))
    }

    /// Wraps an existing id string.
    #[must_use]
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns `true` for ids created by [`TaskId::pending`].
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.0.starts_with(PENDING_PREFIX)
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single to-do item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Owner-scoped identifier, immutable once assigned.
    pub id: TaskId,
    /// Trimmed, non-empty task text.
    pub text: String,
    /// Completion flag.
    pub done: bool,
    /// Set once at creation; lists are ordered by this, newest first.
    pub created_at: DateTime<Utc>,
    /// The owning principal.
    pub owner_id: OwnerId,
}

/// A partial update to a task. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    /// Replacement text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Replacement done flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
}

impl TaskPatch {
    /// A patch that only replaces the text.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            done: None,
        }
    }

    /// A patch that only sets the done flag.
    #[must_use]
    pub const fn done(done: bool) -> Self {
        Self {
            text: None,
            done: Some(done),
        }
    }

    /// Returns `true` if the patch changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.text.is_none() && self.done.is_none()
    }

    /// Applies the patch to a task in place.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(text) = &self.text {
            task.text.clone_from(text);
        }
        if let Some(done) = self.done {
            task.done = done;
        }
    }
}

/// Sorts tasks into list order: `created_at` descending, id as tiebreak.
pub fn sort_newest_first(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

/// A task-change notification broadcast to one owner's connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncEvent {
    /// A task was created; carries the authoritative task.
    Created(Task),
    /// A task was updated; carries its full current state.
    Updated(Task),
    /// A task was deleted.
    Deleted {
        /// Id of the removed task.
        id: TaskId,
    },
}

impl SyncEvent {
    /// The id of the task this event concerns.
    #[must_use]
    pub const fn task_id(&self) -> &TaskId {
        match self {
            Self::Created(task) | Self::Updated(task) => &task.id,
            Self::Deleted { id } => id,
        }
    }

    /// Wire name of the event (`task:created`, `task:updated`, `task:deleted`).
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Created(_) => "task:created",
            Self::Updated(_) => "task:updated",
            Self::Deleted { .. } => "task:deleted",
        }
    }
}
