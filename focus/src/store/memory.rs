//! In-memory authoritative store for tasks, sessions, and settings.
//!
//! [`MemoryStore`] keeps one table per concern, each keyed by owner. It is
//! the backing store of the server and of in-process tests. All data is lost
//! when the process exits.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::RwLock;

use focus_proto::session::{FocusSession, SessionId, normalize_label};
use focus_proto::settings::{SettingsPatch, UserSettings};
use focus_proto::task::{OwnerId, Task, TaskId, TaskPatch, sort_newest_first};

use super::{SessionLog, SettingsStore, StoreError, TaskStore};
use crate::FocusError;
use crate::tasks::{validate_minutes, validate_settings, validate_text};

/// Task rows grouped by owner, plus the last issued creation timestamp.
#[derive(Default)]
struct TaskTable {
    by_owner: HashMap<OwnerId, HashMap<TaskId, Task>>,
    last_created: Option<DateTime<Utc>>,
}

impl TaskTable {
    /// Returns a creation timestamp strictly later than any issued before,
    /// so list order is total even for tasks created in the same instant.
    fn next_created_at(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_created {
            Some(last) if now <= last => last + TimeDelta::microseconds(1),
            _ => now,
        };
        self.last_created = Some(stamp);
        stamp
    }
}

/// Thread-safe in-memory store implementing every store interface.
pub struct MemoryStore {
    tasks: RwLock<TaskTable>,
    sessions: RwLock<HashMap<OwnerId, Vec<FocusSession>>>,
    settings: RwLock<HashMap<OwnerId, UserSettings>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(TaskTable::default()),
            sessions: RwLock::new(HashMap::new()),
            settings: RwLock::new(HashMap::new()),
        }
    }

    /// Number of tasks held for an owner.
    pub async fn task_count(&self, owner: &OwnerId) -> usize {
        let tasks = self.tasks.read().await;
        tasks.by_owner.get(owner).map_or(0, HashMap::len)
    }
}

fn rejected(err: FocusError) -> StoreError {
    match err {
        FocusError::InvalidInput(reason) => StoreError::Invalid(reason),
        other => StoreError::Invalid(other.to_string()),
    }
}

fn missing(id: &TaskId) -> StoreError {
    StoreError::NotFound(format!("task {id}"))
}

impl TaskStore for MemoryStore {
    async fn create(&self, owner: &OwnerId, text: &str) -> Result<Task, StoreError> {
        let text = validate_text(text).map_err(rejected)?;
        let mut tasks = self.tasks.write().await;
        let task = Task {
            id: TaskId::generate(),
            text,
            done: false,
            created_at: tasks.next_created_at(),
            owner_id: owner.clone(),
        };
        tasks
            .by_owner
            .entry(owner.clone())
            .or_default()
            .insert(task.id.clone(), task.clone());
        drop(tasks);
        tracing::debug!(owner = %owner, task_id = %task.id, "task created");
        Ok(task)
    }

    async fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<Task>, StoreError> {
        let mut list: Vec<Task> = {
            let tasks = self.tasks.read().await;
            tasks
                .by_owner
                .get(owner)
                .map(|owned| owned.values().cloned().collect())
                .unwrap_or_default()
        };
        sort_newest_first(&mut list);
        Ok(list)
    }

    async fn update_partial(
        &self,
        owner: &OwnerId,
        id: &TaskId,
        patch: &TaskPatch,
    ) -> Result<Task, StoreError> {
        let patch = TaskPatch {
            text: patch
                .text
                .as_deref()
                .map(validate_text)
                .transpose()
                .map_err(rejected)?,
            done: patch.done,
        };
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .by_owner
            .get_mut(owner)
            .and_then(|owned| owned.get_mut(id))
            .ok_or_else(|| missing(id))?;
        patch.apply_to(task);
        Ok(task.clone())
    }

    async fn delete(&self, owner: &OwnerId, id: &TaskId) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().await;
        tasks
            .by_owner
            .get_mut(owner)
            .and_then(|owned| owned.remove(id))
            .map(|_| ())
            .ok_or_else(|| missing(id))
    }
}

impl SessionLog for MemoryStore {
    async fn append(
        &self,
        owner: &OwnerId,
        task: Option<&str>,
        minutes: u32,
    ) -> Result<FocusSession, StoreError> {
        validate_minutes(minutes).map_err(rejected)?;
        let session = FocusSession {
            id: SessionId::generate(),
            task: normalize_label(task),
            minutes,
            completed_at: Utc::now(),
            owner_id: owner.clone(),
        };
        self.sessions
            .write()
            .await
            .entry(owner.clone())
            .or_default()
            .push(session.clone());
        tracing::debug!(owner = %owner, minutes, "session appended");
        Ok(session)
    }

    async fn list_sessions(&self, owner: &OwnerId) -> Result<Vec<FocusSession>, StoreError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(owner).cloned().unwrap_or_default())
    }
}

impl SettingsStore for MemoryStore {
    async fn get_settings(&self, owner: &OwnerId) -> Result<UserSettings, StoreError> {
        let mut settings = self.settings.write().await;
        Ok(*settings.entry(owner.clone()).or_default())
    }

    async fn update_settings(
        &self,
        owner: &OwnerId,
        patch: &SettingsPatch,
    ) -> Result<UserSettings, StoreError> {
        validate_settings(patch).map_err(rejected)?;
        let mut settings = self.settings.write().await;
        let entry = settings.entry(owner.clone()).or_default();
        *entry = patch.applied_to(*entry);
        Ok(*entry)
    }
}
