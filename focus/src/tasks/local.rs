//! Single-process backend used when no owner identity is configured.
//!
//! Every operation is immediately authoritative and nothing is published.
//! State can optionally be persisted to a JSON file, rewritten after each
//! successful mutation. A mutation is applied to a copy first and only
//! swapped in once the file write succeeds, so a failed save leaves both the
//! file and the in-memory state unchanged.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{TimeDelta, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use focus_proto::session::{FocusSession, SessionId, normalize_label, sort_sessions_newest_first};
use focus_proto::settings::{SettingsPatch, UserSettings};
use focus_proto::task::{OwnerId, Task, TaskId, sort_newest_first};

use super::{TaskBackend, validate_minutes, validate_settings, validate_text};
use crate::FocusError;
use crate::stats::{self, DerivedStats};

/// Everything local mode keeps, in its on-disk shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct LocalState {
    next_seq: u64,
    tasks: Vec<Task>,
    sessions: Vec<FocusSession>,
    settings: UserSettings,
}

impl LocalState {
    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn task_mut(&mut self, id: &TaskId) -> Result<&mut Task, FocusError> {
        self.tasks
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| FocusError::NotFound(format!("task {id}")))
    }

    /// Creation stamp strictly later than every existing task's.
    fn next_created_at(&self) -> chrono::DateTime<Utc> {
        let now = Utc::now();
        match self.tasks.iter().map(|t| t.created_at).max() {
            Some(last) if now <= last => last + TimeDelta::microseconds(1),
            _ => now,
        }
    }
}

/// Local-mode task list, session log, and settings for the guest owner.
pub struct LocalBackend {
    owner: OwnerId,
    state: Mutex<LocalState>,
    path: Option<PathBuf>,
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl LocalBackend {
    /// Creates a backend that keeps everything in memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            owner: OwnerId::guest(),
            state: Mutex::new(LocalState::default()),
            path: None,
        }
    }

    /// Opens a file-backed backend, loading existing state if the file
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns [`FocusError::StoreUnavailable`] if the file exists but cannot
    /// be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, FocusError> {
        let path = path.into();
        let state = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                FocusError::StoreUnavailable(format!("corrupt data file {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => LocalState::default(),
            Err(e) => {
                return Err(FocusError::StoreUnavailable(format!(
                    "cannot read {}: {e}",
                    path.display()
                )));
            }
        };
        tracing::debug!(path = %path.display(), "local data loaded");
        Ok(Self {
            owner: OwnerId::guest(),
            state: Mutex::new(state),
            path: Some(path),
        })
    }

    /// The file backing this store, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The owner used for every record.
    #[must_use]
    pub const fn owner(&self) -> &OwnerId {
        &self.owner
    }

    /// Appends a completed focus session.
    ///
    /// # Errors
    ///
    /// [`FocusError::InvalidInput`] when `minutes` is zero,
    /// [`FocusError::StoreUnavailable`] if saving fails.
    pub fn record_session(
        &self,
        task: Option<&str>,
        minutes: u32,
    ) -> Result<FocusSession, FocusError> {
        validate_minutes(minutes)?;
        self.mutate(|state| {
            let session = FocusSession {
                id: SessionId::local(state.next_seq()),
                task: normalize_label(task),
                minutes,
                completed_at: Utc::now(),
                owner_id: self.owner.clone(),
            };
            state.sessions.push(session.clone());
            Ok(session)
        })
    }

    /// Returns up to `limit` sessions, newest first.
    #[must_use]
    pub fn list_sessions(&self, limit: usize) -> Vec<FocusSession> {
        let mut sessions = self.state.lock().sessions.clone();
        sort_sessions_newest_first(&mut sessions);
        sessions.truncate(limit);
        sessions
    }

    /// Stats over the full session log, in the system's local time zone.
    #[must_use]
    pub fn stats(&self) -> DerivedStats {
        let sessions = self.state.lock().sessions.clone();
        stats::compute_local(&sessions, Utc::now())
    }

    /// Current settings.
    #[must_use]
    pub fn settings(&self) -> UserSettings {
        self.state.lock().settings
    }

    /// Applies a partial settings update.
    ///
    /// # Errors
    ///
    /// [`FocusError::InvalidInput`] for a zero duration,
    /// [`FocusError::StoreUnavailable`] if saving fails.
    pub fn update_settings(&self, patch: &SettingsPatch) -> Result<UserSettings, FocusError> {
        validate_settings(patch)?;
        self.mutate(|state| {
            state.settings = patch.applied_to(state.settings);
            Ok(state.settings)
        })
    }

    fn add(&self, text: &str) -> Result<Task, FocusError> {
        let text = validate_text(text)?;
        self.mutate(|state| {
            let task = Task {
                id: TaskId::local(state.next_seq()),
                text,
                done: false,
                created_at: state.next_created_at(),
                owner_id: self.owner.clone(),
            };
            state.tasks.push(task.clone());
            Ok(task)
        })
    }

    fn toggle(&self, id: &TaskId) -> Result<Task, FocusError> {
        self.mutate(|state| {
            let task = state.task_mut(id)?;
            task.done = !task.done;
            Ok(task.clone())
        })
    }

    fn edit(&self, id: &TaskId, text: &str) -> Result<Task, FocusError> {
        let text = validate_text(text)?;
        self.mutate(|state| {
            let task = state.task_mut(id)?;
            task.text = text;
            Ok(task.clone())
        })
    }

    fn remove(&self, id: &TaskId) -> Result<(), FocusError> {
        self.mutate(|state| {
            let index = state
                .tasks
                .iter()
                .position(|t| &t.id == id)
                .ok_or_else(|| FocusError::NotFound(format!("task {id}")))?;
            state.tasks.remove(index);
            Ok(())
        })
    }

    fn list(&self) -> Vec<Task> {
        let mut tasks = self.state.lock().tasks.clone();
        sort_newest_first(&mut tasks);
        tasks
    }

    /// Runs `change` against a copy of the state, saves it, then swaps it in.
    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut LocalState) -> Result<T, FocusError>,
    ) -> Result<T, FocusError> {
        let mut state = self.state.lock();
        let mut next = state.clone();
        let out = change(&mut next)?;
        self.save(&next)?;
        *state = next;
        Ok(out)
    }

    fn save(&self, state: &LocalState) -> Result<(), FocusError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let unavailable =
            |e: &dyn std::fmt::Display| FocusError::StoreUnavailable(format!("{}: {e}", path.display()));

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| unavailable(&e))?;
        }
        let json = serde_json::to_vec_pretty(state).map_err(|e| unavailable(&e))?;
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, json).map_err(|e| unavailable(&e))?;
        fs::rename(&staging, path).map_err(|e| unavailable(&e))?;
        Ok(())
    }
}

impl TaskBackend for LocalBackend {
    async fn add_task(&self, text: &str) -> Result<Task, FocusError> {
        self.add(text)
    }

    async fn toggle_done(&self, id: &TaskId) -> Result<Task, FocusError> {
        self.toggle(id)
    }

    async fn edit_text(&self, id: &TaskId, text: &str) -> Result<Task, FocusError> {
        self.edit(id, text)
    }

    async fn remove_task(&self, id: &TaskId) -> Result<(), FocusError> {
        self.remove(id)
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, FocusError> {
        Ok(self.list())
    }
}
