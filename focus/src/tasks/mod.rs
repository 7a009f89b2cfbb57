//! Owner-scoped task lists in local and synced mode.
//!
//! Both modes implement [`TaskBackend`], so callers are agnostic to whether
//! they are talking to a [`LocalBackend`] (single process, every operation
//! immediately authoritative) or a [`SyncCoordinator`] (optimistic local
//! projection reconciled against an authoritative store).

pub mod coordinator;
pub mod local;
pub mod projection;

use std::future::Future;

use focus_proto::settings::SettingsPatch;
use focus_proto::task::{MAX_TASK_TEXT_LENGTH, Task, TaskId};

pub use coordinator::{DEFAULT_STORE_TIMEOUT, SyncCoordinator};
pub use local::LocalBackend;
pub use projection::TaskProjection;

use crate::FocusError;

/// The task operations offered to the UI/transport layer.
///
/// The owner is fixed when the backend is constructed and never passed per
/// call.
pub trait TaskBackend: Send + Sync {
    /// Adds a task with the given text (trimmed, must be non-empty).
    fn add_task(&self, text: &str) -> impl Future<Output = Result<Task, FocusError>> + Send;

    /// Flips the done flag of a task.
    fn toggle_done(&self, id: &TaskId) -> impl Future<Output = Result<Task, FocusError>> + Send;

    /// Replaces the text of a task.
    fn edit_text(
        &self,
        id: &TaskId,
        text: &str,
    ) -> impl Future<Output = Result<Task, FocusError>> + Send;

    /// Deletes a task.
    fn remove_task(&self, id: &TaskId) -> impl Future<Output = Result<(), FocusError>> + Send;

    /// Returns the authoritative list, newest first.
    fn list_tasks(&self) -> impl Future<Output = Result<Vec<Task>, FocusError>> + Send;
}

/// Trims task text and checks it is non-empty and within the length limit.
///
/// # Errors
///
/// Returns [`FocusError::InvalidInput`] for blank or over-long text.
pub fn validate_text(text: &str) -> Result<String, FocusError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(FocusError::InvalidInput("task text is required".to_string()));
    }
    if trimmed.chars().count() > MAX_TASK_TEXT_LENGTH {
        return Err(FocusError::InvalidInput(format!(
            "task text too long (max {MAX_TASK_TEXT_LENGTH} characters)"
        )));
    }
    Ok(trimmed.to_string())
}

/// Checks a session duration.
///
/// # Errors
///
/// Returns [`FocusError::InvalidInput`] when `minutes` is zero.
pub fn validate_minutes(minutes: u32) -> Result<(), FocusError> {
    if minutes == 0 {
        return Err(FocusError::InvalidInput(
            "minutes must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Checks a settings patch.
///
/// # Errors
///
/// Returns [`FocusError::InvalidInput`] when any duration is zero.
pub fn validate_settings(patch: &SettingsPatch) -> Result<(), FocusError> {
    if patch.has_zero_duration() {
        return Err(FocusError::InvalidInput(
            "durations must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Completed versus remaining counts over a task list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct TaskTally {
    /// Tasks marked done.
    pub completed: usize,
    /// Tasks not yet done.
    pub remaining: usize,
}

impl TaskTally {
    /// Counts done and open tasks.
    #[must_use]
    pub fn of(tasks: &[Task]) -> Self {
        let completed = tasks.iter().filter(|t| t.done).count();
        Self {
            completed,
            remaining: tasks.len() - completed,
        }
    }
}
