//! Store interfaces consumed by the core.
//!
//! The core never talks to a database directly. It consumes three
//! owner-scoped interfaces:
//! - [`TaskStore`]: authoritative task CRUD.
//! - [`SessionLog`]: append-only focus session log.
//! - [`SettingsStore`]: per-owner preferences.
//!
//! Implementations include [`memory::MemoryStore`] (in-process, used by the
//! server and tests) and [`crate::remote::HttpStore`] (talks to the server).

pub mod memory;

use std::future::Future;

use focus_proto::session::FocusSession;
use focus_proto::settings::{SettingsPatch, UserSettings};
use focus_proto::task::{OwnerId, Task, TaskId, TaskPatch};

pub use memory::MemoryStore;

/// Errors reported by store implementations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store rejected the input.
    #[error("rejected: {0}")]
    Invalid(String),
    /// The item does not exist in the caller's owner scope.
    #[error("not found: {0}")]
    NotFound(String),
    /// Transient I/O failure.
    #[error("unavailable: {0}")]
    Unavailable(String),
    /// The store refused the request for lack of an identity.
    #[error("unauthenticated")]
    Unauthenticated,
}

/// Authoritative, owner-scoped task storage.
///
/// Ownership is enforced here: an id outside `owner`'s scope behaves exactly
/// like an unknown id and yields [`StoreError::NotFound`].
pub trait TaskStore: Send + Sync {
    /// Creates a task with server-assigned id and timestamp.
    fn create(
        &self,
        owner: &OwnerId,
        text: &str,
    ) -> impl Future<Output = Result<Task, StoreError>> + Send;

    /// Lists the owner's tasks, newest first.
    fn list_by_owner(
        &self,
        owner: &OwnerId,
    ) -> impl Future<Output = Result<Vec<Task>, StoreError>> + Send;

    /// Applies a partial update and returns the task's new state.
    fn update_partial(
        &self,
        owner: &OwnerId,
        id: &TaskId,
        patch: &TaskPatch,
    ) -> impl Future<Output = Result<Task, StoreError>> + Send;

    /// Deletes a task.
    fn delete(
        &self,
        owner: &OwnerId,
        id: &TaskId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Append-only focus session log.
pub trait SessionLog: Send + Sync {
    /// Appends a completed session stamped with the current time.
    fn append(
        &self,
        owner: &OwnerId,
        task: Option<&str>,
        minutes: u32,
    ) -> impl Future<Output = Result<FocusSession, StoreError>> + Send;

    /// Returns every session of the owner, in no particular order.
    fn list_sessions(
        &self,
        owner: &OwnerId,
    ) -> impl Future<Output = Result<Vec<FocusSession>, StoreError>> + Send;
}

/// Per-owner settings storage with lazy defaults.
pub trait SettingsStore: Send + Sync {
    /// Returns the owner's settings, creating defaults on first access.
    fn get_settings(
        &self,
        owner: &OwnerId,
    ) -> impl Future<Output = Result<UserSettings, StoreError>> + Send;

    /// Applies a partial update (upsert) and returns the new settings.
    fn update_settings(
        &self,
        owner: &OwnerId,
        patch: &SettingsPatch,
    ) -> impl Future<Output = Result<UserSettings, StoreError>> + Send;
}
