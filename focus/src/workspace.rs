//! Selects local or synced mode once per session.
//!
//! [`Workspace`] is what the CLI talks to. Task operations go through
//! [`TaskBackend`] in both modes; sessions, stats, and settings are routed
//! to the local file or to the server.

use std::sync::Arc;

use chrono::Local;

use focus_proto::session::{FocusSession, sort_sessions_newest_first};
use focus_proto::settings::{SettingsPatch, UserSettings};
use focus_proto::task::{OwnerId, Task, TaskId};

use crate::FocusError;
use crate::config::{ClientConfig, SyncTarget};
use crate::remote::{EventStream, HttpStore};
use crate::stats::DerivedStats;
use crate::store::{SessionLog, SettingsStore};
use crate::tasks::{LocalBackend, SyncCoordinator, TaskBackend, validate_minutes, validate_settings};

/// The active backend for one CLI session.
pub enum Workspace {
    /// No identity: everything lives in one process.
    Local(LocalBackend),
    /// An owner identity and a server are configured.
    Synced {
        /// Task operations with optimistic apply and reconcile.
        coordinator: SyncCoordinator<HttpStore>,
        /// Shared REST client for sessions, stats, and settings.
        store: Arc<HttpStore>,
        /// Where the event channel lives.
        target: SyncTarget,
        /// Sessions listed at most.
        session_limit: usize,
    },
}

impl Workspace {
    /// Opens the backend selected by `config`.
    ///
    /// # Errors
    ///
    /// [`FocusError::StoreUnavailable`] if the local data file cannot be
    /// loaded or the HTTP client cannot be built, [`FocusError::InvalidInput`]
    /// for a malformed server URL.
    pub fn open(config: &ClientConfig) -> Result<Self, FocusError> {
        let target = config
            .sync_target()
            .map_err(|e| FocusError::InvalidInput(e.to_string()))?;

        let Some(target) = target else {
            let backend = match &config.data_file {
                Some(path) => LocalBackend::open(path)?,
                None => LocalBackend::in_memory(),
            };
            tracing::info!(path = ?backend.path(), "local mode");
            return Ok(Self::Local(backend));
        };

        let store = Arc::new(HttpStore::new(&target.server_url, config.store_timeout)?);
        let coordinator =
            SyncCoordinator::new(Arc::clone(&store), OwnerId::new(target.owner.clone()))
                .with_timeout(config.store_timeout);
        tracing::info!(server = %target.server_url, owner = %target.owner, "synced mode");
        Ok(Self::Synced {
            coordinator,
            store,
            target,
            session_limit: config.session_list_limit,
        })
    }

    /// Returns `true` in synced mode.
    #[must_use]
    pub const fn is_synced(&self) -> bool {
        matches!(self, Self::Synced { .. })
    }

    /// The owner all records belong to.
    #[must_use]
    pub fn owner(&self) -> &OwnerId {
        match self {
            Self::Local(backend) => backend.owner(),
            Self::Synced { coordinator, .. } => coordinator.owner(),
        }
    }

    /// Records a completed focus session.
    ///
    /// # Errors
    ///
    /// [`FocusError::InvalidInput`] when `minutes` is zero, otherwise
    /// whatever the backend reports.
    pub async fn record_session(
        &self,
        task: Option<&str>,
        minutes: u32,
    ) -> Result<FocusSession, FocusError> {
        validate_minutes(minutes)?;
        match self {
            Self::Local(backend) => backend.record_session(task, minutes),
            Self::Synced { store, coordinator, .. } => Ok(store
                .append(coordinator.owner(), task, minutes)
                .await?),
        }
    }

    /// Lists sessions newest first, at most `limit` (or the configured cap).
    ///
    /// # Errors
    ///
    /// Whatever the backend reports.
    pub async fn list_sessions(&self, limit: Option<usize>) -> Result<Vec<FocusSession>, FocusError> {
        match self {
            Self::Local(backend) => Ok(backend.list_sessions(limit.unwrap_or(usize::MAX))),
            Self::Synced {
                store,
                coordinator,
                session_limit,
                ..
            } => {
                let mut sessions = store.list_sessions(coordinator.owner()).await?;
                sort_sessions_newest_first(&mut sessions);
                sessions.truncate(limit.unwrap_or(*session_limit));
                Ok(sessions)
            }
        }
    }

    /// Stats in the caller's local time zone.
    ///
    /// # Errors
    ///
    /// Whatever the backend reports.
    pub async fn stats(&self) -> Result<DerivedStats, FocusError> {
        match self {
            Self::Local(backend) => Ok(backend.stats()),
            Self::Synced { store, coordinator, .. } => {
                let offset_minutes = Local::now().offset().local_minus_utc() / 60;
                Ok(store.stats(coordinator.owner(), offset_minutes).await?)
            }
        }
    }

    /// Current settings.
    ///
    /// # Errors
    ///
    /// Whatever the backend reports.
    pub async fn settings(&self) -> Result<UserSettings, FocusError> {
        match self {
            Self::Local(backend) => Ok(backend.settings()),
            Self::Synced { store, coordinator, .. } => {
                Ok(store.get_settings(coordinator.owner()).await?)
            }
        }
    }

    /// Applies a partial settings update.
    ///
    /// # Errors
    ///
    /// [`FocusError::InvalidInput`] for a zero duration, otherwise whatever
    /// the backend reports.
    pub async fn update_settings(&self, patch: &SettingsPatch) -> Result<UserSettings, FocusError> {
        validate_settings(patch)?;
        match self {
            Self::Local(backend) => backend.update_settings(patch),
            Self::Synced { store, coordinator, .. } => {
                Ok(store.update_settings(coordinator.owner(), patch).await?)
            }
        }
    }

    /// Joins the owner's event channel.
    ///
    /// # Errors
    ///
    /// [`FocusError::InvalidInput`] in local mode, where there is no
    /// channel, [`FocusError::StoreUnavailable`] if the join fails.
    pub async fn subscribe(&self, capacity: usize) -> Result<EventStream, FocusError> {
        let Self::Synced { target, coordinator, .. } = self else {
            return Err(FocusError::InvalidInput(
                "event channel requires synced mode".to_string(),
            ));
        };
        EventStream::connect(&target.events_url, coordinator.owner().clone(), capacity)
            .await
            .map_err(|e| FocusError::StoreUnavailable(e.to_string()))
    }
}

/// Loads the authoritative list if `id` is not in the coordinator's view
/// yet, so a fresh session can toggle or edit tasks created elsewhere.
async fn ensure_in_view(
    coordinator: &SyncCoordinator<HttpStore>,
    id: &TaskId,
) -> Result<(), FocusError> {
    if !coordinator.view().iter().any(|task| &task.id == id) {
        coordinator.list_tasks().await?;
    }
    Ok(())
}

impl TaskBackend for Workspace {
    async fn add_task(&self, text: &str) -> Result<Task, FocusError> {
        match self {
            Self::Local(backend) => backend.add_task(text).await,
            Self::Synced { coordinator, .. } => coordinator.add_task(text).await,
        }
    }

    async fn toggle_done(&self, id: &TaskId) -> Result<Task, FocusError> {
        match self {
            Self::Local(backend) => backend.toggle_done(id).await,
            Self::Synced { coordinator, .. } => {
                ensure_in_view(coordinator, id).await?;
                coordinator.toggle_done(id).await
            }
        }
    }

    async fn edit_text(&self, id: &TaskId, text: &str) -> Result<Task, FocusError> {
        match self {
            Self::Local(backend) => backend.edit_text(id, text).await,
            Self::Synced { coordinator, .. } => {
                ensure_in_view(coordinator, id).await?;
                coordinator.edit_text(id, text).await
            }
        }
    }

    async fn remove_task(&self, id: &TaskId) -> Result<(), FocusError> {
        match self {
            Self::Local(backend) => backend.remove_task(id).await,
            Self::Synced { coordinator, .. } => coordinator.remove_task(id).await,
        }
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, FocusError> {
        match self {
            Self::Local(backend) => backend.list_tasks().await,
            Self::Synced { coordinator, .. } => coordinator.list_tasks().await,
        }
    }
}
