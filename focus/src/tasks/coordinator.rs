//! Optimistic task mutations reconciled against an authoritative store.
//!
//! Every mutation runs in two phases:
//!
//! 1. The change is applied to the local [`TaskProjection`] synchronously,
//!    before any I/O, so the caller's view updates immediately.
//! 2. The store call is issued under a bounded timeout. On success the
//!    confirmed state is written back, a [`SyncEvent`] is published to the
//!    owner's other connections, and the projection is replaced wholesale
//!    by a fresh authoritative read. On failure the optimistic change of
//!    that one operation is rolled back and the error is returned.
//!
//! The projection lock is a short-lived [`parking_lot::Mutex`] and is never
//! held across an await point.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;

use focus_proto::task::{OwnerId, SyncEvent, Task, TaskId, TaskPatch};

use super::projection::TaskProjection;
use super::{TaskBackend, TaskTally, validate_text};
use crate::FocusError;
use crate::fanout::Subscription;
use crate::store::{StoreError, TaskStore};

/// Default bound on a single store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

/// Synced-mode task backend for one connection.
///
/// The owner is fixed at construction. When built with
/// [`SyncCoordinator::connected`], confirmed mutations are published to the
/// owner's sibling connections and incoming events can be applied with
/// [`SyncCoordinator::drain_events`] or [`SyncCoordinator::next_event`].
pub struct SyncCoordinator<S> {
    store: Arc<S>,
    owner: OwnerId,
    link: Option<Subscription<SyncEvent>>,
    view: Mutex<TaskProjection>,
    timeout: Duration,
    next_pending: AtomicU64,
}

impl<S: TaskStore> SyncCoordinator<S> {
    /// Creates a coordinator that does not publish events itself.
    ///
    /// Used when the store is remote and the server fans out on commit.
    #[must_use]
    pub fn new(store: Arc<S>, owner: OwnerId) -> Self {
        Self {
            store,
            owner,
            link: None,
            view: Mutex::new(TaskProjection::new()),
            timeout: DEFAULT_STORE_TIMEOUT,
            next_pending: AtomicU64::new(1),
        }
    }

    /// Creates a coordinator bound to a fan-out subscription.
    ///
    /// The owner is taken from the subscription.
    #[must_use]
    pub fn connected(store: Arc<S>, link: Subscription<SyncEvent>) -> Self {
        let mut coordinator = Self::new(store, link.owner().clone());
        coordinator.link = Some(link);
        coordinator
    }

    /// Overrides the per-call store timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The owner all operations are scoped to.
    #[must_use]
    pub const fn owner(&self) -> &OwnerId {
        &self.owner
    }

    /// Current local view, newest first, optimistic entries included.
    #[must_use]
    pub fn view(&self) -> Vec<Task> {
        self.view.lock().snapshot()
    }

    /// Completed and remaining counts over the local view.
    #[must_use]
    pub fn tally(&self) -> TaskTally {
        TaskTally::of(&self.view())
    }

    /// Adds a task.
    ///
    /// # Errors
    ///
    /// [`FocusError::InvalidInput`] for blank or over-long text, otherwise
    /// whatever the store reports.
    pub async fn add_task(&self, text: &str) -> Result<Task, FocusError> {
        let text = validate_text(text)?;
        let pending = TaskId::pending(self.next_pending.fetch_add(1, Ordering::Relaxed));
        self.view.lock().insert_new(Task {
            id: pending.clone(),
            text: text.clone(),
            done: false,
            created_at: Utc::now(),
            owner_id: self.owner.clone(),
        });

        let created = match self.call("create", self.store.create(&self.owner, &text)).await {
            Ok(task) => task,
            Err(err) => {
                self.view.lock().remove(&pending);
                tracing::warn!(owner = %self.owner, error = %err, "create failed, optimistic task dropped");
                return Err(err);
            }
        };

        self.view.lock().confirm(&pending, created.clone());
        tracing::debug!(owner = %self.owner, task_id = %created.id, "task created");
        self.publish(&SyncEvent::Created(created.clone()));
        self.reconcile().await;
        Ok(created)
    }

    /// Flips the done flag of a task in the local view.
    ///
    /// # Errors
    ///
    /// [`FocusError::NotFound`] if the id is not in the local view or the
    /// store does not know it for this owner.
    pub async fn toggle_done(&self, id: &TaskId) -> Result<Task, FocusError> {
        let (previous, optimistic) = self.begin_update(id, |task| task.done = !task.done)?;
        let patch = TaskPatch::done(optimistic.done);
        self.commit_update(previous, optimistic, patch).await
    }

    /// Replaces the text of a task in the local view.
    ///
    /// # Errors
    ///
    /// [`FocusError::InvalidInput`] for blank or over-long text,
    /// [`FocusError::NotFound`] as for [`SyncCoordinator::toggle_done`].
    pub async fn edit_text(&self, id: &TaskId, text: &str) -> Result<Task, FocusError> {
        let text = validate_text(text)?;
        let (previous, optimistic) = self.begin_update(id, |task| task.text.clone_from(&text))?;
        self.commit_update(previous, optimistic, TaskPatch::text(text))
            .await
    }

    /// Deletes a task.
    ///
    /// The id does not have to be in the local view; ownership is checked
    /// by the store.
    ///
    /// # Errors
    ///
    /// [`FocusError::NotFound`] if the store does not know the id for this
    /// owner, otherwise whatever the store reports.
    pub async fn remove_task(&self, id: &TaskId) -> Result<(), FocusError> {
        if id.is_pending() {
            return Err(not_in_view(id));
        }
        let removed = self.view.lock().remove(id);

        if let Err(err) = self.call("delete", self.store.delete(&self.owner, id)).await {
            if let Some(task) = removed
                && !matches!(err, FocusError::NotFound(_))
            {
                self.view.lock().insert_new(task);
            }
            tracing::warn!(owner = %self.owner, task_id = %id, error = %err, "delete failed");
            return Err(err);
        }

        tracing::debug!(owner = %self.owner, task_id = %id, "task deleted");
        self.publish(&SyncEvent::Deleted { id: id.clone() });
        self.reconcile().await;
        Ok(())
    }

    /// Reads the authoritative list and replaces the local view with it.
    ///
    /// # Errors
    ///
    /// Whatever the store reports; the view is left untouched on failure.
    pub async fn list_tasks(&self) -> Result<Vec<Task>, FocusError> {
        let tasks = self
            .call("list", self.store.list_by_owner(&self.owner))
            .await?;
        self.view.lock().replace_all(tasks.clone());
        Ok(tasks)
    }

    /// Applies an event from another connection. Returns `true` if the
    /// local view changed.
    ///
    /// Idempotent: a `Created` for a present id and a `Deleted` for an
    /// absent id are no-ops. Tasks of other owners are ignored.
    pub fn apply_event(&self, event: &SyncEvent) -> bool {
        let mut view = self.view.lock();
        match event {
            SyncEvent::Created(task) | SyncEvent::Updated(task) if task.owner_id != self.owner => {
                false
            }
            SyncEvent::Created(task) => view.insert_new(task.clone()),
            SyncEvent::Updated(task) => view.upsert(task.clone()),
            SyncEvent::Deleted { id } => view.remove(id).is_some(),
        }
    }

    /// Applies every event already queued on the subscription. Returns the
    /// number of events received.
    pub fn drain_events(&self) -> usize {
        let Some(link) = &self.link else {
            return 0;
        };
        let mut received = 0;
        while let Some(event) = link.try_recv() {
            self.apply_event(&event);
            received += 1;
        }
        received
    }

    /// Waits for the next event, applies it, and returns it.
    ///
    /// Returns `None` if there is no subscription or the hub is gone.
    pub async fn next_event(&self) -> Option<SyncEvent> {
        let event = self.link.as_ref()?.recv().await?;
        self.apply_event(&event);
        Some(event)
    }

    /// Applies a change to a copy of the current entry and installs it as
    /// the optimistic value. Returns `(previous, optimistic)`.
    fn begin_update(
        &self,
        id: &TaskId,
        change: impl FnOnce(&mut Task),
    ) -> Result<(Task, Task), FocusError> {
        if id.is_pending() {
            return Err(not_in_view(id));
        }
        let mut view = self.view.lock();
        let previous = view.get(id).cloned().ok_or_else(|| not_in_view(id))?;
        let mut optimistic = previous.clone();
        change(&mut optimistic);
        view.upsert(optimistic.clone());
        drop(view);
        Ok((previous, optimistic))
    }

    async fn commit_update(
        &self,
        previous: Task,
        optimistic: Task,
        patch: TaskPatch,
    ) -> Result<Task, FocusError> {
        let result = self
            .call(
                "update",
                self.store
                    .update_partial(&self.owner, &optimistic.id, &patch),
            )
            .await;

        match result {
            Ok(updated) => {
                self.view.lock().upsert(updated.clone());
                tracing::debug!(owner = %self.owner, task_id = %updated.id, "task updated");
                self.publish(&SyncEvent::Updated(updated.clone()));
                self.reconcile().await;
                Ok(updated)
            }
            Err(err) => {
                let mut view = self.view.lock();
                if matches!(err, FocusError::NotFound(_)) {
                    view.remove(&optimistic.id);
                } else {
                    view.restore_if_unchanged(&optimistic, previous);
                }
                drop(view);
                tracing::warn!(owner = %self.owner, task_id = %optimistic.id, error = %err, "update failed, rolled back");
                Err(err)
            }
        }
    }

    /// Re-reads the authoritative list after a confirmed mutation.
    ///
    /// A failed re-read leaves the confirmed state in place; the mutation
    /// itself has already committed.
    async fn reconcile(&self) {
        if let Err(err) = self.list_tasks().await {
            tracing::warn!(owner = %self.owner, error = %err, "re-fetch after mutation failed");
        }
    }

    fn publish(&self, event: &SyncEvent) {
        if let Some(link) = &self.link {
            let reached = link.publish_to_siblings(event);
            tracing::debug!(
                owner = %self.owner,
                event = event.name(),
                task_id = %event.task_id(),
                reached,
                "event published"
            );
        }
    }

    /// Runs a store call under the configured timeout.
    async fn call<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = Result<T, StoreError>> + Send,
    ) -> Result<T, FocusError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(FocusError::from),
            Err(_) => Err(FocusError::StoreUnavailable(format!(
                "{op} timed out after {}ms",
                self.timeout.as_millis()
            ))),
        }
    }
}

fn not_in_view(id: &TaskId) -> FocusError {
    FocusError::NotFound(format!("task {id}"))
}

impl<S: TaskStore> TaskBackend for SyncCoordinator<S> {
    async fn add_task(&self, text: &str) -> Result<Task, FocusError> {
        Self::add_task(self, text).await
    }

    async fn toggle_done(&self, id: &TaskId) -> Result<Task, FocusError> {
        Self::toggle_done(self, id).await
    }

    async fn edit_text(&self, id: &TaskId, text: &str) -> Result<Task, FocusError> {
        Self::edit_text(self, id, text).await
    }

    async fn remove_task(&self, id: &TaskId) -> Result<(), FocusError> {
        Self::remove_task(self, id).await
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, FocusError> {
        Self::list_tasks(self).await
    }
}
