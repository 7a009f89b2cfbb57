//! Local projection of an owner's task list.
//!
//! The projection is what a connection shows while mutations are in flight.
//! It is keyed by task id so that confirming an optimistic entry, applying an
//! event, and replacing everything after an authoritative read are all O(1)
//! per item. Ordering is computed on snapshot.

use std::collections::HashMap;

use focus_proto::task::{Task, TaskId, sort_newest_first};

/// Id-keyed view of tasks, including unconfirmed optimistic entries.
#[derive(Debug, Default, Clone)]
pub struct TaskProjection {
    entries: HashMap<TaskId, Task>,
}

impl TaskProjection {
    /// Creates an empty projection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a task by id.
    #[must_use]
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.entries.get(id)
    }

    /// Returns `true` if the id is present.
    #[must_use]
    pub fn contains(&self, id: &TaskId) -> bool {
        self.entries.contains_key(id)
    }

    /// Number of entries, optimistic ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries still waiting for store confirmation.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.entries.keys().filter(|id| id.is_pending()).count()
    }

    /// Inserts a task only if its id is absent. Returns `true` if inserted.
    pub fn insert_new(&mut self, task: Task) -> bool {
        if self.entries.contains_key(&task.id) {
            return false;
        }
        self.entries.insert(task.id.clone(), task);
        true
    }

    /// Inserts or replaces a task. Returns `true` if the view changed.
    pub fn upsert(&mut self, task: Task) -> bool {
        if self.entries.get(&task.id) == Some(&task) {
            return false;
        }
        self.entries.insert(task.id.clone(), task);
        true
    }

    /// Removes a task, returning it if present.
    pub fn remove(&mut self, id: &TaskId) -> Option<Task> {
        self.entries.remove(id)
    }

    /// Swaps an optimistic entry for its store-confirmed task.
    pub fn confirm(&mut self, pending: &TaskId, confirmed: Task) {
        self.entries.remove(pending);
        self.entries.insert(confirmed.id.clone(), confirmed);
    }

    /// Puts `previous` back, but only if the entry still holds the
    /// optimistic value this connection wrote. Returns `true` if restored.
    ///
    /// An entry changed by an event in the meantime is left alone.
    pub fn restore_if_unchanged(&mut self, optimistic: &Task, previous: Task) -> bool {
        if self.entries.get(&optimistic.id) != Some(optimistic) {
            return false;
        }
        self.entries.insert(previous.id.clone(), previous);
        true
    }

    /// Replaces every confirmed entry with the authoritative list.
    ///
    /// Optimistic entries whose store call is still in flight are kept.
    pub fn replace_all(&mut self, authoritative: Vec<Task>) {
        self.entries.retain(|id, _| id.is_pending());
        for task in authoritative {
            self.entries.insert(task.id.clone(), task);
        }
    }

    /// Returns the tasks in list order, newest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self.entries.values().cloned().collect();
        sort_newest_first(&mut tasks);
        tasks
    }

}
