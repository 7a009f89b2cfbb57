//! Completed focus sessions.
//!
//! The session log is append-only: a [`FocusSession`] is created once, when
//! a running timer reaches zero, and never edited afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::task::OwnerId;

/// Opaque identifier for a focus session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a new time-ordered session id (UUID v7).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Builds a local-mode id from a monotonic counter value.
    #[must_use]
    pub fn local(seq: u64) -> Self {
        Self(format!("local-{seq}"))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A completed focus session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusSession {
    /// Owner-scoped identifier.
    pub id: SessionId,
    /// Optional free-text label; need not reference a task entity.
    pub task: Option<String>,
    /// Duration in minutes, always greater than zero.
    pub minutes: u32,
    /// When the session was committed.
    pub completed_at: DateTime<Utc>,
    /// The owning principal.
    pub owner_id: OwnerId,
}

/// Body of a "record session" request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSession {
    /// Optional task label.
    #[serde(default)]
    pub task: Option<String>,
    /// Duration in minutes.
    pub minutes: u32,
}

/// Normalizes a session label: blank labels become `None`, others are trimmed.
#[must_use]
pub fn normalize_label(task: Option<&str>) -> Option<String> {
    task.map(str::trim)
        .filter(|label| !label.is_empty())
        .map(str::to_string)
}

/// Sorts sessions newest first by completion time, id as tiebreak.
pub fn sort_sessions_newest_first(sessions: &mut [FocusSession]) {
    sessions.sort_by(|a, b| {
        b.completed_at
            .cmp(&a.completed_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}
