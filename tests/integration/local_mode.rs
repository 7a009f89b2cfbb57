//! Integration tests for local mode.
//!
//! Local mode has no owner identity: every operation is authoritative in
//! process and nothing is published. State optionally survives restarts in
//! a JSON file.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use focus::FocusError;
use focus::config::ClientConfig;
use focus::tasks::{LocalBackend, TaskBackend, TaskTally};
use focus::workspace::Workspace;
use focus_proto::settings::SettingsPatch;
use focus_proto::task::{OwnerId, TaskId};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A data file path unique to this test run, removed on drop.
struct ScratchFile(PathBuf);

impl ScratchFile {
    fn new(name: &str) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "focus-local-{name}-{}-{nanos}",
            std::process::id()
        ));
        Self(dir.join("data.json"))
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Some(dir) = self.0.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }
}

// ---------------------------------------------------------------------------
// Task operations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_task_lifecycle() {
    let backend = LocalBackend::in_memory();

    let first = backend.add_task("  plan the week ").await.unwrap();
    let second = backend.add_task("water plants").await.unwrap();
    assert_eq!(first.text, "plan the week");
    assert_eq!(first.owner_id, OwnerId::guest());

    let listed = backend.list_tasks().await.unwrap();
    assert_eq!(listed, vec![second.clone(), first.clone()]);

    let done = backend.toggle_done(&first.id).await.unwrap();
    assert!(done.done);
    let edited = backend.edit_text(&second.id, "water all plants").await.unwrap();
    assert_eq!(edited.text, "water all plants");

    let tally = TaskTally::of(&backend.list_tasks().await.unwrap());
    assert_eq!((tally.completed, tally.remaining), (1, 1));

    backend.remove_task(&first.id).await.unwrap();
    assert_eq!(backend.list_tasks().await.unwrap(), vec![edited]);
}

#[tokio::test]
async fn invalid_input_and_unknown_ids() {
    let backend = LocalBackend::in_memory();

    assert!(matches!(
        backend.add_task("   ").await,
        Err(FocusError::InvalidInput(_))
    ));
    assert!(matches!(
        backend.add_task(&"x".repeat(257)).await,
        Err(FocusError::InvalidInput(_))
    ));
    assert!(backend.add_task(&"x".repeat(256)).await.is_ok());

    let missing = TaskId::from_string("local-999");
    assert!(matches!(
        backend.toggle_done(&missing).await,
        Err(FocusError::NotFound(_))
    ));
    assert!(matches!(
        backend.remove_task(&missing).await,
        Err(FocusError::NotFound(_))
    ));
}

// ---------------------------------------------------------------------------
// Sessions and settings
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sessions_are_listed_newest_first_and_capped() {
    let backend = LocalBackend::in_memory();
    for minutes in [10, 20, 30] {
        backend.record_session(Some("reading"), minutes).unwrap();
    }
    assert!(matches!(
        backend.record_session(None, 0),
        Err(FocusError::InvalidInput(_))
    ));

    let sessions = backend.list_sessions(2);
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].minutes, 30);
    assert_eq!(sessions[1].minutes, 20);
}

#[tokio::test]
async fn blank_session_label_is_dropped() {
    let backend = LocalBackend::in_memory();
    let session = backend.record_session(Some("   "), 25).unwrap();
    assert_eq!(session.task, None);
}

#[tokio::test]
async fn settings_patch_merges() {
    let backend = LocalBackend::in_memory();
    assert_eq!(backend.settings().default_pomodoro, 25);

    let updated = backend
        .update_settings(&SettingsPatch {
            default_pomodoro: Some(50),
            sound_enabled: Some(false),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(updated.default_pomodoro, 50);
    assert!(!updated.sound_enabled);
    assert_eq!(updated.short_break, 5);

    assert!(matches!(
        backend.update_settings(&SettingsPatch {
            long_break: Some(0),
            ..Default::default()
        }),
        Err(FocusError::InvalidInput(_))
    ));
    assert_eq!(backend.settings(), updated);
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn state_survives_reopen() {
    let file = ScratchFile::new("reopen");

    let task_id = {
        let backend = LocalBackend::open(&file.0).unwrap();
        let task = backend.add_task("persist me").await.unwrap();
        backend.toggle_done(&task.id).await.unwrap();
        backend.record_session(Some("persist me"), 25).unwrap();
        backend
            .update_settings(&SettingsPatch {
                notify_enabled: Some(false),
                ..Default::default()
            })
            .unwrap();
        task.id
    };

    let reopened = LocalBackend::open(&file.0).unwrap();
    let tasks = reopened.list_tasks().await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, task_id);
    assert!(tasks[0].done);
    assert_eq!(reopened.list_sessions(10).len(), 1);
    assert!(!reopened.settings().notify_enabled);

    // Ids keep counting from where the previous run stopped.
    let next = reopened.add_task("after restart").await.unwrap();
    assert_ne!(next.id, task_id);
}

#[tokio::test]
async fn corrupt_file_is_unavailable() {
    let file = ScratchFile::new("corrupt");
    std::fs::create_dir_all(file.0.parent().unwrap()).unwrap();
    std::fs::write(&file.0, "{ not json").unwrap();

    assert!(matches!(
        LocalBackend::open(&file.0),
        Err(FocusError::StoreUnavailable(_))
    ));
}

// ---------------------------------------------------------------------------
// Mode selection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn workspace_without_identity_is_local() {
    let config = ClientConfig {
        server_url: Some("http://127.0.0.1:9".into()),
        owner: None,
        data_file: None,
        ..ClientConfig::default()
    };
    let workspace = Workspace::open(&config).unwrap();
    assert!(!workspace.is_synced());
    assert_eq!(workspace.owner(), &OwnerId::guest());

    let task = workspace.add_task("offline").await.unwrap();
    assert_eq!(workspace.list_tasks().await.unwrap(), vec![task]);

    workspace.record_session(None, 15).await.unwrap();
    assert_eq!(workspace.stats().await.unwrap().total_minutes, 15);

    assert!(matches!(
        workspace.subscribe(16).await,
        Err(FocusError::InvalidInput(_))
    ));
}
