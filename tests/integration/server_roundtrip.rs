//! End-to-end tests against an in-process server.
//!
//! Each test starts `focus-server` on an ephemeral port and talks to it the
//! way the CLI does: REST through `HttpStore`, events through
//! `EventStream`, and everything together through `Workspace`.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use focus::config::ClientConfig;
use focus::remote::{EventStream, HttpStore, StreamError, follow};
use focus::store::{MemoryStore, SessionLog, SettingsStore, StoreError, TaskStore};
use focus::tasks::TaskBackend;
use focus::workspace::Workspace;
use focus_proto::channel::ChannelMessage;
use focus_proto::settings::SettingsPatch;
use focus_proto::task::{OwnerId, SyncEvent, TaskId, TaskPatch};
use focus_server::state::AppState;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct TestServer {
    base_url: String,
    events_url: String,
    _handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn start() -> Self {
        Self::with_state(AppState::new()).await
    }

    async fn with_state(state: AppState) -> Self {
        let (addr, handle) = focus_server::start_server_with_state("127.0.0.1:0", Arc::new(state))
            .await
            .expect("failed to start test server");
        Self {
            base_url: format!("http://{addr}"),
            events_url: format!("ws://{addr}/ws"),
            _handle: handle,
        }
    }

    fn store(&self) -> HttpStore {
        HttpStore::new(&self.base_url, Duration::from_secs(5)).unwrap()
    }

    async fn join(&self, owner: &str) -> EventStream {
        EventStream::connect(&self.events_url, OwnerId::new(owner), 16)
            .await
            .unwrap()
    }

    fn workspace(&self, owner: &str) -> Workspace {
        let config = ClientConfig {
            server_url: Some(self.base_url.clone()),
            owner: Some(owner.to_string()),
            data_file: None,
            ..ClientConfig::default()
        };
        Workspace::open(&config).unwrap()
    }
}

async fn next_message(stream: &EventStream) -> ChannelMessage {
    tokio::time::timeout(Duration::from_secs(5), stream.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event stream closed")
}

fn alice() -> OwnerId {
    OwnerId::new("alice")
}

// ---------------------------------------------------------------------------
// REST
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_version() {
    let server = TestServer::start().await;
    let health = server.store().health().await.unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
    assert!(!health.timestamp.is_empty());
}

#[tokio::test]
async fn task_crud_over_http() {
    let server = TestServer::start().await;
    let store = server.store();

    let created = store.create(&alice(), "  ship it ").await.unwrap();
    assert_eq!(created.text, "ship it");
    assert_eq!(created.owner_id, alice());

    let updated = store
        .update_partial(&alice(), &created.id, &TaskPatch::done(true))
        .await
        .unwrap();
    assert!(updated.done);
    assert_eq!(store.list_by_owner(&alice()).await.unwrap(), vec![updated]);

    store.delete(&alice(), &created.id).await.unwrap();
    assert!(store.list_by_owner(&alice()).await.unwrap().is_empty());
    assert!(matches!(
        store.delete(&alice(), &created.id).await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn error_statuses_map_back_to_store_errors() {
    let server = TestServer::start().await;
    let store = server.store();

    assert!(matches!(
        store.create(&alice(), "   ").await,
        Err(StoreError::Invalid(_))
    ));
    assert!(matches!(
        store.create(&OwnerId::new(""), "no identity").await,
        Err(StoreError::Unauthenticated)
    ));
    assert!(matches!(
        store
            .update_partial(&alice(), &TaskId::from_string("missing"), &TaskPatch::done(true))
            .await,
        Err(StoreError::NotFound(_))
    ));
    assert!(matches!(
        store
            .update_partial(&alice(), &TaskId::from_string("missing"), &TaskPatch::default())
            .await,
        Err(StoreError::Invalid(_))
    ));
}

#[tokio::test]
async fn ids_with_url_delimiters_do_not_alias_other_tasks() {
    let server = TestServer::start().await;
    let store = server.store();
    let task = store.create(&alice(), "keep me").await.unwrap();

    for suffix in ["#frag", "?x=1", "/extra"] {
        let lookalike = TaskId::from_string(format!("{}{suffix}", task.id));
        assert!(matches!(
            store.delete(&alice(), &lookalike).await,
            Err(StoreError::NotFound(_))
        ));
    }
    assert_eq!(store.list_by_owner(&alice()).await.unwrap(), vec![task]);
}

#[tokio::test]
async fn other_owners_tasks_are_not_found() {
    let server = TestServer::start().await;
    let store = server.store();
    let task = store.create(&alice(), "mine").await.unwrap();
    let bob = OwnerId::new("bob");

    assert!(store.list_by_owner(&bob).await.unwrap().is_empty());
    assert!(matches!(
        store.update_partial(&bob, &task.id, &TaskPatch::done(true)).await,
        Err(StoreError::NotFound(_))
    ));
    assert!(matches!(
        store.delete(&bob, &task.id).await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn sessions_stats_and_settings() {
    let server = TestServer::with_state(AppState::with_store(MemoryStore::new(), 2, 256)).await;
    let store = server.store();

    for minutes in [25, 50, 25] {
        store.append(&alice(), Some("focus"), minutes).await.unwrap();
    }
    assert!(matches!(
        store.append(&alice(), None, 0).await,
        Err(StoreError::Invalid(_))
    ));

    let listed = store.list_sessions(&alice()).await.unwrap();
    assert_eq!(listed.len(), 2, "server caps the session list");
    assert!(listed[0].completed_at >= listed[1].completed_at);

    let stats = store.stats(&alice(), 0).await.unwrap();
    assert_eq!(stats.total_sessions, 3);
    assert_eq!(stats.total_minutes, 100);
    assert_eq!(stats.today_sessions, 3);
    assert_eq!(stats.streak, 1);

    let defaults = store.get_settings(&alice()).await.unwrap();
    assert_eq!(defaults.default_pomodoro, 25);
    let updated = store
        .update_settings(
            &alice(),
            &SettingsPatch {
                short_break: Some(10),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.short_break, 10);
    assert_eq!(store.get_settings(&alice()).await.unwrap(), updated);
}

#[tokio::test]
async fn malformed_bodies_get_json_400() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();

    for (path, body) in [
        ("/api/v1/sessions", r#"{"minutes":-5}"#),
        ("/api/v1/sessions", r#"{"task":"essay"}"#),
        ("/api/v1/tasks", "{ not json"),
    ] {
        let response = client
            .post(format!("{}{path}", server.base_url))
            .header(focus::remote::OWNER_HEADER, "alice")
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST, "{body}");
        let json: serde_json::Value = response.json().await.unwrap();
        assert!(json["error"].is_string(), "{body}: {json}");
    }
}

#[tokio::test]
async fn out_of_range_offset_is_rejected() {
    let server = TestServer::start().await;
    assert!(matches!(
        server.store().stats(&alice(), 100_000).await,
        Err(StoreError::Invalid(_))
    ));
}

// ---------------------------------------------------------------------------
// Event channel
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mutations_are_pushed_to_every_connection() {
    let server = TestServer::start().await;
    let first = server.join("alice").await;
    let second = server.join("alice").await;
    assert_eq!(first.connections_at_join(), 1);
    assert_eq!(second.connections_at_join(), 2);

    let store = server.store();
    let task = store.create(&alice(), "broadcast").await.unwrap();
    for stream in [&first, &second] {
        assert_eq!(
            next_message(stream).await,
            ChannelMessage::Event(SyncEvent::Created(task.clone()))
        );
    }

    store.delete(&alice(), &task.id).await.unwrap();
    let session = store.append(&alice(), None, 25).await.unwrap();
    for stream in [&first, &second] {
        assert_eq!(
            next_message(stream).await,
            ChannelMessage::Event(SyncEvent::Deleted {
                id: task.id.clone()
            })
        );
        assert_eq!(
            next_message(stream).await,
            ChannelMessage::SessionCreated(session.clone())
        );
    }
}

#[tokio::test]
async fn owners_only_hear_their_own_events() {
    let server = TestServer::start().await;
    let bob = server.join("bob").await;

    server.store().create(&alice(), "not for bob").await.unwrap();
    let heard = tokio::time::timeout(Duration::from_millis(200), bob.recv()).await;
    assert!(heard.is_err(), "bob received alice's event");
}

#[tokio::test]
async fn blank_owner_join_is_rejected() {
    let server = TestServer::start().await;
    let result = EventStream::connect(&server.events_url, OwnerId::new(""), 16).await;
    assert!(matches!(result, Err(StreamError::Rejected(_))));
}

// ---------------------------------------------------------------------------
// Workspaces
// ---------------------------------------------------------------------------

#[tokio::test]
async fn two_workspaces_converge_through_the_server() {
    let server = TestServer::start().await;
    let laptop = server.workspace("alice");
    let phone = server.workspace("alice");
    assert!(laptop.is_synced());

    let stream = phone.subscribe(16).await.unwrap();
    let Workspace::Synced { coordinator, .. } = &phone else {
        panic!("expected synced workspace");
    };

    let task = laptop.add_task("sync me").await.unwrap();
    let toggled = laptop.toggle_done(&task.id).await.unwrap();

    let mut seen = Vec::new();
    let (applied, ()) = tokio::join!(
        follow(&stream, coordinator, |msg| seen.push(msg.clone())),
        async {
            for _ in 0..250 {
                if coordinator.view() == vec![toggled.clone()] {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            stream.close().await;
        },
    );

    assert_eq!(applied, 2);
    assert_eq!(
        seen,
        vec![
            ChannelMessage::Event(SyncEvent::Created(task)),
            ChannelMessage::Event(SyncEvent::Updated(toggled.clone())),
        ]
    );
    assert_eq!(coordinator.view(), vec![toggled.clone()]);
    assert_eq!(phone.list_tasks().await.unwrap(), vec![toggled]);
}

#[tokio::test]
async fn synced_sessions_and_stats() {
    let server = TestServer::start().await;
    let workspace = server.workspace("alice");

    workspace.record_session(Some("essay"), 30).await.unwrap();
    workspace.record_session(None, 15).await.unwrap();

    let sessions = workspace.list_sessions(Some(1)).await.unwrap();
    assert_eq!(sessions.len(), 1);

    let stats = workspace.stats().await.unwrap();
    assert_eq!(stats.total_minutes, 45);
    assert_eq!(stats.today_sessions, 2);
}
