//! Shared server state: the authoritative store and the per-owner hub.

use focus::fanout::FanoutHub;
use focus::store::MemoryStore;
use focus_proto::channel::ChannelMessage;
use focus_proto::task::{MAX_TASK_TEXT_LENGTH, OwnerId, SyncEvent};

use crate::config::ServerConfig;

/// Default number of sessions listed per request.
const DEFAULT_SESSION_LIST_LIMIT: usize = 100;

/// State shared by every HTTP handler and WebSocket connection.
pub struct AppState {
    /// Authoritative tasks, sessions, and settings.
    pub store: MemoryStore,
    /// Live event-channel connections, keyed by owner.
    pub hub: FanoutHub<ChannelMessage>,
    session_list_limit: usize,
    max_text_length: usize,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    /// Creates empty state with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new(), DEFAULT_SESSION_LIST_LIMIT, MAX_TASK_TEXT_LENGTH)
    }

    /// Creates state from resolved configuration.
    #[must_use]
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::with_store(
            MemoryStore::new(),
            config.session_list_limit,
            config.max_text_length,
        )
    }

    /// Creates state around an existing store.
    #[must_use]
    pub fn with_store(store: MemoryStore, session_list_limit: usize, max_text_length: usize) -> Self {
        Self {
            store,
            hub: FanoutHub::new(),
            session_list_limit,
            max_text_length: max_text_length.min(MAX_TASK_TEXT_LENGTH),
        }
    }

    /// Maximum number of sessions listed per request.
    #[must_use]
    pub const fn session_list_limit(&self) -> usize {
        self.session_list_limit
    }

    /// Maximum accepted task text length in characters.
    #[must_use]
    pub const fn max_text_length(&self) -> usize {
        self.max_text_length
    }

    /// Broadcasts a committed task change to every connection of `owner`.
    pub fn publish_event(&self, owner: &OwnerId, event: SyncEvent) -> usize {
        let name = event.name();
        let reached = self.hub.publish(owner, &ChannelMessage::Event(event), None);
        tracing::debug!(owner = %owner, event = name, reached, "event published");
        reached
    }
}
