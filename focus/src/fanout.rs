//! Per-owner event fan-out.
//!
//! [`FanoutHub`] keeps, for every owner, the set of live connections and the
//! sender half of each connection's event queue. Publishing broadcasts to
//! the subscriber set as it is at call time. Delivery is best-effort and
//! at-most-once: there is no durable queue and nothing is replayed on
//! reconnect, so a reconnecting client must re-list to catch up.
//!
//! The subscriber map is the only shared mutable structure in the sync core.
//! It sits behind a [`parking_lot::RwLock`] that is never held across an
//! await point, so connect, disconnect, and publish are safe to call from
//! any task at any time.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::{Mutex, mpsc};

use focus_proto::task::{OwnerId, SyncEvent};

/// Identifies one live connection within the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

type Subscribers<M> = HashMap<ConnectionId, mpsc::UnboundedSender<M>>;

/// Broadcast hub keyed by owner.
///
/// Generic over the message type so the server can push its own channel
/// frames while in-process coordinators exchange bare [`SyncEvent`]s.
pub struct FanoutHub<M = SyncEvent> {
    channels: RwLock<HashMap<OwnerId, Subscribers<M>>>,
    next_id: AtomicU64,
}

impl<M> Default for FanoutHub<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> FanoutHub<M> {
    /// Creates a hub with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocates a fresh connection id.
    pub fn next_connection_id(&self) -> ConnectionId {
        ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Adds a connection to the owner's subscriber set.
    ///
    /// If the connection id was already subscribed, its old sender is
    /// replaced and returned.
    pub fn subscribe(
        &self,
        owner: &OwnerId,
        connection: ConnectionId,
        sender: mpsc::UnboundedSender<M>,
    ) -> Option<mpsc::UnboundedSender<M>> {
        let previous = self
            .channels
            .write()
            .entry(owner.clone())
            .or_default()
            .insert(connection, sender);
        tracing::debug!(owner = %owner, connection = %connection, "subscribed");
        previous
    }

    /// Removes a connection. Returns `true` if it was subscribed.
    pub fn unsubscribe(&self, owner: &OwnerId, connection: ConnectionId) -> bool {
        let mut channels = self.channels.write();
        let Some(subscribers) = channels.get_mut(owner) else {
            return false;
        };
        let removed = subscribers.remove(&connection).is_some();
        if subscribers.is_empty() {
            channels.remove(owner);
        }
        drop(channels);
        if removed {
            tracing::debug!(owner = %owner, connection = %connection, "unsubscribed");
        }
        removed
    }

    /// Number of live connections for an owner.
    pub fn connection_count(&self, owner: &OwnerId) -> usize {
        self.channels.read().get(owner).map_or(0, HashMap::len)
    }

    /// Number of owners with at least one live connection.
    pub fn owner_count(&self) -> usize {
        self.channels.read().len()
    }
}

impl<M: Clone> FanoutHub<M> {
    /// Broadcasts a message to every connection of `owner`, optionally
    /// skipping `except`. Returns the number of connections reached.
    ///
    /// Connections whose receiver has gone away are pruned.
    pub fn publish(&self, owner: &OwnerId, message: &M, except: Option<ConnectionId>) -> usize {
        let targets: Vec<(ConnectionId, mpsc::UnboundedSender<M>)> = {
            let channels = self.channels.read();
            let Some(subscribers) = channels.get(owner) else {
                return 0;
            };
            subscribers
                .iter()
                .filter(|(id, _)| Some(**id) != except)
                .map(|(id, tx)| (*id, tx.clone()))
                .collect()
        };

        let mut delivered = 0;
        for (connection, sender) in targets {
            if sender.send(message.clone()).is_ok() {
                delivered += 1;
            } else {
                tracing::warn!(owner = %owner, connection = %connection, "dropping closed subscriber");
                self.unsubscribe(owner, connection);
            }
        }
        delivered
    }
}

impl<M: Send + 'static> FanoutHub<M> {
    /// Subscribes a new connection and returns a guard that owns it.
    ///
    /// The connection is unsubscribed when the [`Subscription`] is dropped.
    pub fn attach(self: &Arc<Self>, owner: &OwnerId) -> Subscription<M> {
        let id = self.next_connection_id();
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribe(owner, id, tx);
        Subscription {
            hub: Arc::clone(self),
            owner: owner.clone(),
            id,
            rx: Mutex::new(rx),
        }
    }
}

/// A live connection to one owner's channel.
///
/// Holds the receiving end of the connection's event queue and a handle to
/// the hub for publishing. Dropping it disconnects.
pub struct Subscription<M = SyncEvent> {
    hub: Arc<FanoutHub<M>>,
    owner: OwnerId,
    id: ConnectionId,
    rx: Mutex<mpsc::UnboundedReceiver<M>>,
}

impl<M> Subscription<M> {
    /// The owner this connection belongs to.
    #[must_use]
    pub const fn owner(&self) -> &OwnerId {
        &self.owner
    }

    /// This connection's id.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Waits for the next message.
    pub async fn recv(&self) -> Option<M> {
        self.rx.lock().await.recv().await
    }

    /// Returns a queued message without waiting, if one is ready and no
    /// other task is currently receiving.
    pub fn try_recv(&self) -> Option<M> {
        self.rx.try_lock().ok()?.try_recv().ok()
    }
}

impl<M: Clone> Subscription<M> {
    /// Publishes to every other connection of the same owner.
    pub fn publish_to_siblings(&self, message: &M) -> usize {
        self.hub.publish(&self.owner, message, Some(self.id))
    }
}

impl<M> Drop for Subscription<M> {
    fn drop(&mut self) {
        self.hub.unsubscribe(&self.owner, self.id);
    }
}
