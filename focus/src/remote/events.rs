//! Client side of the per-owner event channel.
//!
//! [`EventStream::connect`] opens a WebSocket to the server, joins the
//! owner's channel, and spawns a background reader that forwards decoded
//! [`ChannelMessage`]s into a bounded queue. Delivery is at-most-once and
//! nothing is replayed: after a reconnect the caller must re-list.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use focus_proto::channel::{self, ChannelMessage};
use focus_proto::task::OwnerId;

use crate::store::TaskStore;
use crate::tasks::SyncCoordinator;

type WsSender = futures_util::stream::SplitSink<
    WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;

type WsReader =
    futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>>;

/// Bound on establishing the WebSocket connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Bound on waiting for the `Joined` acknowledgment.
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Default capacity of the incoming message queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Errors from opening or using an event stream.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("connection timed out")]
    Timeout,
    #[error("server unreachable: {0}")]
    Unreachable(String),
    #[error("join rejected: {0}")]
    Rejected(String),
    #[error("connection closed")]
    Closed,
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// A joined subscription to one owner's event channel.
pub struct EventStream {
    owner: OwnerId,
    connections: u32,
    sink: Mutex<WsSender>,
    incoming: Mutex<mpsc::Receiver<ChannelMessage>>,
    reader: tokio::task::JoinHandle<()>,
}

impl EventStream {
    /// Connects to `url` and joins `owner`'s channel.
    ///
    /// # Errors
    ///
    /// - [`StreamError::Timeout`] if connecting or joining takes too long.
    /// - [`StreamError::Unreachable`] if the WebSocket cannot be opened.
    /// - [`StreamError::Rejected`] if the server refuses the join.
    pub async fn connect(
        url: &str,
        owner: OwnerId,
        capacity: usize,
    ) -> Result<Self, StreamError> {
        let (ws_stream, _response) = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(url))
            .await
            .map_err(|_| {
                tracing::warn!(url, "event stream connect timed out");
                StreamError::Timeout
            })?
            .map_err(|e| {
                tracing::warn!(url, error = %e, "event stream connect failed");
                StreamError::Unreachable(e.to_string())
            })?;

        let (mut sink, mut reader) = ws_stream.split();

        let join = channel::encode(&ChannelMessage::Join {
            owner_id: owner.clone(),
        })
        .map_err(|e| StreamError::Protocol(e.to_string()))?;
        sink.send(Message::Binary(join.into()))
            .await
            .map_err(|e| StreamError::Unreachable(format!("failed to send Join: {e}")))?;

        let ack = tokio::time::timeout(JOIN_TIMEOUT, reader.next())
            .await
            .map_err(|_| {
                tracing::warn!(url, "join acknowledgment timed out");
                StreamError::Timeout
            })?;
        let connections = match ack {
            Some(Ok(Message::Binary(data))) => match channel::decode(&data) {
                Ok(ChannelMessage::Joined { connections, .. }) => connections,
                Ok(ChannelMessage::Error { reason }) => return Err(StreamError::Rejected(reason)),
                Ok(other) => {
                    return Err(StreamError::Protocol(format!(
                        "unexpected response to Join: {other:?}"
                    )));
                }
                Err(e) => return Err(StreamError::Protocol(e.to_string())),
            },
            Some(Ok(Message::Close(_))) | None => return Err(StreamError::Closed),
            Some(Ok(_)) => {
                return Err(StreamError::Protocol(
                    "unexpected non-binary frame during join".to_string(),
                ));
            }
            Some(Err(e)) => return Err(StreamError::Unreachable(e.to_string())),
        };
        tracing::info!(owner = %owner, url, connections, "joined event channel");

        let (tx, rx) = mpsc::channel(capacity.max(1));
        let reader = tokio::spawn(reader_loop(reader, tx));

        Ok(Self {
            owner,
            connections,
            sink: Mutex::new(sink),
            incoming: Mutex::new(rx),
            reader,
        })
    }

    /// The owner whose channel this stream joined.
    #[must_use]
    pub const fn owner(&self) -> &OwnerId {
        &self.owner
    }

    /// Live connections for the owner when this stream joined, itself
    /// included.
    #[must_use]
    pub const fn connections_at_join(&self) -> u32 {
        self.connections
    }

    /// Waits for the next message. `None` once the connection is gone and
    /// the queue is drained.
    pub async fn recv(&self) -> Option<ChannelMessage> {
        self.incoming.lock().await.recv().await
    }

    /// Sends a close frame.
    pub async fn close(&self) {
        if let Err(e) = self.sink.lock().await.close().await {
            tracing::debug!(error = %e, "close frame not sent");
        }
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Forwards decoded messages until the socket closes or the queue's
/// receiver is gone. Malformed frames are skipped.
async fn reader_loop(
    mut reader: WsReader,
    tx: mpsc::Sender<ChannelMessage>,
) {
    while let Some(frame) = reader.next().await {
        match frame {
            Ok(Message::Binary(data)) => match channel::decode(&data) {
                Ok(ChannelMessage::Error { reason }) => {
                    tracing::warn!(reason = %reason, "server reported error on event channel");
                }
                Ok(msg) => {
                    if tx.send(msg).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "malformed event frame, skipping");
                }
            },
            Ok(Message::Close(_)) => {
                tracing::info!("event channel closed by server");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "event channel read error");
                break;
            }
        }
    }
}

/// Applies task events from `stream` to `coordinator` until the stream
/// ends. Every message is also handed to `observe`. Returns the number of
/// events that changed the coordinator's view.
pub async fn follow<S: TaskStore>(
    stream: &EventStream,
    coordinator: &SyncCoordinator<S>,
    mut observe: impl FnMut(&ChannelMessage),
) -> usize {
    let mut applied = 0;
    while let Some(msg) = stream.recv().await {
        if let ChannelMessage::Event(event) = &msg
            && coordinator.apply_event(event)
        {
            applied += 1;
        }
        observe(&msg);
    }
    tracing::info!(owner = %stream.owner(), applied, "event stream ended");
    applied
}
