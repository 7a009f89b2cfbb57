//! Event channel: one WebSocket per client connection.
//!
//! A client opens `/ws`, sends [`ChannelMessage::Join`] with its owner id,
//! and receives [`ChannelMessage::Joined`]. From then on the connection is
//! push-only: every committed change to the owner's tasks or sessions is
//! delivered as a binary frame. Frames the client sends after joining are
//! ignored.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use focus_proto::channel::{self, ChannelMessage};
use focus_proto::task::OwnerId;
use tokio::sync::mpsc;

use crate::state::AppState;

/// Why a connection never completed its join.
enum JoinRefusal {
    /// The socket closed or sent something other than `Join`.
    Closed,
    /// The join was malformed; the reason is sent back before closing.
    Invalid(String),
}

pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drives one event-channel connection until either side goes away.
pub async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let owner = match wait_for_join(&mut ws_receiver).await {
        Ok(owner) => owner,
        Err(JoinRefusal::Closed) => {
            tracing::warn!("connection closed before join");
            return;
        }
        Err(JoinRefusal::Invalid(reason)) => {
            tracing::warn!(reason = %reason, "join refused");
            let _ = send_channel_msg(&mut ws_sender, &ChannelMessage::Error { reason }).await;
            return;
        }
    };

    let connection = state.hub.next_connection_id();
    let (tx, mut rx) = mpsc::unbounded_channel::<ChannelMessage>();
    state.hub.subscribe(&owner, connection, tx);

    let connections = u32::try_from(state.hub.connection_count(&owner)).unwrap_or(u32::MAX);
    let ack = ChannelMessage::Joined {
        owner_id: owner.clone(),
        connections,
    };
    if let Err(e) = send_channel_msg(&mut ws_sender, &ack).await {
        tracing::error!(owner = %owner, error = %e, "failed to send Joined ack");
        state.hub.unsubscribe(&owner, connection);
        return;
    }

    tracing::info!(owner = %owner, connection = %connection, connections, "connection joined");

    // Events published between subscribe and the ack wait in `rx`, so the
    // ack is always the first frame.
    let writer_owner = owner.clone();
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = send_channel_msg(&mut ws_sender, &msg).await {
                tracing::warn!(owner = %writer_owner, error = %e, "event write failed");
                break;
            }
        }
    });

    let reader_owner = owner.clone();
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Close(_) => {
                    tracing::debug!(owner = %reader_owner, "received close frame");
                    break;
                }
                Message::Binary(_) | Message::Text(_) => {
                    tracing::debug!(owner = %reader_owner, "ignoring client frame after join");
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    state.hub.unsubscribe(&owner, connection);
    tracing::info!(owner = %owner, connection = %connection, "connection left");
}

async fn wait_for_join(
    receiver: &mut (impl StreamExt<Item = Result<Message, axum::Error>> + Unpin),
) -> Result<OwnerId, JoinRefusal> {
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Binary(data) => {
                return match channel::decode(&data) {
                    Ok(ChannelMessage::Join { owner_id }) if owner_id.is_blank() => {
                        Err(JoinRefusal::Invalid("owner id is required".to_string()))
                    }
                    Ok(ChannelMessage::Join { owner_id }) => Ok(owner_id),
                    Ok(other) => {
                        tracing::warn!(msg = ?other, "expected Join, got different message");
                        Err(JoinRefusal::Invalid("expected join".to_string()))
                    }
                    Err(e) => Err(JoinRefusal::Invalid(format!("malformed join: {e}"))),
                };
            }
            Message::Close(_) => return Err(JoinRefusal::Closed),
            // ping/pong
            _ => {}
        }
    }
    Err(JoinRefusal::Closed)
}

async fn send_channel_msg(
    ws_sender: &mut (impl SinkExt<Message, Error = axum::Error> + Unpin),
    msg: &ChannelMessage,
) -> Result<(), String> {
    let bytes = channel::encode(msg).map_err(|e| e.to_string())?;
    ws_sender
        .send(Message::Binary(bytes.into()))
        .await
        .map_err(|e| format!("WebSocket send error: {e}"))
}
