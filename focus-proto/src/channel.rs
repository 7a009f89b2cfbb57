//! Event channel wire protocol.
//!
//! Frames exchanged over the per-owner WebSocket are postcard-encoded
//! [`ChannelMessage`] values sent as binary frames. The client's first frame
//! must be [`ChannelMessage::Join`]; the server answers with
//! [`ChannelMessage::Joined`] and from then on only pushes events.

use serde::{Deserialize, Serialize};

use crate::session::FocusSession;
use crate::task::{OwnerId, SyncEvent};

/// Error type for channel encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Messages exchanged between an event-stream client and the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelMessage {
    /// Client joins the channel of the given owner.
    Join {
        /// Owner whose events the client wants.
        owner_id: OwnerId,
    },
    /// Server confirms the subscription.
    Joined {
        /// Owner echoed back for confirmation.
        owner_id: OwnerId,
        /// Number of live connections for the owner, this one included.
        connections: u32,
    },
    /// A task-change notification.
    Event(SyncEvent),
    /// A focus session was recorded by another connection.
    SessionCreated(FocusSession),
    /// Server reports an error condition.
    Error {
        /// Human-readable error description.
        reason: String,
    },
}

/// Encodes a [`ChannelMessage`] into bytes using postcard.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if the message cannot be serialized.
pub fn encode(msg: &ChannelMessage) -> Result<Vec<u8>, CodecError> {
    postcard::to_allocvec(msg).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes a [`ChannelMessage`] from bytes using postcard.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if the bytes cannot be deserialized.
pub fn decode(bytes: &[u8]) -> Result<ChannelMessage, CodecError> {
    postcard::from_bytes(bytes).map_err(|e| CodecError::Serialization(e.to_string()))
}
