//! Clients for a remote synced-mode server.
//!
//! - [`HttpStore`]: the store interfaces over the server's REST routes.
//! - [`EventStream`]: the owner's event channel over a WebSocket.

pub mod events;
pub mod http;

pub use events::{EventStream, StreamError, follow};
pub use http::{Health, HttpStore, OWNER_HEADER};
