//! Focus sync server library.
//!
//! Serves the REST API for tasks, sessions, stats, and settings, plus the
//! `/ws` event channel that pushes each owner's committed changes to all of
//! that owner's live connections. Exposed as a library for tests and
//! embedding.

use std::sync::Arc;

pub mod api;
pub mod channel;
pub mod config;
pub mod state;

use state::AppState;

/// Builds the full application router over `state`.
pub fn app(state: Arc<AppState>) -> axum::Router {
    api::routes()
        .route("/ws", axum::routing::get(channel::ws_handler))
        .with_state(state)
}

/// Starts the server on `addr` with empty state.
///
/// Returns the bound address (useful when binding port 0) and the join
/// handle of the serving task.
///
/// # Errors
///
/// Returns an error if the address cannot be bound.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(AppState::new())).await
}

/// Starts the server on `addr` over existing state.
///
/// # Errors
///
/// Returns an error if the address cannot be bound.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<AppState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;
    let router = app(state);

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "server error");
        }
    });

    Ok((bound_addr, handle))
}
