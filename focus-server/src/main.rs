//! `focus-server`: REST API and event channel for Focus synced mode.
//!
//! Keeps all data in memory; restarting the server starts from empty.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:8080
//! cargo run --bin focus-server
//!
//! # Run on custom address
//! cargo run --bin focus-server -- --bind 127.0.0.1:3000
//!
//! # Or via environment variable
//! FOCUS_BIND=127.0.0.1:3000 cargo run --bin focus-server
//! ```

use std::sync::Arc;

use clap::Parser;
use focus_server::config::{ServerCliArgs, ServerConfig};
use focus_server::state::AppState;

#[tokio::main]
async fn main() {
    let cli = ServerCliArgs::parse();

    let config = match ServerConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(
        addr = %config.bind_addr,
        session_list_limit = config.session_list_limit,
        "starting focus server"
    );

    let state = Arc::new(AppState::from_config(&config));

    match focus_server::start_server_with_state(&config.bind_addr, state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "focus server listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start focus server");
            std::process::exit(1);
        }
    }
}
