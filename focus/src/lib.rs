//! Focus: task list sync and focus-session statistics.
//!
//! The library holds the two pieces with real coordination logic: the task
//! [`tasks::SyncCoordinator`] (optimistic mutation, authoritative
//! reconciliation, per-owner fan-out) and the [`stats`] aggregator. Local
//! mode ([`tasks::LocalBackend`]) and synced mode share one backend trait so
//! callers pick a mode once per session via [`workspace::Workspace`].

pub mod config;
pub mod error;
pub mod fanout;
pub mod remote;
pub mod stats;
pub mod store;
pub mod tasks;
pub mod workspace;

pub use error::FocusError;
