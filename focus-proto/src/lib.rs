//! Shared data model and wire protocol for Focus.
//!
//! Everything in this crate is plain data: tasks, focus sessions, user
//! settings, and the frames carried on the per-owner event channel.

pub mod channel;
pub mod session;
pub mod settings;
pub mod task;
