//! # banter-store
//!
//! Relational storage for the Banter server, backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed helpers for every domain
//! model: workspaces, memberships, channels, messages (with keyset cursor
//! pagination), and bearer-token sessions.

pub mod channels;
pub mod database;
pub mod messages;
pub mod migrations;
pub mod sessions;
pub mod workspaces;

mod error;

pub use database::Database;
pub use error::StoreError;
