//! # banter-client
//!
//! Channel-view state management for Banter: a per-channel page cache with
//! cursor pagination, a pure projector that flattens cached pages into the
//! chronological message list, a scroll anchor state machine that keeps the
//! viewport stable while history loads, and an optimistic send coordinator
//! that splices provisional messages and reconciles them against the
//! server's answer.
//!
//! The crate is UI-framework neutral: the embedding view reports discrete
//! events (scroll offsets, content-height changes, submits) and executes
//! the [`scroll::ScrollEffect`]s it gets back.

pub mod cache;
pub mod scroll;
pub mod send;
pub mod session;
pub mod store;
pub mod upload;
pub mod view;

mod error;

pub use cache::{PageCache, PagedCollection};
pub use error::ClientError;
pub use scroll::{ScrollAnchor, ScrollConfig, ScrollEffect, Viewport};
pub use send::{PendingSend, SendCoordinator};
pub use session::ChannelSession;
pub use store::{HttpStore, MessageStore};
pub use upload::AttachmentUpload;
