//! # archivist-store
//!
//! Persistent archive backed by SQLite, used as a key-addressed document
//! store. Message revisions are stored as JSON documents alongside the few
//! columns that queries filter and order on. The crate exposes a synchronous
//! [`Database`] handle wrapping a `rusqlite::Connection`; callers that live
//! on an async runtime are expected to move calls onto a blocking thread.

pub mod channels;
pub mod database;
pub mod logs;
pub mod messages;
pub mod migrations;
pub mod models;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
