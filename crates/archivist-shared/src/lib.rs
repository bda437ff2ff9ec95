//! # archivist-shared
//!
//! Types shared by the archivist crates: the inbound chat event accepted at
//! the process boundary, the archived [`MessageRecord`], revision keys, and
//! the mention rewriter that turns platform tokens into readable text.

pub mod constants;
pub mod error;
pub mod event;
pub mod mentions;
pub mod record;
pub mod types;

pub use error::EventError;
pub use event::{ChatEvent, ChatMessage};
pub use record::MessageRecord;
pub use types::RevisionKey;
