//! Row types and query descriptions for the archive tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use archivist_shared::record::MessageRecord;

// ---------------------------------------------------------------------------
// Message filter
// ---------------------------------------------------------------------------

/// Equality filters over message revisions, combined with AND.
///
/// Results are always ordered by `timestamp` descending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageFilter {
    pub id: Option<String>,
    pub timestamp: Option<i64>,
    pub user_id: Option<String>,
    pub channel_id: Option<String>,
    /// `None` means no limit.
    pub limit: Option<u32>,
    pub offset: u32,
}

impl MessageFilter {
    /// Exact match on a single revision.
    pub fn revision(id: impl Into<String>, timestamp: i64) -> Self {
        Self {
            id: Some(id.into()),
            timestamp: Some(timestamp),
            limit: Some(1),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Channel directory
// ---------------------------------------------------------------------------

/// A channel the archive has stored at least one message from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelEntry {
    pub id: String,
    pub name: String,
    pub guild_id: String,
    pub guild_name: String,
    pub last_seen: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Log entries
// ---------------------------------------------------------------------------

/// A log line mirrored into the archive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogEntry {
    pub id: String,
    pub level: String,
    pub target: String,
    pub message: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}
