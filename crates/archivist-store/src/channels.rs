//! The channel directory: every channel the archive has stored a message from.

use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::database::Database;
use crate::error::Result;
use crate::models::{ChannelEntry, MessageRecord};

impl Database {
    // ------------------------------------------------------------------
    // Upsert
    // ------------------------------------------------------------------

    /// Record the channel and guild of `record`, refreshing names that may
    /// have changed since the channel was last seen.
    pub fn touch_channel(&self, record: &MessageRecord, seen_at: DateTime<Utc>) -> Result<()> {
        self.conn().execute(
            "INSERT INTO channels (id, name, guild_id, guild_name, last_seen)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 guild_id = excluded.guild_id,
                 guild_name = excluded.guild_name,
                 last_seen = excluded.last_seen",
            params![
                record.channel.id,
                record.channel.name,
                record.server.id,
                record.server.name,
                seen_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// List all known channels, grouped by guild and ordered by name.
    pub fn list_channels(&self) -> Result<Vec<ChannelEntry>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, name, guild_id, guild_name, last_seen
             FROM channels
             ORDER BY guild_name ASC, name ASC",
        )?;

        let rows = stmt.query_map([], row_to_channel)?;

        let mut channels = Vec::new();
        for row in rows {
            channels.push(row?);
        }
        Ok(channels)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`ChannelEntry`].
fn row_to_channel(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChannelEntry> {
    let last_seen_str: String = row.get(4)?;

    let last_seen: DateTime<Utc> = DateTime::parse_from_rfc3339(&last_seen_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(ChannelEntry {
        id: row.get(0)?,
        name: row.get(1)?,
        guild_id: row.get(2)?,
        guild_name: row.get(3)?,
        last_seen,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use archivist_shared::mentions::MentionIndex;
    use archivist_shared::record::{AuthorRecord, ChannelRef, ServerRef};

    use super::*;

    fn record_in(channel_id: &str, channel_name: &str, guild_id: &str) -> MessageRecord {
        MessageRecord {
            id: "1".into(),
            revision_key: "1-1".into(),
            content: String::new(),
            raw_content: String::new(),
            raw_clean_content: String::new(),
            channel: ChannelRef {
                id: channel_id.into(),
                name: channel_name.into(),
            },
            server: ServerRef {
                id: guild_id.into(),
                name: format!("guild {guild_id}"),
            },
            author: AuthorRecord {
                id: "7".into(),
                name: "Ann".into(),
                discriminator: "0001".into(),
                avatar: None,
                bot: false,
                created_at: 0,
            },
            mentions: MentionIndex::default(),
            attachments: BTreeMap::new(),
            timestamp: 1,
            edited: false,
        }
    }

    #[test]
    fn touch_inserts_then_renames() {
        let db = Database::open_in_memory().unwrap();
        db.touch_channel(&record_in("9", "general", "1"), Utc::now())
            .unwrap();
        db.touch_channel(&record_in("9", "lounge", "1"), Utc::now())
            .unwrap();
        db.touch_channel(&record_in("10", "random", "2"), Utc::now())
            .unwrap();

        let channels = db.list_channels().unwrap();
        assert_eq!(channels.len(), 2);

        let nine = channels.iter().find(|c| c.id == "9").unwrap();
        assert_eq!(nine.name, "lounge");
        assert_eq!(nine.guild_name, "guild 1");
    }
}
