//! v001 -- Initial schema creation.
//!
//! Creates the `messages` revision table and the `channels` directory.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Message revisions (one row per id + timestamp)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    revision_key TEXT PRIMARY KEY NOT NULL,   -- "<id>-<timestamp>"
    id           TEXT NOT NULL,               -- platform message id
    channel_id   TEXT NOT NULL,
    guild_id     TEXT NOT NULL,
    user_id      TEXT NOT NULL,
    timestamp    INTEGER NOT NULL,            -- ms since epoch
    edited       INTEGER NOT NULL DEFAULT 0,  -- boolean 0/1
    document     TEXT NOT NULL                -- JSON MessageRecord
);

CREATE INDEX IF NOT EXISTS idx_messages_channel_ts ON messages(channel_id, timestamp DESC);
CREATE INDEX IF NOT EXISTS idx_messages_user_ts ON messages(user_id, timestamp DESC);
CREATE INDEX IF NOT EXISTS idx_messages_id_ts ON messages(id, timestamp);

-- ----------------------------------------------------------------
-- Channels seen by the archive
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS channels (
    id         TEXT PRIMARY KEY NOT NULL,
    name       TEXT NOT NULL,
    guild_id   TEXT NOT NULL,
    guild_name TEXT NOT NULL,
    last_seen  TEXT NOT NULL                  -- RFC-3339
);

CREATE INDEX IF NOT EXISTS idx_channels_guild_id ON channels(guild_id);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
