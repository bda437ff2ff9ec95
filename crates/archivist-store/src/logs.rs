use archivist_shared::constants::LOGS_COLLECTION;
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::Result;
use crate::models::LogEntry;

impl Database {
    pub fn insert_log(&self, level: &str, target: &str, message: &str, timestamp: i64) -> Result<LogEntry> {
        let entry = LogEntry {
            id: Uuid::new_v4().to_string(),
            level: level.to_string(),
            target: target.to_string(),
            message: message.to_string(),
            timestamp,
        };

        self.conn().execute(
            &format!(
                "INSERT INTO {LOGS_COLLECTION} (id, level, target, message, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)"
            ),
            params![entry.id, entry.level, entry.target, entry.message, entry.timestamp],
        )?;

        Ok(entry)
    }

    /// Most recent log entries first.
    pub fn recent_logs(&self, limit: u32) -> Result<Vec<LogEntry>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT id, level, target, message, timestamp FROM {LOGS_COLLECTION}
             ORDER BY timestamp DESC LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(LogEntry {
                id: row.get(0)?,
                level: row.get(1)?,
                target: row.get(2)?,
                message: row.get(3)?,
                timestamp: row.get(4)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Delete everything but the `keep` newest entries. Returns the number of
    /// rows removed.
    pub fn prune_logs(&self, keep: u32) -> Result<usize> {
        let removed = self.conn().execute(
            &format!(
                "DELETE FROM {LOGS_COLLECTION} WHERE id NOT IN
                 (SELECT id FROM {LOGS_COLLECTION} ORDER BY timestamp DESC, id DESC LIMIT ?1)"
            ),
            params![keep],
        )?;
        Ok(removed)
    }
}
