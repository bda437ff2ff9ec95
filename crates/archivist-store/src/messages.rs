//! Insert and query operations for archived message revisions.

use archivist_shared::constants::MESSAGES_COLLECTION;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, ErrorCode};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{MessageFilter, MessageRecord};

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a revision under its `revision_key`.
    ///
    /// Revisions are immutable: inserting a key that already exists fails with
    /// [`StoreError::KeyExists`] and leaves the stored document untouched.
    pub fn insert_message(&self, record: &MessageRecord) -> Result<()> {
        let document = serde_json::to_string(record)?;

        let inserted = self.conn().execute(
            &format!(
                "INSERT INTO {MESSAGES_COLLECTION}
                 (revision_key, id, channel_id, guild_id, user_id, timestamp, edited, document)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
            ),
            params![
                record.revision_key,
                record.id,
                record.channel.id,
                record.server.id,
                record.author.id,
                record.timestamp,
                record.edited,
                document,
            ],
        );

        match inserted {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::KeyExists(record.revision_key.clone()))
            }
            Err(other) => Err(StoreError::Sqlite(other)),
        }
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Run a filtered query, newest revision first.
    pub fn query_messages(&self, filter: &MessageFilter) -> Result<Vec<MessageRecord>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        let mut push = |column: &str, value: Value| {
            values.push(value);
            clauses.push(format!("{column} = ?{}", values.len()));
        };

        if let Some(id) = &filter.id {
            push("id", Value::Text(id.clone()));
        }
        if let Some(ts) = filter.timestamp {
            push("timestamp", Value::Integer(ts));
        }
        if let Some(user_id) = &filter.user_id {
            push("user_id", Value::Text(user_id.clone()));
        }
        if let Some(channel_id) = &filter.channel_id {
            push("channel_id", Value::Text(channel_id.clone()));
        }

        let mut sql = format!("SELECT document FROM {MESSAGES_COLLECTION}");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        // SQLite only accepts OFFSET after LIMIT; -1 means unbounded.
        values.push(Value::Integer(filter.limit.map_or(-1, i64::from)));
        values.push(Value::Integer(i64::from(filter.offset)));
        sql.push_str(&format!(
            " ORDER BY timestamp DESC, revision_key ASC LIMIT ?{} OFFSET ?{}",
            values.len() - 1,
            values.len()
        ));

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| row.get::<_, String>(0))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(serde_json::from_str(&row?)?);
        }
        Ok(records)
    }

    /// Fetch a single revision by message ID and timestamp.
    pub fn find_revision(&self, id: &str, timestamp: i64) -> Result<Option<MessageRecord>> {
        Ok(self
            .query_messages(&MessageFilter::revision(id, timestamp))?
            .into_iter()
            .next())
    }

    /// Total number of stored revisions.
    pub fn count_messages(&self) -> Result<u64> {
        let count: i64 = self.conn().query_row(
            &format!("SELECT COUNT(*) FROM {MESSAGES_COLLECTION}"),
            [],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }
}
