use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS logs (
    id        TEXT PRIMARY KEY NOT NULL,      -- UUID v4
    level     TEXT NOT NULL,                  -- error / warn / info
    target    TEXT NOT NULL,
    message   TEXT NOT NULL,
    timestamp INTEGER NOT NULL                -- ms since epoch
);

CREATE INDEX IF NOT EXISTS idx_logs_ts ON logs(timestamp DESC);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
