//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Thread-Mirror database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One serialized record per mirrored thread
CREATE TABLE IF NOT EXISTS threads (
    thread_id INTEGER PRIMARY KEY,
    forum_id INTEGER NOT NULL,
    post_count INTEGER NOT NULL,
    snapshot_count INTEGER NOT NULL,
    updated_at TEXT NOT NULL,
    record BLOB NOT NULL
);

-- Ledger of finished crawl passes
CREATE TABLE IF NOT EXISTS passes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL,
    forums_total INTEGER NOT NULL,
    forums_failed INTEGER NOT NULL,
    threads_seen INTEGER NOT NULL,
    posts_appended INTEGER NOT NULL
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.pragma_update(None, "user_version", get_schema_version())?;
    Ok(())
}

/// Gets the current schema version
pub fn get_schema_version() -> u32 {
    1
}
