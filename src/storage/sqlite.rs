//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the ThreadStore trait.
//! SQLite is used as a plain key-value engine here: the `threads` table maps a
//! thread id to one JSON-encoded [`PersistedThread`].

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{StorageError, StorageResult, ThreadStore};
use crate::storage::{PassRecord, PersistedThread, StoreStats};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the database at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // WAL lets `--show`/`--stats` read while a crawl is writing
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

impl ThreadStore for SqliteStorage {
    // ===== Thread Records =====

    fn get(&self, thread_id: u64) -> StorageResult<Option<PersistedThread>> {
        // A single statement runs in its own implicit transaction, so the
        // blob read here is always a complete earlier write.
        let blob: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT record FROM threads WHERE thread_id = ?1",
                params![thread_id as i64],
                |row| row.get(0),
            )
            .optional()?;

        match blob {
            Some(bytes) => {
                let thread = serde_json::from_slice(&bytes)
                    .map_err(|source| StorageError::Serialization { thread_id, source })?;
                Ok(Some(thread))
            }
            None => Ok(None),
        }
    }

    fn put(&mut self, thread: &PersistedThread) -> StorageResult<()> {
        if thread.is_placeholder() {
            return Err(StorageError::Database(
                "refusing to store a record with thread id 0".to_string(),
            ));
        }

        let bytes = serde_json::to_vec(thread).map_err(|source| StorageError::Serialization {
            thread_id: thread.thread_id,
            source,
        })?;
        let now = Utc::now().to_rfc3339();

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO threads
             (thread_id, forum_id, post_count, snapshot_count, updated_at, record)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                thread.thread_id as i64,
                thread.forum_id as i64,
                thread.posts.len() as i64,
                thread.snapshots.len() as i64,
                now,
                bytes,
            ],
        )?;
        tx.commit()?;

        Ok(())
    }

    // ===== Pass Ledger =====

    fn record_pass(&mut self, pass: &PassRecord) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO passes
             (started_at, finished_at, forums_total, forums_failed, threads_seen, posts_appended)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                pass.started_at.to_rfc3339(),
                pass.finished_at.to_rfc3339(),
                pass.forums_total,
                pass.forums_failed,
                pass.threads_seen as i64,
                pass.posts_appended as i64,
            ],
        )?;
        Ok(())
    }

    fn recent_passes(&self, limit: usize) -> StorageResult<Vec<PassRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT started_at, finished_at, forums_total, forums_failed, threads_seen, posts_appended
             FROM passes ORDER BY id DESC LIMIT ?1",
        )?;

        let passes = stmt
            .query_map(params![limit as i64], |row| {
                Ok(PassRecord {
                    started_at: parse_timestamp(0, &row.get::<_, String>(0)?)?,
                    finished_at: parse_timestamp(1, &row.get::<_, String>(1)?)?,
                    forums_total: row.get(2)?,
                    forums_failed: row.get(3)?,
                    threads_seen: row.get::<_, i64>(4)? as u64,
                    posts_appended: row.get::<_, i64>(5)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(passes)
    }

    // ===== Statistics =====

    fn stats(&self, max_snapshots: u32) -> StorageResult<StoreStats> {
        let (threads, posts): (i64, Option<i64>) = self.conn.query_row(
            "SELECT COUNT(*), SUM(post_count) FROM threads",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let frozen_threads: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM threads WHERE snapshot_count >= ?1",
            params![max_snapshots],
            |row| row.get(0),
        )?;

        Ok(StoreStats {
            threads: threads as u64,
            posts: posts.unwrap_or(0) as u64,
            frozen_threads: frozen_threads as u64,
        })
    }

    // ===== Lifecycle =====

    fn close(self) -> StorageResult<()> {
        self.conn.close().map_err(|(_, e)| StorageError::Sqlite(e))
    }
}

fn parse_timestamp(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}
