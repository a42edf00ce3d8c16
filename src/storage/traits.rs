//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{PassRecord, PersistedThread, StoreStats};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error for thread {thread_id}: {source}")]
    Serialization {
        thread_id: u64,
        source: serde_json::Error,
    },

    #[error("Thread store lock poisoned")]
    LockPoisoned,

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for thread store backends
///
/// Every `get` and `put` is atomic on its own: a reader sees either the
/// previous full record or the new full record. Nothing spans two calls, so a
/// read-modify-write sequence must be serialized by the caller.
pub trait ThreadStore {
    // ===== Thread Records =====

    /// Loads the record for `thread_id`
    ///
    /// A thread that was never stored yields `Ok(None)`; errors are reserved
    /// for I/O and decode failures.
    fn get(&self, thread_id: u64) -> StorageResult<Option<PersistedThread>>;

    /// Replaces the record stored under `thread.thread_id`
    fn put(&mut self, thread: &PersistedThread) -> StorageResult<()>;

    // ===== Pass Ledger =====

    /// Appends a finished pass to the ledger
    fn record_pass(&mut self, pass: &PassRecord) -> StorageResult<()>;

    /// Returns the most recent passes, newest first
    fn recent_passes(&self, limit: usize) -> StorageResult<Vec<PassRecord>>;

    // ===== Statistics =====

    /// Counts threads and posts, treating `max_snapshots` as the freeze cap
    fn stats(&self, max_snapshots: u32) -> StorageResult<StoreStats>;

    // ===== Lifecycle =====

    /// Releases the underlying handle
    fn close(self) -> StorageResult<()>
    where
        Self: Sized;
}
