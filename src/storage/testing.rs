//! Store doubles used by unit tests

use crate::storage::{
    PassRecord, PersistedThread, SqliteStorage, StorageError, StorageResult, StoreStats,
    ThreadStore,
};
use std::collections::HashSet;

/// In-memory store whose `put` fails for selected thread ids
pub struct FailingStore {
    pub inner: SqliteStorage,
    pub failing_puts: HashSet<u64>,
    pub fail_gets: bool,
}

impl FailingStore {
    pub fn new(failing_puts: impl IntoIterator<Item = u64>) -> Self {
        Self {
            inner: SqliteStorage::new_in_memory().unwrap(),
            failing_puts: failing_puts.into_iter().collect(),
            fail_gets: false,
        }
    }
}

impl ThreadStore for FailingStore {
    fn get(&self, thread_id: u64) -> StorageResult<Option<PersistedThread>> {
        if self.fail_gets {
            return Err(StorageError::Database("disk I/O error".to_string()));
        }
        self.inner.get(thread_id)
    }

    fn put(&mut self, thread: &PersistedThread) -> StorageResult<()> {
        if self.failing_puts.contains(&thread.thread_id) {
            return Err(StorageError::Database("database is locked".to_string()));
        }
        self.inner.put(thread)
    }

    fn record_pass(&mut self, pass: &PassRecord) -> StorageResult<()> {
        self.inner.record_pass(pass)
    }

    fn recent_passes(&self, limit: usize) -> StorageResult<Vec<PassRecord>> {
        self.inner.recent_passes(limit)
    }

    fn stats(&self, max_snapshots: u32) -> StorageResult<StoreStats> {
        self.inner.stats(max_snapshots)
    }

    fn close(self) -> StorageResult<()> {
        self.inner.close()
    }
}
