//! Async handle over the SQLite archive.
//!
//! `rusqlite::Connection` is not `Sync`, so the [`Database`] sits behind a
//! mutex and every call runs on the blocking pool.

use std::sync::{Arc, Mutex, PoisonError};

use archivist_shared::record::MessageRecord;
use archivist_shared::types::RevisionKey;
use archivist_store::{ChannelEntry, Database, MessageFilter, StoreError};
use chrono::Utc;
use thiserror::Error;

use crate::snapshot::WRITE_TIMEOUT;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Store write timed out")]
    Timeout,
}

#[derive(Clone)]
pub struct Archive {
    db: Arc<Mutex<Database>>,
}

impl Archive {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    async fn run<T, F>(&self, f: F) -> Result<T, ArchiveError>
    where
        F: FnOnce(&Database) -> archivist_store::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        let result = tokio::task::spawn_blocking(move || {
            let guard = db.lock().unwrap_or_else(PoisonError::into_inner);
            f(&*guard)
        })
        .await?;
        Ok(result?)
    }

    /// Insert one revision and refresh its channel in the directory.
    pub async fn store_revision(&self, record: MessageRecord) -> Result<(), ArchiveError> {
        let write = self.run(move |db| {
            db.insert_message(&record)?;
            db.touch_channel(&record, Utc::now())
        });

        tokio::time::timeout(WRITE_TIMEOUT, write)
            .await
            .map_err(|_| ArchiveError::Timeout)?
    }

    pub async fn query(&self, filter: MessageFilter) -> Result<Vec<MessageRecord>, ArchiveError> {
        self.run(move |db| db.query_messages(&filter)).await
    }

    pub async fn find_revision(
        &self,
        key: RevisionKey,
    ) -> Result<Option<MessageRecord>, ArchiveError> {
        self.run(move |db| db.find_revision(&key.id, key.timestamp))
            .await
    }

    pub async fn channels(&self) -> Result<Vec<ChannelEntry>, ArchiveError> {
        self.run(|db| db.list_channels()).await
    }

    pub async fn record_log(
        &self,
        level: String,
        target: String,
        message: String,
        timestamp: i64,
    ) -> Result<(), ArchiveError> {
        let write = self.run(move |db| {
            db.insert_log(&level, &target, &message, timestamp)
                .map(|_| ())
        });

        tokio::time::timeout(WRITE_TIMEOUT, write)
            .await
            .map_err(|_| ArchiveError::Timeout)?
    }

    /// Drop all but the `keep` newest log entries.
    pub async fn prune_logs(&self, keep: u32) -> Result<usize, ArchiveError> {
        let prune = self.run(move |db| db.prune_logs(keep));
        tokio::time::timeout(WRITE_TIMEOUT, prune)
            .await
            .map_err(|_| ArchiveError::Timeout)?
    }
}

#[cfg(test)]
impl Archive {
    pub fn in_memory() -> Self {
        Self::new(Database::open_in_memory().unwrap())
    }

    pub async fn count(&self) -> Result<u64, ArchiveError> {
        self.run(|db| db.count_messages()).await
    }

    pub async fn recent_logs(&self, limit: u32) -> Vec<archivist_store::LogEntry> {
        self.run(move |db| db.recent_logs(limit)).await.unwrap()
    }
}
