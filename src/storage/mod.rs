//! Snapshot persistence.
//!
//! A finished snapshot is written twice, in order:
//!
//! 1. the file sink (`FileSink`): canonical JSON, replaced atomically
//! 2. the relational store (`SqlStore`): one transaction per run
//!
//! A store failure does not undo the file write.

pub mod file;
pub mod sql;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::models::{CatalogSnapshot, CrawlStats};

// Re-export for convenience
pub use file::FileSink;
pub use sql::SqlStore;

/// Metadata about a completed sink write.
#[derive(Debug, Clone)]
pub struct WriteMetadata {
    /// Where the snapshot file was written
    pub location: String,
    /// Row id of the run in the store
    pub run_id: i64,
    /// Timestamp of the write
    pub timestamp: DateTime<Utc>,
}

/// Destination for finished snapshots.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    /// Serialize the snapshot to its file. Returns the file location.
    async fn write_file(&self, snapshot: &CatalogSnapshot) -> Result<String>;

    /// Insert the snapshot into the store. Returns the run id.
    async fn insert_store(&self, snapshot: &CatalogSnapshot, stats: &CrawlStats) -> Result<i64>;

    /// File first, then store.
    async fn write(&self, snapshot: &CatalogSnapshot, stats: &CrawlStats) -> Result<WriteMetadata> {
        let location = self
            .write_file(snapshot)
            .await
            .map_err(|e| AppError::sink(format!("file write failed: {e}")))?;
        log::info!("Snapshot written to {location}");

        let run_id = self.insert_store(snapshot, stats).await.map_err(|e| {
            AppError::sink(format!("store insertion failed ({location} was kept): {e}"))
        })?;
        log::info!("Snapshot stored as run {run_id}");

        Ok(WriteMetadata {
            location,
            run_id,
            timestamp: Utc::now(),
        })
    }
}

/// File plus relational store, the production sink.
pub struct Sink {
    file: FileSink,
    store: SqlStore,
}

impl Sink {
    pub fn new(file: FileSink, store: SqlStore) -> Self {
        Self { file, store }
    }

    /// Release the store connection.
    pub async fn close(self) {
        self.store.close().await;
    }
}

#[async_trait]
impl SnapshotSink for Sink {
    async fn write_file(&self, snapshot: &CatalogSnapshot) -> Result<String> {
        self.file.write(snapshot).await
    }

    async fn insert_store(&self, snapshot: &CatalogSnapshot, stats: &CrawlStats) -> Result<i64> {
        self.store.insert_snapshot(snapshot, stats).await
    }
}
