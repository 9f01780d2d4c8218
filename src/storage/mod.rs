use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::CatalogEntry;

mod sqlite;
pub use sqlite::SqliteStorage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    Stored { id: i64 },
    /// Same content as the latest snapshot; nothing written.
    Unchanged,
}

#[async_trait]
pub trait Storage: Send + Sync {
    async fn migrate(&self) -> Result<()>;
    async fn save_snapshot(&self, run_at: DateTime<Utc>, entries: &[CatalogEntry]) -> Result<SnapshotOutcome>;
    async fn latest_snapshot(&self) -> Result<Option<Vec<CatalogEntry>>>;
}
