use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

use crate::models::CatalogEntry;
use crate::storage::{SnapshotOutcome, Storage};

pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).context("Failed to open SQLite database")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("SQLite connection lock poisoned"))
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS catalog_snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                digest TEXT NOT NULL,
                group_count INTEGER NOT NULL,
                payload TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_snapshot_digest ON catalog_snapshots(digest)",
            [],
        )?;

        info!("Database migration completed");
        Ok(())
    }

    async fn save_snapshot(&self, run_at: DateTime<Utc>, entries: &[CatalogEntry]) -> Result<SnapshotOutcome> {
        let payload = serde_json::to_string(entries).context("Failed to serialize catalog")?;
        let digest = format!("{:x}", md5::compute(payload.as_bytes()));

        let conn = self.lock()?;
        let latest: Option<String> = conn
            .query_row(
                "SELECT digest FROM catalog_snapshots ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        if latest.as_deref() == Some(digest.as_str()) {
            info!("Catalog unchanged since last snapshot ({})", digest);
            return Ok(SnapshotOutcome::Unchanged);
        }

        conn.execute(
            "INSERT INTO catalog_snapshots (created_at, digest, group_count, payload)
             VALUES (?1, ?2, ?3, ?4)",
            params![run_at.to_rfc3339(), digest, entries.len() as i64, payload],
        )?;
        let id = conn.last_insert_rowid();

        info!("Stored catalog snapshot {} with {} groups", id, entries.len());
        Ok(SnapshotOutcome::Stored { id })
    }

    async fn latest_snapshot(&self) -> Result<Option<Vec<CatalogEntry>>> {
        let conn = self.lock()?;

        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM catalog_snapshots ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        payload
            .map(|p| serde_json::from_str(&p).context("Failed to decode stored catalog"))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CatalogListing, GroupStats, PowerSource};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn entry(price: u64) -> CatalogEntry {
        CatalogEntry {
            name: "Antminer S21".to_string(),
            hashrate_th: 200,
            price,
            stats: GroupStats::from_prices(&[price]).unwrap(),
            listings: vec![CatalogListing {
                source: "VendorX".to_string(),
                price,
                date: Utc.with_ymd_and_hms(2026, 10, 17, 8, 0, 0).unwrap(),
                outlier: false,
            }],
            power_watts: Some(3500),
            power_source: PowerSource::Catalog,
        }
    }

    fn storage() -> SqliteStorage {
        let storage = SqliteStorage::in_memory().unwrap();
        tokio_test::block_on(storage.migrate()).unwrap();
        storage
    }

    #[test]
    fn empty_database_has_no_snapshot() {
        let storage = storage();
        assert_eq!(tokio_test::block_on(storage.latest_snapshot()).unwrap(), None);
    }

    #[test]
    fn identical_catalog_is_not_stored_twice() {
        let storage = storage();
        let run_at = Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap();
        let entries = vec![entry(3000)];

        let first = tokio_test::block_on(storage.save_snapshot(run_at, &entries)).unwrap();
        assert!(matches!(first, SnapshotOutcome::Stored { .. }));

        let second = tokio_test::block_on(storage.save_snapshot(run_at, &entries)).unwrap();
        assert_eq!(second, SnapshotOutcome::Unchanged);

        let changed = tokio_test::block_on(storage.save_snapshot(run_at, &[entry(3100)])).unwrap();
        assert!(matches!(changed, SnapshotOutcome::Stored { .. }));
    }

    #[test]
    fn latest_snapshot_round_trips_entries() {
        let storage = storage();
        let run_at = Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap();
        tokio_test::block_on(storage.save_snapshot(run_at, &[entry(3000)])).unwrap();
        tokio_test::block_on(storage.save_snapshot(run_at, &[entry(3100)])).unwrap();

        let latest = tokio_test::block_on(storage.latest_snapshot()).unwrap().unwrap();
        assert_eq!(latest, vec![entry(3100)]);
    }
}
