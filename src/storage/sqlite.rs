//! SQLite checkpoint implementation
//!
//! This module provides a SQLite-based implementation of the CheckpointStore trait.

use crate::model::{Partition, TimeRange};
use crate::state::{CrawlState, Deduplicator, WindowEntry, WindowStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{CheckpointStore, StorageError, StorageResult};
use crate::storage::RunStatus;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

const META_FINGERPRINT: &str = "fingerprint";
const META_STATUS: &str = "status";
const META_STARTED_AT: &str = "started_at";
const META_UPDATED_AT: &str = "updated_at";

/// SQLite checkpoint backend
pub struct SqliteCheckpointStore {
    conn: Connection,
}

impl SqliteCheckpointStore {
    /// Opens or creates a checkpoint database
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteCheckpointStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

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
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn get_meta(&self, key: &str) -> StorageResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM checkpoint_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// When the stored crawl was first checkpointed
    pub fn started_at(&self) -> StorageResult<Option<String>> {
        self.get_meta(META_STARTED_AT)
    }

    /// When the stored crawl was last checkpointed
    pub fn updated_at(&self) -> StorageResult<Option<String>> {
        self.get_meta(META_UPDATED_AT)
    }

    fn load_windows(&self) -> StorageResult<Vec<WindowEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT start_at, end_at, estimated_count, possibly_truncated, status, error_message
             FROM windows ORDER BY position",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, Option<String>>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                    row.get::<_, bool>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(start, end, estimate, truncated, status, error)| {
                let range = match (start, end) {
                    (Some(start), Some(end)) => {
                        let range = TimeRange::new(parse_instant(&start)?, parse_instant(&end)?)
                            .ok_or_else(|| {
                                StorageError::Corrupt(format!("empty window {} .. {}", start, end))
                            })?;
                        Some(range)
                    }
                    (None, None) => None,
                    _ => {
                        return Err(StorageError::Corrupt(
                            "window with only one bound".to_string(),
                        ))
                    }
                };
                let status = WindowStatus::from_db_string(&status).ok_or_else(|| {
                    StorageError::Corrupt(format!("unknown window status '{}'", status))
                })?;
                Ok(WindowEntry {
                    partition: Partition {
                        range,
                        estimated_count: estimate.map(|n| n.max(0) as u64),
                        possibly_truncated: truncated,
                    },
                    status,
                    error,
                })
            })
            .collect()
    }

}

impl CheckpointStore for SqliteCheckpointStore {
    fn record_seen(&mut self, ids: &[&str]) -> StorageResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let now = format_instant(Utc::now());
        let tx = self.conn.transaction()?;
        {
            let mut stmt =
                tx.prepare("INSERT OR IGNORE INTO seen_records (id, emitted_at) VALUES (?1, ?2)")?;
            for id in ids {
                stmt.execute(params![id, now])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn count_seen(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM seen_records", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn load_seen(&self) -> StorageResult<Deduplicator> {
        let mut stmt = self.conn.prepare("SELECT id FROM seen_records")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Deduplicator::with_ids(ids))
    }

    fn save_state(&mut self, state: &CrawlState) -> StorageResult<()> {
        let now = format_instant(Utc::now());
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT OR IGNORE INTO checkpoint_meta (key, value) VALUES (?1, ?2)",
            params![META_STARTED_AT, now],
        )?;
        for (key, value) in [
            (META_FINGERPRINT, state.fingerprint()),
            (META_STATUS, state.status().to_db_string()),
            (META_UPDATED_AT, now.as_str()),
        ] {
            tx.execute(
                "INSERT INTO checkpoint_meta (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )?;
        }

        tx.execute("DELETE FROM windows", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO windows
                 (position, start_at, end_at, estimated_count, possibly_truncated, status, error_message)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for (position, entry) in state.windows().iter().enumerate() {
                let range = entry.partition.range;
                stmt.execute(params![
                    position as i64,
                    range.map(|r| format_instant(r.start())),
                    range.map(|r| format_instant(r.end())),
                    entry.partition.estimated_count.map(|n| n as i64),
                    entry.partition.possibly_truncated,
                    entry.status.to_db_string(),
                    entry.error,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn load_state(&self) -> StorageResult<Option<CrawlState>> {
        let Some(fingerprint) = self.get_meta(META_FINGERPRINT)? else {
            return Ok(None);
        };

        let status = match self.get_meta(META_STATUS)? {
            Some(status) => RunStatus::from_db_string(&status).ok_or_else(|| {
                StorageError::Corrupt(format!("unknown run status '{}'", status))
            })?,
            None => RunStatus::Interrupted,
        };

        Ok(Some(CrawlState::restore(
            fingerprint,
            status,
            self.load_seen()?,
            self.load_windows()?,
        )))
    }

    fn clear(&mut self) -> StorageResult<()> {
        self.conn.execute_batch(
            "
            DELETE FROM checkpoint_meta;
            DELETE FROM windows;
            DELETE FROM seen_records;
        ",
        )?;
        Ok(())
    }
}

fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_instant(value: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt(format!("bad timestamp '{}': {}", value, e)))
}
