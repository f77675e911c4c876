//! Storage traits and error types
//!
//! This module defines the trait interface for checkpoint backends and
//! associated error types.

use crate::state::{CrawlState, Deduplicator};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Corrupt checkpoint: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for checkpoint backends
///
/// The visited-id set is written incrementally through `record_seen` as
/// records are emitted; `save_state` persists everything else.
pub trait CheckpointStore {
    /// Records ids that have just been forwarded to the records file
    fn record_seen(&mut self, ids: &[&str]) -> StorageResult<()>;

    /// Number of ids recorded so far
    fn count_seen(&self) -> StorageResult<u64>;

    /// Every recorded id, whether or not a checkpoint was ever saved
    fn load_seen(&self) -> StorageResult<Deduplicator>;

    /// Persists fingerprint, status and the window list of `state`
    fn save_state(&mut self, state: &CrawlState) -> StorageResult<()>;

    /// Loads the stored state, or None if nothing was ever saved
    fn load_state(&self) -> StorageResult<Option<CrawlState>>;

    /// Removes every stored checkpoint
    fn clear(&mut self) -> StorageResult<()>;
}
