//! Sink trait and crawl report types
//!
//! This module defines the trait interface for record sinks and the summary
//! report a crawl produces.

use crate::model::Record;
use crate::state::{CrawlPhase, CrawlState, Deduplicator, WindowStatus};
use crate::storage::{RunStatus, StorageError};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Failed to format output: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<serde_json::Error> for OutputError {
    fn from(error: serde_json::Error) -> Self {
        if error.is_io() {
            Self::Write(error.to_string())
        } else {
            Self::Format(error.to_string())
        }
    }
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Destination for emitted records and crawl checkpoints
///
/// The orchestrator calls every method from behind a single lock, so
/// implementations need no internal synchronisation. Windows may complete out
/// of order when several are drained at once; sinks must not assume any
/// ordering of `append` calls across windows.
pub trait Sink: Send {
    /// Persists records that have passed deduplication
    fn append(&mut self, records: &[Record]) -> OutputResult<()>;

    /// Flushes buffered output to durable storage
    fn flush(&mut self) -> OutputResult<()>;

    /// Loads the last saved checkpoint, if any
    fn load_checkpoint(&mut self) -> OutputResult<Option<CrawlState>>;

    /// Saves a checkpoint of `state`
    fn save_checkpoint(&mut self, state: &CrawlState) -> OutputResult<()>;

    /// Ids of records this sink already holds
    ///
    /// Seeds the visited set of a crawl that starts without a checkpoint, so
    /// records left over from an earlier run are not written twice. Sinks that
    /// keep nothing between runs return an empty set.
    fn emitted_ids(&mut self) -> OutputResult<Deduplicator> {
        Ok(Deduplicator::new())
    }
}

/// Summary of a crawl, returned by the orchestrator and shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    pub phase: CrawlPhase,
    pub status: RunStatus,
    pub total_emitted: u64,
    pub windows_completed: usize,
    pub windows_failed: usize,
    pub windows_truncated: usize,
    pub windows_pending: usize,
    /// Wall time of the run that produced this report, if it ran in-process
    pub elapsed: Option<Duration>,
}

impl CrawlReport {
    /// Builds a report from crawl state at the given phase
    pub fn from_state(state: &CrawlState, phase: CrawlPhase) -> Self {
        Self {
            phase,
            status: state.status(),
            total_emitted: state.total_emitted(),
            windows_completed: state.count_windows(WindowStatus::Completed),
            windows_failed: state.count_windows(WindowStatus::Failed),
            windows_truncated: state.count_truncated(),
            windows_pending: state.count_windows(WindowStatus::Pending),
            elapsed: None,
        }
    }

    /// Builds a report for a stored checkpoint, inferring the phase from its status
    pub fn from_checkpoint(state: &CrawlState) -> Self {
        let phase = match state.status() {
            RunStatus::Completed => CrawlPhase::Completed,
            RunStatus::Failed => CrawlPhase::Failed,
            RunStatus::Running | RunStatus::Interrupted => CrawlPhase::Draining,
        };
        Self::from_state(state, phase)
    }

    /// Returns true if the crawl stopped early and can be resumed
    pub fn interrupted(&self) -> bool {
        self.status == RunStatus::Interrupted
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = Some(elapsed);
        self
    }
}
