//! Crawl-wide state: the orchestrator's phase machine and its checkpointable state

use crate::model::{Partition, Record};
use crate::state::{Deduplicator, WindowStatus};
use crate::storage::RunStatus;
use std::fmt;

/// Lifecycle of one crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    Idle,
    Partitioning,
    Draining,
    Completed,
    Failed,
}

impl CrawlPhase {
    /// Returns true if the orchestrator may move from this phase to `next`
    ///
    /// Partitioning is optional (unbounded crawls go straight to draining),
    /// and any live phase may fail.
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        use CrawlPhase::*;
        matches!(
            (self, next),
            (Idle, Partitioning)
                | (Idle, Draining)
                | (Idle, Completed)
                | (Partitioning, Draining)
                | (Draining, Completed)
                | (Idle, Failed)
                | (Partitioning, Failed)
                | (Draining, Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Partitioning => "partitioning",
            Self::Draining => "draining",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A partition together with its draining status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowEntry {
    pub partition: Partition,
    pub status: WindowStatus,
    /// Last error for failed windows
    pub error: Option<String>,
}

/// Everything needed to resume a crawl
///
/// Windows are kept in partition order. A window stays pending while it is
/// being drained, so a checkpoint taken mid-window replays it on resume.
#[derive(Debug, Clone)]
pub struct CrawlState {
    fingerprint: String,
    status: RunStatus,
    visited: Deduplicator,
    windows: Vec<WindowEntry>,
    total_emitted: u64,
}

impl CrawlState {
    /// Creates empty state for a fresh crawl of the query with `fingerprint`
    pub fn new(fingerprint: impl Into<String>) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            status: RunStatus::Running,
            visited: Deduplicator::new(),
            windows: Vec::new(),
            total_emitted: 0,
        }
    }

    /// Rebuilds state from a checkpoint
    ///
    /// Every visited id was forwarded to the sink exactly once, so the emitted
    /// counter is the size of the visited set.
    pub fn restore(
        fingerprint: impl Into<String>,
        status: RunStatus,
        visited: Deduplicator,
        windows: Vec<WindowEntry>,
    ) -> Self {
        let total_emitted = visited.len() as u64;
        Self {
            fingerprint: fingerprint.into(),
            status,
            visited,
            windows,
            total_emitted,
        }
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn set_status(&mut self, status: RunStatus) {
        self.status = status;
    }

    pub fn visited(&self) -> &Deduplicator {
        &self.visited
    }

    pub fn total_emitted(&self) -> u64 {
        self.total_emitted
    }

    /// Returns true once the window list has been produced
    pub fn has_windows(&self) -> bool {
        !self.windows.is_empty()
    }

    /// Installs the window list produced by partitioning, all pending
    pub fn set_windows(&mut self, partitions: Vec<Partition>) {
        self.windows = partitions
            .into_iter()
            .map(|partition| WindowEntry {
                partition,
                status: WindowStatus::Pending,
                error: None,
            })
            .collect();
    }

    pub fn windows(&self) -> &[WindowEntry] {
        &self.windows
    }

    /// Pending windows in partition order
    pub fn pending_windows(&self) -> Vec<Partition> {
        self.windows_with(WindowStatus::Pending)
    }

    pub fn completed_windows(&self) -> Vec<Partition> {
        self.windows_with(WindowStatus::Completed)
    }

    pub fn failed_windows(&self) -> Vec<&WindowEntry> {
        self.windows
            .iter()
            .filter(|entry| entry.status == WindowStatus::Failed)
            .collect()
    }

    fn windows_with(&self, status: WindowStatus) -> Vec<Partition> {
        self.windows
            .iter()
            .filter(|entry| entry.status == status)
            .map(|entry| entry.partition.clone())
            .collect()
    }

    pub fn count_windows(&self, status: WindowStatus) -> usize {
        self.windows
            .iter()
            .filter(|entry| entry.status == status)
            .count()
    }

    /// Completed windows flagged as possibly truncated
    pub fn count_truncated(&self) -> usize {
        self.windows
            .iter()
            .filter(|entry| {
                entry.status == WindowStatus::Completed && entry.partition.possibly_truncated
            })
            .count()
    }

    /// Keeps only the records whose ids were never seen, marking them seen
    ///
    /// The emitted counter is not touched; call [`CrawlState::confirm_emitted`]
    /// once the sink accepted them, or [`CrawlState::retract`] if it did not.
    pub fn admit(&mut self, records: Vec<Record>) -> Vec<Record> {
        records
            .into_iter()
            .filter(|record| self.visited.accept(record))
            .collect()
    }

    pub fn confirm_emitted(&mut self, count: usize) {
        self.total_emitted += count as u64;
    }

    /// Un-marks records that were admitted but could not be persisted
    pub fn retract(&mut self, records: &[Record]) {
        for record in records {
            self.visited.forget(&record.id);
        }
    }

    /// Marks a window as fully drained
    ///
    /// `truncated` records that draining still ran into the platform cap.
    /// Returns false if no such window is tracked.
    pub fn mark_completed(&mut self, partition: &Partition, truncated: bool) -> bool {
        match self.entry_mut(partition) {
            Some(entry) => {
                entry.status = WindowStatus::Completed;
                entry.error = None;
                entry.partition.possibly_truncated |= truncated;
                true
            }
            None => false,
        }
    }

    /// Marks a window as failed with the error that stopped it
    pub fn mark_failed(&mut self, partition: &Partition, error: impl Into<String>) -> bool {
        match self.entry_mut(partition) {
            Some(entry) => {
                entry.status = WindowStatus::Failed;
                entry.error = Some(error.into());
                true
            }
            None => false,
        }
    }

    /// Moves every failed window back to pending; returns how many moved
    pub fn requeue_failed(&mut self) -> usize {
        let mut moved = 0;
        for entry in &mut self.windows {
            if entry.status == WindowStatus::Failed {
                entry.status = WindowStatus::Pending;
                entry.error = None;
                moved += 1;
            }
        }
        moved
    }

    fn entry_mut(&mut self, partition: &Partition) -> Option<&mut WindowEntry> {
        self.windows
            .iter_mut()
            .find(|entry| entry.partition.same_slice(partition))
    }
}
