//! In-memory sink
//!
//! Keeps records and the last checkpoint in memory. Clones share the same
//! storage, so a caller can keep a handle while the orchestrator owns the
//! sink, and a second crawl over the same handle behaves like a resume.

use crate::model::Record;
use crate::output::traits::{OutputResult, Sink};
use crate::state::{CrawlState, Deduplicator};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryInner {
    records: Vec<Record>,
    checkpoint: Option<CrawlState>,
    flushes: usize,
    saves: usize,
}

/// Sink holding everything in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every record appended so far, in append order
    pub fn records(&self) -> Vec<Record> {
        self.lock().records.clone()
    }

    pub fn ids(&self) -> Vec<String> {
        self.lock().records.iter().map(|r| r.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn flush_count(&self) -> usize {
        self.lock().flushes
    }

    pub fn save_count(&self) -> usize {
        self.lock().saves
    }

    /// The last saved checkpoint, as saved
    pub fn checkpoint(&self) -> Option<CrawlState> {
        self.lock().checkpoint.clone()
    }
}

impl Sink for MemorySink {
    fn append(&mut self, records: &[Record]) -> OutputResult<()> {
        self.lock().records.extend_from_slice(records);
        Ok(())
    }

    fn flush(&mut self) -> OutputResult<()> {
        self.lock().flushes += 1;
        Ok(())
    }

    fn load_checkpoint(&mut self) -> OutputResult<Option<CrawlState>> {
        let inner = self.lock();
        let Some(saved) = inner.checkpoint.as_ref() else {
            return Ok(None);
        };

        // Records reach the sink before the checkpoint mentions them.
        let visited = Deduplicator::with_ids(inner.records.iter().map(|r| r.id.clone()));
        Ok(Some(CrawlState::restore(
            saved.fingerprint(),
            saved.status(),
            visited,
            saved.windows().to_vec(),
        )))
    }

    fn save_checkpoint(&mut self, state: &CrawlState) -> OutputResult<()> {
        let mut inner = self.lock();
        inner.checkpoint = Some(state.clone());
        inner.saves += 1;
        Ok(())
    }

    fn emitted_ids(&mut self) -> OutputResult<Deduplicator> {
        let inner = self.lock();
        Ok(Deduplicator::with_ids(inner.records.iter().map(|r| r.id.clone())))
    }
}
