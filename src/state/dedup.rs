//! Exactly-once filter over record identifiers

use crate::model::Record;
use std::collections::HashSet;

/// Set of every record id seen during a crawl
///
/// Entries are never evicted: the set lives as long as the crawl state that
/// owns it, and an id accepted once is rejected forever after.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Deduplicator {
    seen: HashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the set from ids persisted by an earlier run
    pub fn with_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            seen: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true the first time a record's id is offered, false thereafter
    pub fn accept(&mut self, record: &Record) -> bool {
        self.accept_id(&record.id)
    }

    pub fn accept_id(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        self.seen.insert(id.to_string())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Drops an id again; used when a record was accepted but never reached the sink
    pub fn forget(&mut self, id: &str) -> bool {
        self.seen.remove(id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.seen.iter().map(String::as_str)
    }
}
