//! Time ranges and the windows carved out of them

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A half-open time range `[start, end)`
///
/// Adjacent ranges produced by [`TimeRange::split`] share a boundary instant,
/// which belongs to the later range only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeRange {
    /// Creates a range, returning None unless `start < end`
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        if start < end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Length of the range in whole milliseconds
    pub fn duration_ms(&self) -> i64 {
        self.duration().num_milliseconds()
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// Splits the range into up to `fanout` contiguous pieces
    ///
    /// The length is floor-divided in milliseconds and the remainder is handed
    /// out one millisecond at a time to the earliest pieces. A range shorter
    /// than `fanout` milliseconds yields fewer pieces; one shorter than 2ms is
    /// returned unchanged.
    ///
    /// # Arguments
    ///
    /// * `fanout` - Desired number of pieces (values below 2 return the range as-is)
    ///
    /// # Returns
    ///
    /// Pieces in chronological order; the first starts at `start`, the last ends at `end`
    pub fn split(&self, fanout: u32) -> Vec<TimeRange> {
        let total_ms = self.duration_ms();
        let parts = i64::from(fanout).min(total_ms);
        if parts < 2 {
            return vec![*self];
        }

        let base = total_ms / parts;
        let remainder = total_ms % parts;

        let mut pieces = Vec::with_capacity(parts as usize);
        let mut piece_start = self.start;
        let mut offset_ms = 0;
        for index in 0..parts {
            offset_ms += base + i64::from(index < remainder);
            let piece_end = if index == parts - 1 {
                self.end
            } else {
                self.start + Duration::milliseconds(offset_ms)
            };
            pieces.push(TimeRange {
                start: piece_start,
                end: piece_end,
            });
            piece_start = piece_end;
        }

        pieces
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.start.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            self.end.format("%Y-%m-%dT%H:%M:%S%.3fZ")
        )
    }
}

/// A window produced by the partitioner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindow {
    pub range: TimeRange,

    /// Result count observed while probing, if the probe succeeded
    pub estimated_count: Option<u64>,

    /// Still capped at minimum granularity; the platform may hide some records
    pub possibly_truncated: bool,
}

/// One unit of draining work: a single query stream, windowed or not
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// None for an unbounded crawl of the whole query
    pub range: Option<TimeRange>,
    pub estimated_count: Option<u64>,
    pub possibly_truncated: bool,
}

impl Partition {
    /// The single partition used when no time window is configured
    pub fn unbounded() -> Self {
        Self {
            range: None,
            estimated_count: None,
            possibly_truncated: false,
        }
    }

    /// Returns true if `other` names the same slice of the query
    pub fn same_slice(&self, other: &Partition) -> bool {
        self.range == other.range
    }
}

impl From<TimeWindow> for Partition {
    fn from(window: TimeWindow) -> Self {
        Self {
            range: Some(window.range),
            estimated_count: window.estimated_count,
            possibly_truncated: window.possibly_truncated,
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.range {
            Some(range) => write!(f, "{}", range),
            None => write!(f, "unbounded"),
        }
    }
}
