/// Window status definitions for tracking draining progress
///
/// Every partition of a crawl is in exactly one of these states.
use std::fmt;

/// Represents where a partition stands in the draining process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowStatus {
    /// Not drained yet, or only partially drained when the crawl stopped
    Pending,

    /// Every page was drained without a fatal error
    Completed,

    /// Draining hit a non-retryable error; replayed on resume
    Failed,
}

impl WindowStatus {
    /// Returns true if resuming the crawl should drain this window again
    pub fn needs_replay(&self) -> bool {
        matches!(self, Self::Pending | Self::Failed)
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn all_statuses() -> Vec<Self> {
        vec![Self::Pending, Self::Completed, Self::Failed]
    }
}

impl fmt::Display for WindowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
