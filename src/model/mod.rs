//! Core data model shared by the crawler, state and output layers
//!
//! This module defines:
//! - The immutable `Query` a crawl is run for, and its sort modes
//! - The `Record` shape every decoded gallery item is turned into
//! - Time ranges, partitioner windows and draining partitions

mod window;

pub use window::{Partition, TimeRange, TimeWindow};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Ordering applied to the gallery listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortMode {
    Recommended,
    Trending,
    DailyRanking,
    Following,
    MostLiked,
    Latest,
}

impl SortMode {
    /// Value the platform expects for this mode on the home feed
    pub fn api_value(&self) -> &'static str {
        match self {
            Self::Recommended => "recommend-v1",
            Self::Trending => "trending1",
            Self::DailyRanking => "daily_ranking_dedup",
            Self::Following => "following_news",
            Self::MostLiked => "-markInfo.likedCount",
            Self::Latest => "latest",
        }
    }

    /// Returns true if keyword searches accept this mode
    ///
    /// Search results can only be ordered by trend, likes or recency; the
    /// personalised feeds exist on the home listing only.
    pub fn supports_search(&self) -> bool {
        matches!(
            self,
            Self::Trending | Self::DailyRanking | Self::MostLiked | Self::Latest
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recommended => "recommended",
            Self::Trending => "trending",
            Self::DailyRanking => "daily-ranking",
            Self::Following => "following",
            Self::MostLiked => "most-liked",
            Self::Latest => "latest",
        }
    }

    pub fn all_modes() -> Vec<Self> {
        vec![
            Self::Recommended,
            Self::Trending,
            Self::DailyRanking,
            Self::Following,
            Self::MostLiked,
            Self::Latest,
        ]
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A logical gallery query
///
/// Queries are immutable; narrowing one to a time window produces a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    search_term: Option<String>,
    sort_mode: SortMode,
    time_window: Option<TimeRange>,
}

impl Query {
    /// Creates a query; an empty or blank search term means the home feed
    pub fn new(search_term: Option<String>, sort_mode: SortMode) -> Self {
        let search_term = search_term
            .map(|term| term.trim().to_string())
            .filter(|term| !term.is_empty());
        Self {
            search_term,
            sort_mode,
            time_window: None,
        }
    }

    /// Returns a copy of this query restricted to `range`
    pub fn with_time_window(&self, range: TimeRange) -> Self {
        self.restricted_to(Some(range))
    }

    /// Returns a copy of this query with its time window replaced
    pub fn restricted_to(&self, range: Option<TimeRange>) -> Self {
        Self {
            search_term: self.search_term.clone(),
            sort_mode: self.sort_mode,
            time_window: range,
        }
    }

    pub fn search_term(&self) -> Option<&str> {
        self.search_term.as_deref()
    }

    pub fn sort_mode(&self) -> SortMode {
        self.sort_mode
    }

    pub fn time_window(&self) -> Option<TimeRange> {
        self.time_window
    }

    pub fn is_search(&self) -> bool {
        self.search_term.is_some()
    }

    /// Hex-encoded SHA-256 identifying this query
    ///
    /// Stored with checkpoints so a resume against a different query is refused.
    /// Window bounds are compared by UTC day, so a window ending "now" keeps
    /// its fingerprint when the crawl is resumed later the same day.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.search_term.as_deref().unwrap_or("").as_bytes());
        hasher.update([0u8]);
        hasher.update(self.sort_mode.as_str().as_bytes());
        hasher.update([0u8]);
        if let Some(range) = &self.time_window {
            hasher.update(range.start().date_naive().to_string().as_bytes());
            hasher.update([0u8]);
            hasher.update(range.end().date_naive().to_string().as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.search_term {
            Some(term) => write!(f, "search '{}' by {}", term, self.sort_mode)?,
            None => write!(f, "home feed by {}", self.sort_mode)?,
        }
        if let Some(range) = &self.time_window {
            write!(f, " within {}", range)?;
        }
        Ok(())
    }
}

/// One gallery item
///
/// Identity is `id`; `attributes` holds the item exactly as the platform
/// returned it and is otherwise opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,

    pub attributes: serde_json::Map<String, serde_json::Value>,

    /// Window that produced this record; diagnostic only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_window: Option<TimeRange>,
}

impl Record {
    pub fn new(id: impl Into<String>, attributes: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            id: id.into(),
            attributes,
            source_window: None,
        }
    }
}
