//! Gallery-Sweep: exhaustive crawls of a capped gallery API
//!
//! This crate drains a paginated, rate-limited image-gallery API into a
//! deduplicated dataset. Queries whose result count exceeds the platform's
//! return cap are split into time windows small enough to be drained in full,
//! and progress is checkpointed so an interrupted crawl can resume without
//! emitting any record twice.

pub mod config;
pub mod crawler;
pub mod model;
pub mod output;
pub mod state;
pub mod storage;

use std::time::Duration;
use thiserror::Error;

/// Main error type for Gallery-Sweep operations
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(
        "Checkpoint belongs to a different query (stored {stored}, current {current}); \
         rerun with --fresh to discard it"
    )]
    CheckpointMismatch { stored: String, current: String },

    #[error("Invalid crawl phase transition from {from} to {to}")]
    InvalidTransition {
        from: state::CrawlPhase,
        to: state::CrawlPhase,
    },

    #[error("Worker task failed: {0}")]
    Worker(String),

    #[error("No checkpoint to resume at {0}")]
    NoCheckpoint(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
}

/// Failures reported by a transport when sending one page request
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Rate limited by the platform")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },
}

impl TransportError {
    /// Returns true if the same request may succeed when sent again
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout | Self::RateLimited { .. } => true,
            Self::Status { status, .. } => *status >= 500,
        }
    }
}

/// Errors surfaced by the page fetcher
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Transport failed after {attempts} attempt(s): {source}")]
    Transport {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("Malformed page: {0}")]
    Parse(String),

    #[error("Crawl cancelled")]
    Cancelled,
}

/// Result type alias for Gallery-Sweep operations
pub type Result<T> = std::result::Result<T, SweepError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for page fetches
pub type FetchResult<T> = std::result::Result<T, FetchError>;

// Re-export commonly used types
pub use config::Config;
pub use model::{Partition, Query, Record, SortMode, TimeRange, TimeWindow};
pub use state::{CrawlPhase, CrawlState, Deduplicator};
